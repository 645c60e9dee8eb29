use serde::{Deserialize, Serialize};

use crate::petri_net::petri_net_struct::{PetriNet, PlaceKind, TransitionKind};

use super::invariant::ReachabilityConstraint;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
/// Synchronous product of a model net and one trace
pub struct SyncProduct {
    /// Product net (display names replaced by kind tags)
    pub net: PetriNet,
    /// Final marking the external search has to reach
    pub constraint: ReachabilityConstraint,
}

/// Id of the `i`-th place of the trace net
pub fn log_place_id(i: usize) -> String {
    format!("logp{i}")
}

struct ModelMove {
    id: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

/// All MODEL transitions labeled exactly `label`, in declaration order
fn matching_model_moves(model: &PetriNet, label: &str) -> Vec<ModelMove> {
    model
        .transitions
        .iter()
        .filter(|t| t.kind == TransitionKind::Model && t.name == label)
        .map(|t| ModelMove {
            id: t.id.clone(),
            inputs: model
                .preset_of_transition(&t.id)
                .into_iter()
                .map(String::from)
                .collect(),
            outputs: model
                .postset_of_transition(&t.id)
                .into_iter()
                .map(String::from)
                .collect(),
        })
        .collect()
}

///
/// Build the synchronous product of a classified model net (see [`PetriNet::classify`]) and a trace
///
/// The trace becomes a sequence net `logp0 -> logt0 -> logp1 -> ... -> logpN`.
/// For every position `i` and every MODEL transition whose display name equals the `i`-th label,
/// a SYNC transition `logs{i}n{k}` consumes from `logp{i}` and the model transition's input places
/// and produces into `logp{i+1}` and its output places.
///
/// The final marking of the product is the model's final marking followed by
/// `logp0..logp{N-1} == 0` and `logpN == 1`.
/// Afterwards every transition is displayed by its kind tag (`MODEL`, `LOG`, `SYNC`, `TAU`),
/// the label is kept as [`crate::petri_net::petri_net_struct::Transition::original_name`].
///
/// An empty trace yields the model plus a single marked log place `logp0`.
pub fn build_sync_product<S: AsRef<str>>(model: &PetriNet, trace: &[S]) -> SyncProduct {
    let mut net = model.clone();
    net.add_place(&log_place_id(0), 1, PlaceKind::Log);

    for (i, label) in trace.iter().enumerate() {
        let label = label.as_ref();
        let (from, to) = (log_place_id(i), log_place_id(i + 1));
        net.add_place(&to, 0, PlaceKind::Log);

        let log_move = format!("logt{i}");
        net.add_transition(&log_move, label, TransitionKind::Log);
        net.add_arc(&format!("arcp{i}"), &from, &log_move);
        net.add_arc(&format!("arct{i}"), &log_move, &to);

        for (k, model_move) in matching_model_moves(model, label).into_iter().enumerate() {
            let sync_move = format!("logs{i}n{k}");
            net.add_transition(&sync_move, label, TransitionKind::Sync);
            for (j, input) in model_move.inputs.iter().enumerate() {
                net.add_arc(&format!("arcin{i}n{k}n{j}"), input, &sync_move);
            }
            for (j, output) in model_move.outputs.iter().enumerate() {
                net.add_arc(&format!("arcout{i}n{k}n{j}"), &sync_move, output);
            }
            net.add_arc(&format!("arcp{i}n{k}"), &from, &sync_move);
            net.add_arc(&format!("arct{i}n{k}"), &sync_move, &to);
            tracing::trace!("{sync_move} synchronizes {label} with {}", model_move.id);
        }
    }

    let last = trace.len();
    net.final_marking.extend((0..last).map(|i| (log_place_id(i), 0)));
    net.final_marking.push((log_place_id(last), 1));

    let mut constraint = ReachabilityConstraint::new();
    for (place_id, tokens) in &net.final_marking {
        constraint.push(place_id.as_str(), *tokens);
    }
    for place in net.places.iter_mut() {
        place.final_marking = net
            .final_marking
            .iter()
            .find(|(id, _)| *id == place.id)
            .map(|(_, tokens)| *tokens);
    }
    for transition in net.transitions.iter_mut() {
        transition.original_name = transition.name.clone();
        transition.name = transition.kind.as_str().to_string();
    }

    SyncProduct { net, constraint }
}
