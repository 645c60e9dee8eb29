use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::ReplayError,
    petri_net::petri_net_struct::{
        Marking, MarkingVector, PetriNet, PlaceIndex, Transition, TransitionKind,
    },
};

use super::{
    alignment::{AlignPair, Alignment},
    replay_trace::{ReplayTrace, StepKind, TraceStep},
};

/// How often each product transition (by id) was fired during a replay
pub type FiredTransitions = HashMap<String, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
/// Strategy for identifying the transition behind a marking change
pub enum ReplayMode {
    /// Compare complete marking vectors (see [`replay`])
    #[default]
    Vector,
    /// Look up the kind and the touched places (see [`replay_by_signature`])
    Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
/// Result of replaying a [`ReplayTrace`]
pub struct ReplayOutcome {
    /// Recovered alignment, one pair per move
    pub alignment: Alignment,
    /// Fired transitions (used for highlighting rendered nets)
    pub fired: FiredTransitions,
}

impl ReplayOutcome {
    fn record(&mut self, transition: &Transition) {
        self.alignment.push(AlignPair::from_transition(transition));
        *self.fired.entry(transition.id.clone()).or_default() += 1;
    }
}

/// Replay with the given [`ReplayMode`]
pub fn replay_with_mode(
    product: &PetriNet,
    trace: &ReplayTrace,
    mode: ReplayMode,
) -> Result<ReplayOutcome, ReplayError> {
    match mode {
        ReplayMode::Vector => replay(product, trace),
        ReplayMode::Signature => replay_by_signature(product, trace),
    }
}

struct IndexedTransition<'a> {
    transition: &'a Transition,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

impl IndexedTransition<'_> {
    /// Whether firing (one token per arc) turns `current` into exactly `next`
    fn explains(&self, current: &MarkingVector, next: &MarkingVector) -> bool {
        let mut marking = current.clone();
        for &i in &self.inputs {
            match marking[i].checked_sub(1) {
                Some(count) => marking[i] = count,
                None => return false,
            }
        }
        for &i in &self.outputs {
            match marking[i].checked_add(1) {
                Some(count) => marking[i] = count,
                None => return false,
            }
        }
        marking == *next
    }
}

fn index_transitions<'a>(product: &'a PetriNet, index: &PlaceIndex) -> Vec<IndexedTransition<'a>> {
    product
        .transitions
        .iter()
        .map(|transition| IndexedTransition {
            transition,
            inputs: product
                .preset_of_transition(&transition.id)
                .into_iter()
                .filter_map(|p| index.get(p))
                .collect(),
            outputs: product
                .postset_of_transition(&transition.id)
                .into_iter()
                .filter_map(|p| index.get(p))
                .collect(),
        })
        .collect()
}

fn initial_step(trace: &ReplayTrace) -> Result<&TraceStep, ReplayError> {
    match trace.steps.first() {
        Some(step) if step.kind == StepKind::Initial => Ok(step),
        _ => Err(ReplayError::MissingInitial),
    }
}

fn move_kind(step_index: usize, step: &TraceStep) -> Result<TransitionKind, ReplayError> {
    match step.kind {
        StepKind::Move(kind) => Ok(kind),
        StepKind::Initial => Err(ReplayError::UnexpectedInitial(step_index)),
    }
}

/// Overwrite the entries of `marking` reported in `step`
fn apply_records(
    step_index: usize,
    step: &TraceStep,
    index: &PlaceIndex,
    marking: &mut MarkingVector,
) -> Result<(), ReplayError> {
    for (place, count) in &step.places {
        let i = index.get(place).ok_or_else(|| ReplayError::UnknownPlace {
            step: step_index,
            place: place.clone(),
        })?;
        marking[i] = *count;
    }
    Ok(())
}

///
/// Replay marking snapshots against a synchronous product
///
/// Starting from the product's initial marking (overwritten by the INITIAL snapshot),
/// every following snapshot overwrites the reported places of the running marking.
/// The move is explained by the first transition (in declaration order) of the step's kind
/// that is enabled (one token per input arc) and whose firing yields exactly the new marking.
///
/// Works for snapshots listing every place as well as for snapshots listing only changed places.
/// Fails with the step index if a snapshot cannot be explained.
pub fn replay(product: &PetriNet, trace: &ReplayTrace) -> Result<ReplayOutcome, ReplayError> {
    let index = product.place_index();
    let transitions = index_transitions(product, &index);

    let mut current = index.to_vector(&product.initial_marking());
    apply_records(0, initial_step(trace)?, &index, &mut current)?;

    let mut outcome = ReplayOutcome::default();
    for (step_index, step) in trace.steps.iter().enumerate().skip(1) {
        let kind = move_kind(step_index, step)?;
        let mut next = current.clone();
        apply_records(step_index, step, &index, &mut next)?;

        let fired = transitions
            .iter()
            .filter(|t| t.transition.kind == kind)
            .find(|t| t.explains(&current, &next))
            .ok_or(ReplayError::NoMatchingTransition {
                step: step_index,
                kind,
            })?;
        tracing::debug!(
            step = step_index,
            transition = %fired.transition.id,
            "{kind} move"
        );
        outcome.record(fired.transition);
        current = next;
    }
    Ok(outcome)
}

fn signature(kind: TransitionKind, mut inputs: Vec<&str>, mut outputs: Vec<&str>) -> String {
    inputs.sort_unstable();
    outputs.sort_unstable();
    format!("{kind}-[{}]-[{}]", inputs.join(" "), outputs.join(" "))
}

///
/// Replay marking snapshots by looking up the kind and the touched places of each step
///
/// Every transition is keyed by `KIND-[sorted inputs]-[sorted outputs]`.
/// If two transitions share a key the one declared last is used.
/// Prefer [`replay`], which compares complete markings and tells such transitions apart.
pub fn replay_by_signature(
    product: &PetriNet,
    trace: &ReplayTrace,
) -> Result<ReplayOutcome, ReplayError> {
    let by_signature: HashMap<String, &Transition> = product
        .transitions
        .iter()
        .map(|t| {
            (
                signature(
                    t.kind,
                    product.preset_of_transition(&t.id),
                    product.postset_of_transition(&t.id),
                ),
                t,
            )
        })
        .collect();

    let check_place = |step_index: usize, place: &str| {
        product
            .place(place)
            .map(|_| ())
            .ok_or_else(|| ReplayError::UnknownPlace {
                step: step_index,
                place: place.to_string(),
            })
    };

    // no transition has more arcs than the whole net
    let max_delta = product.arcs.len() as u64;
    let mut marking: Marking = product.initial_marking();
    for (place, count) in &initial_step(trace)?.places {
        check_place(0, place)?;
        marking.insert(place.clone(), *count);
    }

    let mut outcome = ReplayOutcome::default();
    for (step_index, step) in trace.steps.iter().enumerate().skip(1) {
        let kind = move_kind(step_index, step)?;
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for (place, count) in &step.places {
            check_place(step_index, place)?;
            let before = marking.insert(place.clone(), *count).unwrap_or_default();
            let delta = before.abs_diff(*count);
            if delta > max_delta {
                return Err(ReplayError::UnknownSignature {
                    step: step_index,
                    signature: format!("{kind}-[{place} {before} -> {count}]"),
                });
            }
            let side = if *count < before {
                &mut inputs
            } else {
                &mut outputs
            };
            side.extend(std::iter::repeat(place.as_str()).take(delta as usize));
        }
        let key = signature(kind, inputs, outputs);
        let transition = by_signature
            .get(&key)
            .ok_or_else(|| ReplayError::UnknownSignature {
                step: step_index,
                signature: key.clone(),
            })?;
        tracing::debug!(step = step_index, transition = %transition.id, "{key}");
        outcome.record(transition);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conformance::{alignment::SKIP, sync_product::build_sync_product},
        petri_net::petri_net_struct::{ClassifyOptions, PlaceKind},
    };

    /// `p0 -a-> p1`
    fn product(trace: &[&str]) -> PetriNet {
        let mut net = PetriNet::new();
        net.add_place("p0", 1, PlaceKind::Model);
        net.add_place("p1", 0, PlaceKind::Model);
        net.add_transition("t1", "a", TransitionKind::Model);
        net.add_arc("a1", "p0", "t1");
        net.add_arc("a2", "t1", "p1");
        net.final_marking = vec![("p1".into(), 1)];
        net.classify(&ClassifyOptions::default());
        build_sync_product(&net, trace).net
    }

    fn step(kind: TransitionKind, places: &[(&str, u64)]) -> TraceStep {
        TraceStep {
            kind: StepKind::Move(kind),
            places: places.iter().map(|(p, c)| (p.to_string(), *c)).collect(),
        }
    }

    fn trace(initial: &[(&str, u64)], moves: Vec<TraceStep>) -> ReplayTrace {
        let mut steps = vec![TraceStep {
            kind: StepKind::Initial,
            places: initial.iter().map(|(p, c)| (p.to_string(), *c)).collect(),
        }];
        steps.extend(moves);
        ReplayTrace { steps }
    }

    #[test]
    fn sync_move() {
        let trace = trace(
            &[("p0", 1), ("p1", 0), ("logp0", 1), ("logp1", 0)],
            vec![step(
                TransitionKind::Sync,
                &[("p0", 0), ("p1", 1), ("logp0", 0), ("logp1", 1)],
            )],
        );
        let outcome = replay(&product(&["a"]), &trace).unwrap();
        assert_eq!(outcome.alignment.to_string(), "(a | a : logs0n0)\n");
        assert_eq!(outcome.fired.get("logs0n0"), Some(&1));
    }

    #[test]
    fn sparse_snapshots() {
        let trace = trace(
            &[],
            vec![
                step(TransitionKind::Log, &[("logp0", 0), ("logp1", 1)]),
                step(TransitionKind::Model, &[("p0", 0), ("p1", 1)]),
            ],
        );
        let outcome = replay(&product(&["b"]), &trace).unwrap();
        let pairs = outcome.alignment.pairs();
        assert_eq!((pairs[0].log.as_str(), pairs[0].model.as_str()), ("b", SKIP));
        assert_eq!((pairs[1].log.as_str(), pairs[1].model.as_str()), (SKIP, "a"));
        assert_eq!(pairs[1].transition_id, "t1");
    }

    #[test]
    fn unexplained_step() {
        let trace = trace(
            &[],
            vec![step(TransitionKind::Sync, &[("logp0", 0), ("logp1", 1)])],
        );
        assert_eq!(
            replay(&product(&["a"]), &trace),
            Err(ReplayError::NoMatchingTransition {
                step: 1,
                kind: TransitionKind::Sync
            })
        );
    }

    #[test]
    fn unknown_place() {
        let trace = trace(&[("nope", 1)], vec![]);
        assert!(matches!(
            replay(&product(&["a"]), &trace),
            Err(ReplayError::UnknownPlace { step: 0, .. })
        ));
        assert!(matches!(
            replay_by_signature(&product(&["a"]), &trace),
            Err(ReplayError::UnknownPlace { step: 0, .. })
        ));
    }

    #[test]
    fn missing_initial() {
        let trace = ReplayTrace {
            steps: vec![step(TransitionKind::Log, &[])],
        };
        assert_eq!(
            replay(&product(&["a"]), &trace),
            Err(ReplayError::MissingInitial)
        );
    }

    #[test]
    fn signature_replay_agrees() {
        let trace = trace(
            &[("p0", 1), ("logp0", 1)],
            vec![step(
                TransitionKind::Sync,
                &[("p0", 0), ("p1", 1), ("logp0", 0), ("logp1", 1)],
            )],
        );
        let product = product(&["a"]);
        assert_eq!(
            replay_by_signature(&product, &trace).unwrap(),
            replay(&product, &trace).unwrap()
        );
    }

    #[test]
    fn signature_miss() {
        let trace = trace(&[], vec![step(TransitionKind::Tau, &[("p0", 0)])]);
        let err = replay_by_signature(&product(&["a"]), &trace).unwrap_err();
        assert_eq!(
            err,
            ReplayError::UnknownSignature {
                step: 1,
                signature: "TAU-[p0]-[]".into()
            }
        );
    }

    #[test]
    fn saturated_place_is_not_explained() {
        let trace = trace(
            &[("logp0", 1), ("logp1", u64::MAX)],
            vec![step(TransitionKind::Log, &[("logp0", 0)])],
        );
        assert_eq!(
            replay(&product(&["a"]), &trace),
            Err(ReplayError::NoMatchingTransition {
                step: 1,
                kind: TransitionKind::Log
            })
        );
    }

    #[test]
    fn signature_rejects_huge_jump() {
        let trace = trace(
            &[("logp1", 0)],
            vec![step(TransitionKind::Log, &[("logp1", u64::MAX)])],
        );
        assert!(matches!(
            replay_by_signature(&product(&["a"]), &trace),
            Err(ReplayError::UnknownSignature { step: 1, .. })
        ));
    }

    #[test]
    fn replay_is_deterministic() {
        let trace = trace(
            &[],
            vec![step(TransitionKind::Log, &[("logp0", 0), ("logp1", 1)])],
        );
        let product = product(&["a"]);
        assert_eq!(replay(&product, &trace), replay(&product, &trace));
    }
}
