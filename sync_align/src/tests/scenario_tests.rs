use crate::{
    conformance::{
        alignment::SKIP,
        replay::{replay, replay_by_signature},
        replay_trace::{ReplayTrace, StepKind, TraceStep},
        sync_product::build_sync_product,
    },
    error::ParseError,
    petri_net::petri_net_struct::{ClassifyOptions, PetriNet, PlaceKind, TransitionKind},
    utils::test_utils::get_test_data_path,
    AlignError,
};

fn load_classified(file: &str) -> PetriNet {
    let mut net = PetriNet::load_from_path(get_test_data_path().join(file)).unwrap();
    net.classify(&ClassifyOptions::default());
    net
}

fn snapshot(kind: StepKind, places: &[(&str, u64)]) -> TraceStep {
    TraceStep {
        kind,
        places: places.iter().map(|(p, c)| (p.to_string(), *c)).collect(),
    }
}

#[test]
fn scenario_a_sync_move() {
    let model = load_classified("scenario_a.pnml");
    let product = build_sync_product(&model, &["a"]);
    let net = &product.net;

    let log_places: Vec<(&str, u64, Option<u64>)> = net
        .places
        .iter()
        .filter(|p| p.kind == PlaceKind::Log)
        .map(|p| (p.id.as_str(), p.initial_marking, p.final_marking))
        .collect();
    assert_eq!(
        log_places,
        vec![("logp0", 1, Some(0)), ("logp1", 0, Some(1))]
    );
    assert_eq!(net.transition("logt0").unwrap().original_name, "a");

    let sync = net
        .transitions
        .iter()
        .find(|t| t.kind == TransitionKind::Sync)
        .unwrap();
    let mut inputs = net.preset_of_transition(&sync.id);
    inputs.sort();
    let mut outputs = net.postset_of_transition(&sync.id);
    outputs.sort();
    assert_eq!(inputs, vec!["logp0", "p0"]);
    assert_eq!(outputs, vec!["logp1", "p1"]);

    let trace = ReplayTrace {
        steps: vec![
            snapshot(
                StepKind::Initial,
                &[("p0", 1), ("p1", 0), ("logp0", 1), ("logp1", 0)],
            ),
            snapshot(
                StepKind::Move(TransitionKind::Sync),
                &[("p0", 0), ("p1", 1), ("logp0", 0), ("logp1", 1)],
            ),
        ],
    };
    let outcome = replay(net, &trace).unwrap();
    let pairs = outcome.alignment.pairs();
    assert_eq!(pairs.len(), 1);
    assert_eq!(
        (pairs[0].log.as_str(), pairs[0].model.as_str()),
        ("a", "a")
    );
    assert_eq!(pairs[0].transition_id, sync.id);
}

#[test]
fn scenario_b_unmatched_label() {
    let model = load_classified("scenario_a.pnml");
    let product = build_sync_product(&model, &["z"]);
    assert!(product
        .net
        .transitions
        .iter()
        .all(|t| t.kind != TransitionKind::Sync));

    let trace = ReplayTrace {
        steps: vec![
            snapshot(StepKind::Initial, &[]),
            snapshot(
                StepKind::Move(TransitionKind::Log),
                &[("logp0", 0), ("logp1", 1)],
            ),
        ],
    };
    let outcome = replay(&product.net, &trace).unwrap();
    let pair = &outcome.alignment.pairs()[0];
    assert_eq!((pair.log.as_str(), pair.model.as_str()), ("z", SKIP));
}

#[test]
fn scenario_c_missing_final_marking() {
    let err = PetriNet::load_from_path(get_test_data_path().join("no_final.pnml")).unwrap_err();
    assert!(matches!(
        err,
        AlignError::Parse(ParseError::MissingFinalMarking)
    ));
}

#[test]
fn silent_transitions_from_marker_and_toolspecific() {
    let model = load_classified("model.pnml");
    let kind = |id: &str| model.transition(id).unwrap().kind;
    assert_eq!(kind("ta"), TransitionKind::Model);
    assert_eq!(kind("tt"), TransitionKind::Tau);
    assert_eq!(kind("tc"), TransitionKind::Tau);

    // "c" is silent, so it never synchronizes
    let product = build_sync_product(&model, &["c"]);
    assert!(product.net.transition("logs0n0").is_none());
}

#[test]
fn replay_trace_file() {
    let product = build_sync_product(&load_classified("model.pnml"), &["a", "b"]);
    let trace = ReplayTrace::from_path(get_test_data_path().join("trace_ab.txt")).unwrap();
    let outcome = replay(&product.net, &trace).unwrap();
    assert_eq!(
        outcome.alignment.to_string(),
        "(a | a : logs0n0)\n(b | b : logs1n0)\n"
    );
    assert_eq!(outcome.alignment.len(), trace.steps.len() - 1);
    assert_eq!(replay_by_signature(&product.net, &trace).unwrap(), outcome);
}

#[test]
fn deviating_trace_with_silent_move() {
    let product = build_sync_product(&load_classified("model.pnml"), &["a", "x"]);
    let trace = ReplayTrace::from_path(get_test_data_path().join("trace_ax.txt")).unwrap();

    let outcome = replay(&product.net, &trace).unwrap();
    let rendered: Vec<String> = outcome
        .alignment
        .pairs()
        .iter()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(
        rendered,
        vec!["(a | a : logs0n0)", "(x | » : logt1)", "(» | τ : tt)"]
    );
    assert!(outcome
        .alignment
        .pairs()
        .iter()
        .all(|p| !(p.is_log_move() && p.is_model_move())));
    assert_eq!(outcome.alignment.len(), trace.steps.len() - 1);

    // tt and tc share kind, inputs and outputs: the first declared one wins for vector replay,
    // the last declared one for signature replay
    let legacy = replay_by_signature(&product.net, &trace).unwrap();
    assert_eq!(legacy.alignment.pairs()[2].transition_id, "tc");
    assert_eq!(legacy.alignment.pairs()[..2], outcome.alignment.pairs()[..2]);
}

#[test]
fn stale_trace_is_rejected() {
    let product = build_sync_product(&load_classified("model.pnml"), &["a"]);
    let trace = ReplayTrace::from_path(get_test_data_path().join("trace_stale.txt")).unwrap();
    assert!(matches!(
        replay(&product.net, &trace),
        Err(crate::ReplayError::NoMatchingTransition { step: 1, .. })
    ));
    assert!(matches!(
        replay_by_signature(&product.net, &trace),
        Err(crate::ReplayError::UnknownSignature { step: 1, .. })
    ));
}

#[test]
fn exported_product_replays_the_same() {
    let product = build_sync_product(&load_classified("model.pnml"), &["a", "x"]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("syncmodel-0.pnml");
    product.net.export_pnml(&path).unwrap();

    let reloaded = PetriNet::load_from_path(&path).unwrap();
    assert_eq!(reloaded.transitions, product.net.transitions);
    assert_eq!(reloaded.final_marking, product.net.final_marking);

    let trace = ReplayTrace::from_path(get_test_data_path().join("trace_ax.txt")).unwrap();
    assert_eq!(
        replay(&reloaded, &trace).unwrap(),
        replay(&product.net, &trace).unwrap()
    );
}

#[test]
fn empty_trace_replays_to_empty_alignment() {
    let empty: [&str; 0] = [];
    let product = build_sync_product(&load_classified("model.pnml"), &empty);
    let trace: ReplayTrace = "state 0/0\n    start:place = 1\n    mid:place = 0\n    end:place = 0\n    logp0:place = 1\n"
        .parse()
        .unwrap();
    assert_eq!(trace.steps.len(), 1);
    assert!(replay(&product.net, &trace).unwrap().alignment.is_empty());
    assert!(replay_by_signature(&product.net, &trace)
        .unwrap()
        .alignment
        .is_empty());
}
