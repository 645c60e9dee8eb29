#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]

#![doc = include_str!("../README.md")]

/// Error types ([`AlignError`], [`ParseError`], [`ReplayError`])
pub mod error;

/// Configuration ([`AlignConfig`])
pub mod config;

///
/// Petri nets
///
pub mod petri_net {
    /// Export [`PetriNet`] to `.pnml`
    pub mod export_pnml;
    #[cfg(feature = "graphviz-export")]
    /// Export [`PetriNet`]s and marking graphs to DOT and images (SVG, PNG, ...)
    ///
    /// __Requires the `graphviz-export` feature to be enabled__
    ///
    /// Also requires an active graphviz installation in the PATH for the image functions.
    /// See also <https://github.com/besok/graphviz-rust?tab=readme-ov-file#caveats> and <https://graphviz.org/download/>
    pub mod image_export;
    /// Import [`PetriNet`] from `.pnml`
    pub mod import_pnml;
    /// Reachable state space of a [`PetriNet`] (diagnostic only)
    pub mod marking_graph;
    /// [`PetriNet`] struct
    pub mod petri_net_struct;

    #[doc(inline)]
    pub use petri_net_struct::PetriNet;
}

///
/// Event logs, reduced to activity label sequences
///
pub mod event_log {
    /// CSV and XES import
    pub mod import_log;
}

///
/// Alignment-based conformance checking
///
pub mod conformance {
    /// Alignment result struct
    pub mod alignment;
    /// Final-marking reachability constraint
    pub mod invariant;
    /// Replaying marking snapshots against a synchronous product
    pub mod replay;
    /// Parser for marking-snapshot trace files
    pub mod replay_trace;
    /// Synchronous product of a model net and a trace
    pub mod sync_product;
}

/// Batch processing of whole logs and files
pub mod pipeline;

/// Util module with smaller helper functions, structs or enums
pub mod utils;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use error::{AlignError, ParseError, ReplayError, Result};

#[doc(inline)]
pub use config::AlignConfig;

#[doc(inline)]
pub use petri_net::petri_net_struct::PetriNet;

#[doc(inline)]
pub use petri_net::import_pnml::import_pnml;

#[doc(inline)]
pub use petri_net::export_pnml::export_petri_net_to_pnml;

#[doc(inline)]
pub use event_log::import_log::import_log_file;

#[doc(inline)]
pub use conformance::alignment::{AlignPair, Alignment};

#[doc(inline)]
pub use conformance::invariant::ReachabilityConstraint;

#[doc(inline)]
pub use conformance::sync_product::{build_sync_product, SyncProduct};

#[doc(inline)]
pub use conformance::replay::{replay, replay_by_signature, ReplayOutcome};

#[doc(inline)]
pub use conformance::replay_trace::ReplayTrace;

///
/// Serialize a [`PetriNet`] as a JSON [`String`]
///
pub fn petrinet_to_json(net: &PetriNet) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string(net)
}

///
/// Deserialize a [`PetriNet`] from a JSON [`String`]
///
pub fn json_to_petrinet(net_json: &str) -> std::result::Result<PetriNet, serde_json::Error> {
    serde_json::from_str(net_json)
}
