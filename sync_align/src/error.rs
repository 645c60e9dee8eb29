use thiserror::Error;

use crate::petri_net::petri_net_struct::TransitionKind;

///
/// Error encountered while parsing input data (PNML, event logs, snapshot traces, configuration)
///
#[derive(Debug, Error)]
pub enum ParseError {
    /// XML error (e.g., incorrect XML format)
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// JSON error (configuration files)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Encountered no PNML tag (i.e., the parsed data was not a PNML file)
    #[error("no <pnml> tag found")]
    NoPnmlTag,
    /// There is no top-level `<log>` (i.e., the parsed data was not a XES file)
    #[error("no top-level <log> tag found")]
    NoTopLevelLog,
    /// Missing key on XML element (with element and expected key included)
    #[error("<{element}> is missing the `{key}` attribute")]
    MissingKey {
        /// Element name
        element: &'static str,
        /// Attribute key
        key: &'static str,
    },
    /// Token count that is not a nonnegative integer
    #[error("invalid token count `{value}` for place `{place}`")]
    InvalidTokenCount {
        /// Place id
        place: String,
        /// Offending text
        value: String,
    },
    /// Unknown place/transition kind tag
    #[error("unknown kind tag `{0}`")]
    InvalidKind(String),
    /// Arc referencing a node that does not exist
    #[error("arc `{arc}` references unknown node `{node}`")]
    UnknownArcEndpoint {
        /// Arc id
        arc: String,
        /// Missing node id
        node: String,
    },
    /// Arc between two places or between two transitions
    #[error("arc `{0}` must connect a place and a transition")]
    InvalidArc(String),
    /// Arc with an inscription other than 1
    #[error("arc `{arc}` has weight `{weight}`, only unit arcs are supported")]
    UnsupportedArcWeight {
        /// Arc id
        arc: String,
        /// Inscription text
        weight: String,
    },
    /// Final marking referencing a place that does not exist
    #[error("final marking references unknown place `{0}`")]
    UnknownFinalPlace(String),
    /// No (or an empty) final marking section
    #[error("unable to parse final markings, is the PNML an accepting net?")]
    MissingFinalMarking,
    /// Event log with an unknown file extension
    #[error("unknown file extension for log file `{0}` (expected .csv, .xes or .xes.gz)")]
    UnsupportedLogFormat(String),
    /// Malformed line in a line-based input
    #[error("line {line}: {reason}")]
    InvalidLine {
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },
}

///
/// Error encountered while replaying marking snapshots against a synchronous product
///
/// Signals that the product net and the snapshot trace do not belong together (e.g., one of them is stale).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The trace does not start with an INITIAL step
    #[error("trace does not start with an INITIAL step")]
    MissingInitial,
    /// An INITIAL step after the first step
    #[error("step {0}: unexpected INITIAL step")]
    UnexpectedInitial(usize),
    /// No transition of the step's kind turns the current marking into the observed one
    #[error("step {step}: no {kind} transition explains the marking change, are the input files up to date?")]
    NoMatchingTransition {
        /// Step index (INITIAL is step 0)
        step: usize,
        /// Move kind of the step
        kind: TransitionKind,
    },
    /// A snapshot mentions a place the product net does not have
    #[error("step {step}: unknown place `{place}`")]
    UnknownPlace {
        /// Step index (INITIAL is step 0)
        step: usize,
        /// Place id
        place: String,
    },
    /// Legacy replay: no transition has the observed signature
    #[error("step {step}: unable to form transition from marking difference `{signature}`, are the input files up to date?")]
    UnknownSignature {
        /// Step index (INITIAL is step 0)
        step: usize,
        /// `kind-[inputs]-[outputs]` signature
        signature: String,
    },
}

///
/// Any error of this crate
///
#[derive(Debug, Error)]
pub enum AlignError {
    /// Malformed or incomplete input
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// Product net and snapshot trace do not fit together
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),
    /// File access failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid invocation (e.g., missing output directory)
    #[error("usage error: {0}")]
    Usage(String),
}

impl From<quick_xml::Error> for AlignError {
    fn from(e: quick_xml::Error) -> Self {
        AlignError::Parse(ParseError::Xml(e))
    }
}

impl From<tempfile::PersistError> for AlignError {
    fn from(e: tempfile::PersistError) -> Self {
        AlignError::Io(e.error)
    }
}

/// Result type with [`AlignError`]
pub type Result<T> = std::result::Result<T, AlignError>;
