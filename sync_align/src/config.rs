use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    conformance::{invariant::ConstraintOptions, replay::ReplayMode},
    error::ParseError,
    petri_net::{
        marking_graph::DEFAULT_STATE_LIMIT,
        petri_net_struct::{ClassifyOptions, DEFAULT_SILENT_MARKER},
    },
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
///
/// Settings shared by all operations
///
/// Missing fields take their default values, so a configuration file only needs to list what it changes:
///
/// ```json
/// { "silent_marker": "silent", "constraint": { "negate": true, "omit_zero_targets": true } }
/// ```
pub struct AlignConfig {
    /// Transitions whose name contains this marker are silent (default `tau`)
    pub silent_marker: String,
    /// How reachability constraints are written
    pub constraint: ConstraintOptions,
    /// Also write a DOT rendering of every product net
    pub write_dot: bool,
    /// How replayed snapshots are matched to transitions
    pub replay_mode: ReplayMode,
    /// Process the traces of a log in parallel
    pub parallel: bool,
    /// Maximal number of states of a marking graph
    pub marking_graph_limit: usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            silent_marker: DEFAULT_SILENT_MARKER.to_string(),
            constraint: ConstraintOptions::default(),
            write_dot: false,
            replay_mode: ReplayMode::default(),
            parallel: true,
            marking_graph_limit: DEFAULT_STATE_LIMIT,
        }
    }
}

impl AlignConfig {
    /// Load a configuration from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader).map_err(ParseError::from)?;
        Ok(config)
    }

    /// Options for [`crate::PetriNet::classify`]
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            silent_marker: self.silent_marker.clone(),
        }
    }
}
