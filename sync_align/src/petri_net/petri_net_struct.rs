use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Display name given to silent transitions
pub const TAU_SYMBOL: &str = "τ";

/// Marker in a transition name that makes it silent (see [`PetriNet::classify`])
pub const DEFAULT_SILENT_MARKER: &str = "tau";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
/// Which side of a synchronous product a [`Place`] belongs to
pub enum PlaceKind {
    /// Place of the process model
    #[default]
    Model,
    /// Place of the trace net
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
/// Kind of move a [`Transition`] represents
///
/// `Sync` and `Tau` only occur in classified nets and synchronous products.
pub enum TransitionKind {
    /// Move on the model only
    #[default]
    Model,
    /// Move on the log only
    Log,
    /// Synchronous move on model and log
    Sync,
    /// Silent model move
    Tau,
}

impl TransitionKind {
    /// All kinds, in the order they are checked when reading action labels
    pub const ALL: [TransitionKind; 4] = [
        TransitionKind::Log,
        TransitionKind::Model,
        TransitionKind::Sync,
        TransitionKind::Tau,
    ];

    /// Textual tag (`LOG`, `MODEL`, `SYNC`, `TAU`)
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Model => "MODEL",
            TransitionKind::Log => "LOG",
            TransitionKind::Sync => "SYNC",
            TransitionKind::Tau => "TAU",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransitionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseError::InvalidKind(s.to_string()))
    }
}

impl PlaceKind {
    /// Textual tag (`MODEL`, `LOG`)
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceKind::Model => "MODEL",
            PlaceKind::Log => "LOG",
        }
    }
}

impl FromStr for PlaceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MODEL" => Ok(PlaceKind::Model),
            "LOG" => Ok(PlaceKind::Log),
            _ => Err(ParseError::InvalidKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Place in a Petri net
pub struct Place {
    /// Identifier (as used in the PNML file)
    pub id: String,
    /// Name
    pub name: String,
    /// Number of tokens in the initial marking
    pub initial_marking: u64,
    /// Token count required in the final marking (if the place is part of it)
    pub final_marking: Option<u64>,
    /// Model or log side
    pub kind: PlaceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Transition in a Petri net
pub struct Transition {
    /// Identifier (as used in the PNML file)
    pub id: String,
    /// Display name
    ///
    /// Rewritten by [`PetriNet::classify`] (silent moves) and by the synchronous product (kind tags).
    pub name: String,
    /// Name before the kind-tag relabeling of the synchronous product
    ///
    /// For silent moves this is `τ`, the name given by [`PetriNet::classify`].
    pub original_name: String,
    /// Kind of move
    pub kind: TransitionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Arc in a Petri net
///
/// Connecting a place and a transition (or the other way around).
/// The direction follows from which endpoint is the place.
pub struct Arc {
    /// Identifier
    pub id: String,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
}

/// Marking of a Petri net: Assigning place ids to a number of tokens
pub type Marking = HashMap<String, u64>;

/// Marking as a vector, indexed through a [`PlaceIndex`]
pub type MarkingVector = Vec<u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// Size of a [`PetriNet`]
pub struct NetStatistics {
    /// Number of places
    pub places: usize,
    /// Number of transitions
    pub transitions: usize,
    /// Number of arcs
    pub arcs: usize,
}

impl fmt::Display for NetStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.places, self.transitions, self.arcs)
    }
}

#[derive(Debug, Clone, Default)]
/// Stable assignment of place ids to vector positions
///
/// Built once per net (in place declaration order) and reused for a whole replay.
pub struct PlaceIndex {
    index: HashMap<String, usize>,
    len: usize,
}

impl PlaceIndex {
    /// Position of a place
    pub fn get(&self, place_id: &str) -> Option<usize> {
        self.index.get(place_id).copied()
    }

    /// Number of indexed places
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no place is indexed
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert a [`Marking`] into a vector (places not mentioned get 0 tokens)
    pub fn to_vector(&self, marking: &Marking) -> MarkingVector {
        let mut v = vec![0; self.len];
        for (place_id, count) in marking {
            if let Some(i) = self.get(place_id) {
                v[i] = *count;
            }
        }
        v
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
/// Options for [`PetriNet::classify`]
pub struct ClassifyOptions {
    /// Transitions whose name contains this marker become silent
    pub silent_marker: String,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            silent_marker: DEFAULT_SILENT_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
///
/// A Petri net of [`Place`]s and [`Transition`]s
///
/// Bipartite graph of [`Place`]s and [`Transition`]s with [`Arc`]s connecting them.
/// The initial marking is stored on the places, the final marking both on the places and as an ordered list.
/// All collections keep their declaration order.
pub struct PetriNet {
    /// Net id
    pub id: String,
    /// Net name
    pub name: String,
    /// Places
    pub places: Vec<Place>,
    /// Transitions
    pub transitions: Vec<Transition>,
    /// Arcs
    pub arcs: Vec<Arc>,
    /// Final marking (place id and required token count), in file order
    pub final_marking: Vec<(String, u64)>,
    /// Silent transitions flagged through PNML tool-specific data
    #[serde(default)]
    pub invisible_transitions: HashSet<String>,
}

impl PetriNet {
    /// Create new [`PetriNet`] with no places or transitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an accepting Petri net from PNML bytes
    ///
    /// Fails with [`ParseError::MissingFinalMarking`] if the net has no final marking.
    pub fn load(bytes: &[u8]) -> Result<PetriNet, ParseError> {
        let net = super::import_pnml::import_pnml_slice(bytes)?;
        net.ensure_accepting()?;
        Ok(net)
    }

    /// Parse an accepting Petri net from a PNML file
    ///
    /// Same as [`PetriNet::load`], reading from `path`.
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> crate::Result<PetriNet> {
        let net = super::import_pnml::import_pnml_from_path(path)?;
        net.ensure_accepting()?;
        Ok(net)
    }

    fn ensure_accepting(&self) -> Result<(), ParseError> {
        if self.final_marking.is_empty() {
            return Err(ParseError::MissingFinalMarking);
        }
        Ok(())
    }

    /// Add a place
    pub fn add_place(&mut self, id: &str, initial_marking: u64, kind: PlaceKind) {
        self.places.push(Place {
            id: id.to_string(),
            name: id.to_string(),
            initial_marking,
            final_marking: None,
            kind,
        });
    }

    /// Add a transition (display and original name are both set to `name`)
    pub fn add_transition(&mut self, id: &str, name: &str, kind: TransitionKind) {
        self.transitions.push(Transition {
            id: id.to_string(),
            name: name.to_string(),
            original_name: name.to_string(),
            kind,
        });
    }

    /// Add an arc
    pub fn add_arc(&mut self, id: &str, source: &str, target: &str) {
        self.arcs.push(Arc {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        });
    }

    /// Get a place by id
    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    /// Get a transition by id
    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// Input places of a transition (one entry per arc, duplicates kept)
    pub fn preset_of_transition(&self, transition_id: &str) -> Vec<&str> {
        self.arcs
            .iter()
            .filter(|arc| arc.target == transition_id)
            .map(|arc| arc.source.as_str())
            .collect()
    }

    /// Output places of a transition (one entry per arc, duplicates kept)
    pub fn postset_of_transition(&self, transition_id: &str) -> Vec<&str> {
        self.arcs
            .iter()
            .filter(|arc| arc.source == transition_id)
            .map(|arc| arc.target.as_str())
            .collect()
    }

    /// Initial marking (only places with at least one token)
    pub fn initial_marking(&self) -> Marking {
        self.places
            .iter()
            .filter(|p| p.initial_marking > 0)
            .map(|p| (p.id.clone(), p.initial_marking))
            .collect()
    }

    /// Index over all places in declaration order
    pub fn place_index(&self) -> PlaceIndex {
        PlaceIndex {
            index: self
                .places
                .iter()
                .enumerate()
                .map(|(i, p)| (p.id.clone(), i))
                .collect(),
            len: self.places.len(),
        }
    }

    /// Number of places, transitions and arcs
    pub fn statistics(&self) -> NetStatistics {
        NetStatistics {
            places: self.places.len(),
            transitions: self.transitions.len(),
            arcs: self.arcs.len(),
        }
    }

    /// Tag places and transitions for use as the model side of a synchronous product
    ///
    /// Every place becomes [`PlaceKind::Model`].
    /// Every transition becomes [`TransitionKind::Model`], except for transitions whose name contains
    /// `options.silent_marker` or which were flagged as invisible in the PNML file:
    /// those become [`TransitionKind::Tau`] and are displayed as [`TAU_SYMBOL`].
    /// The name before relabeling is kept in [`Transition::original_name`].
    pub fn classify(&mut self, options: &ClassifyOptions) {
        for place in self.places.iter_mut() {
            place.kind = PlaceKind::Model;
        }
        for transition in self.transitions.iter_mut() {
            transition.original_name = transition.name.clone();
            let silent = (!options.silent_marker.is_empty()
                && transition.name.contains(&options.silent_marker))
                || self.invisible_transitions.contains(&transition.id);
            if silent {
                transition.name = TAU_SYMBOL.to_string();
                transition.kind = TransitionKind::Tau;
            } else {
                transition.kind = TransitionKind::Model;
            }
        }
    }

    /// Check whether a transition is enabled in `marking`
    ///
    /// Presence check only: every input place needs at least one token, arc multiplicities are not considered.
    /// This is the policy of the state-space exploration in [`super::marking_graph`];
    /// replaying snapshots uses the stricter check in [`crate::conformance::replay`].
    pub fn can_fire(&self, transition_id: &str, marking: &Marking) -> bool {
        self.preset_of_transition(transition_id)
            .iter()
            .all(|p| marking.get(*p).copied().unwrap_or_default() > 0)
    }

    /// Fire a transition, returning the successor marking
    ///
    /// Removes one token from each distinct input place and adds one token to each distinct output place.
    /// Duplicate arcs between the same pair of nodes move a single token.
    /// Returns `None` if an output place cannot hold another token.
    pub fn fire(&self, transition_id: &str, marking: &Marking) -> Option<Marking> {
        let mut result = marking.clone();
        let inputs: HashSet<&str> = self.preset_of_transition(transition_id).into_iter().collect();
        let outputs: HashSet<&str> = self
            .postset_of_transition(transition_id)
            .into_iter()
            .collect();
        for p in inputs {
            if let Some(count) = result.get_mut(p) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    result.remove(p);
                }
            }
        }
        for p in outputs {
            let count = result.entry(p.to_string()).or_default();
            *count = count.checked_add(1)?;
        }
        Some(result)
    }

    /// Export Petri net to a PNML file
    ///
    /// The PNML file is written to the specified filepath
    ///
    /// _Note_: This is an export method for __saving__ the Petri net data.
    /// The resulting file can also be imported as a Petri net again (see [`PetriNet::load_from_path`]).
    pub fn export_pnml<P: AsRef<std::path::Path>>(&self, path: P) -> crate::Result<()> {
        super::export_pnml::export_petri_net_to_pnml_path(self, path)
    }

    #[cfg(feature = "graphviz-export")]
    /// Export Petri net as a SVG image
    ///
    /// _Note_: This is an export method for __visualizing__ the Petri net.
    ///
    /// Only available with the `graphviz-export` feature.
    pub fn export_svg<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), std::io::Error> {
        super::image_export::export_petri_net_image_svg(self, None, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence_net() -> PetriNet {
        let mut net = PetriNet::new();
        net.add_place("p0", 1, PlaceKind::Model);
        net.add_place("p1", 0, PlaceKind::Model);
        net.add_place("p2", 0, PlaceKind::Model);
        net.add_transition("t1", "a", TransitionKind::Model);
        net.add_transition("t2", "tau_1", TransitionKind::Model);
        net.add_arc("a1", "p0", "t1");
        net.add_arc("a2", "t1", "p1");
        net.add_arc("a3", "p1", "t2");
        net.add_arc("a4", "t2", "p2");
        net.final_marking = vec![("p2".into(), 1)];
        net
    }

    #[test]
    fn petri_nets() {
        let net = sequence_net();
        assert_eq!(net.preset_of_transition("t1"), vec!["p0"]);
        assert_eq!(net.postset_of_transition("t1"), vec!["p1"]);
        assert!(net.preset_of_transition("nope").is_empty());
        assert_eq!(
            net.statistics(),
            NetStatistics {
                places: 3,
                transitions: 2,
                arcs: 4
            }
        );
        assert_eq!(net.statistics().to_string(), "3,2,4");
    }

    #[test]
    fn classify_relabels_silent_transitions() {
        let mut net = sequence_net();
        net.invisible_transitions.insert("t1".into());
        net.transitions[0].name = "b".into();
        net.places[0].kind = PlaceKind::Log;
        net.classify(&ClassifyOptions::default());

        assert!(net.places.iter().all(|p| p.kind == PlaceKind::Model));
        let t1 = net.transition("t1").unwrap();
        assert_eq!(t1.kind, TransitionKind::Tau);
        assert_eq!(t1.original_name, "b");
        let t2 = net.transition("t2").unwrap();
        assert_eq!(t2.kind, TransitionKind::Tau);
        assert_eq!(t2.name, TAU_SYMBOL);
        assert_eq!(t2.original_name, "tau_1");
    }

    #[test]
    fn classify_with_custom_marker() {
        let mut net = sequence_net();
        net.classify(&ClassifyOptions {
            silent_marker: "silent".into(),
        });
        assert!(net
            .transitions
            .iter()
            .all(|t| t.kind == TransitionKind::Model));
    }

    #[test]
    fn fire_moves_tokens() {
        let net = sequence_net();
        let m0 = net.initial_marking();
        assert!(net.can_fire("t1", &m0));
        assert!(!net.can_fire("t2", &m0));
        let m1 = net.fire("t1", &m0).unwrap();
        assert_eq!(m1.get("p1"), Some(&1));
        assert_eq!(m1.get("p0"), None);
    }

    #[test]
    fn duplicate_arcs_collapse_when_firing() {
        let mut net = PetriNet::new();
        net.add_place("p0", 1, PlaceKind::Model);
        net.add_place("p1", 0, PlaceKind::Model);
        net.add_transition("t", "a", TransitionKind::Model);
        net.add_arc("a1", "p0", "t");
        net.add_arc("a2", "p0", "t");
        net.add_arc("a3", "t", "p1");
        net.add_arc("a4", "t", "p1");

        let m0 = net.initial_marking();
        // a single token satisfies both input arcs
        assert!(net.can_fire("t", &m0));
        let m1 = net.fire("t", &m0).unwrap();
        assert_eq!(m1.get("p0"), None);
        assert_eq!(m1.get("p1"), Some(&1));
    }

    #[test]
    fn fire_refuses_overflowing_place() {
        let net = sequence_net();
        let mut m0 = net.initial_marking();
        m0.insert("p1".into(), u64::MAX);
        assert!(net.can_fire("t1", &m0));
        assert_eq!(net.fire("t1", &m0), None);
    }

    #[test]
    fn place_index_is_declaration_order() {
        let net = sequence_net();
        let index = net.place_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("p2"), Some(2));
        assert_eq!(index.to_vector(&net.initial_marking()), vec![1, 0, 0]);
    }

    #[test]
    fn kinds_parse_from_tags() {
        assert_eq!("SYNC".parse::<TransitionKind>().unwrap(), TransitionKind::Sync);
        assert!("sync".parse::<TransitionKind>().is_err());
        assert_eq!("LOG".parse::<PlaceKind>().unwrap(), PlaceKind::Log);
        assert_eq!(TransitionKind::Tau.to_string(), "TAU");
    }

    #[test]
    fn json_roundtrip() {
        let net = sequence_net();
        let json = serde_json::to_string(&net).unwrap();
        let back: PetriNet = serde_json::from_str(&json).unwrap();
        assert_eq!(net, back);
    }
}
