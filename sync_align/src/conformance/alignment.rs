use std::fmt;

use serde::{Deserialize, Serialize};

use crate::petri_net::petri_net_struct::{Transition, TransitionKind};

/// Symbol for the side of a move that does not advance
pub const SKIP: &str = "»";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One move of an [`Alignment`]
pub struct AlignPair {
    /// Activity label on the log side, or [`SKIP`]
    pub log: String,
    /// Transition label on the model side, or [`SKIP`]
    pub model: String,
    /// Id of the product transition this move was derived from
    pub transition_id: String,
}

impl AlignPair {
    /// Derive the move a fired product transition stands for
    ///
    /// | Kind | log side | model side |
    /// |---|---|---|
    /// | LOG | original name | skip |
    /// | MODEL | skip | original name |
    /// | SYNC | original name | original name |
    /// | TAU | skip | original name |
    pub fn from_transition(t: &Transition) -> Self {
        let (log, model) = match t.kind {
            TransitionKind::Log => (t.original_name.clone(), SKIP.to_string()),
            TransitionKind::Model | TransitionKind::Tau => {
                (SKIP.to_string(), t.original_name.clone())
            }
            TransitionKind::Sync => (t.original_name.clone(), t.original_name.clone()),
        };
        AlignPair {
            log,
            model,
            transition_id: t.id.clone(),
        }
    }

    /// Whether the log side is skipped
    pub fn is_model_move(&self) -> bool {
        self.log == SKIP
    }

    /// Whether the model side is skipped
    pub fn is_log_move(&self) -> bool {
        self.model == SKIP
    }
}

impl fmt::Display for AlignPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} | {} : {})", self.log, self.model, self.transition_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
///
/// Sequence of moves explaining a trace in terms of a model
///
/// Moves are appended in trace order and never changed afterwards.
pub struct Alignment {
    pairs: Vec<AlignPair>,
}

impl Alignment {
    /// Create an empty [`Alignment`]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, pair: AlignPair) {
        debug_assert!(
            !(pair.is_log_move() && pair.is_model_move()),
            "alignment move skips both sides"
        );
        self.pairs.push(pair);
    }

    /// All moves in order
    pub fn pairs(&self) -> &[AlignPair] {
        &self.pairs
    }

    /// Number of moves
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no moves
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pair in &self.pairs {
            writeln!(f, "{pair}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(kind: TransitionKind) -> Transition {
        Transition {
            id: "t".into(),
            name: kind.as_str().into(),
            original_name: "a".into(),
            kind,
        }
    }

    #[test]
    fn pair_derivation() {
        let log = AlignPair::from_transition(&transition(TransitionKind::Log));
        assert_eq!((log.log.as_str(), log.model.as_str()), ("a", SKIP));
        let model = AlignPair::from_transition(&transition(TransitionKind::Model));
        assert_eq!((model.log.as_str(), model.model.as_str()), (SKIP, "a"));
        let sync = AlignPair::from_transition(&transition(TransitionKind::Sync));
        assert_eq!((sync.log.as_str(), sync.model.as_str()), ("a", "a"));
        let tau = AlignPair::from_transition(&transition(TransitionKind::Tau));
        assert_eq!((tau.log.as_str(), tau.model.as_str()), (SKIP, "a"));
        assert_eq!(tau.transition_id, "t");
    }

    #[test]
    fn rendering() {
        let mut alignment = Alignment::new();
        alignment.push(AlignPair::from_transition(&transition(TransitionKind::Sync)));
        alignment.push(AlignPair::from_transition(&transition(TransitionKind::Log)));
        assert_eq!(alignment.to_string(), "(a | a : t)\n(a | » : t)\n");
        assert_eq!(alignment.len(), 2);
    }
}
