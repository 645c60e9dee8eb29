use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
/// Rendering options for a [`ReachabilityConstraint`]
pub struct ConstraintOptions {
    /// Leave out all `place==0` terms
    pub omit_zero_targets: bool,
    /// Wrap the conjunction as `!( ... )` (the form expected by LTSmin invariant checks)
    pub negate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
///
/// Conjunction of `place == tokens` terms describing the final marking of a synchronous product
///
/// Terms keep their insertion order: model final marking first, then the log places.
pub struct ReachabilityConstraint {
    terms: Vec<(String, u64)>,
}

impl ReachabilityConstraint {
    /// Create an empty constraint
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `place == tokens` term
    pub fn push(&mut self, place_id: impl Into<String>, tokens: u64) {
        self.terms.push((place_id.into(), tokens));
    }

    /// All terms in order
    pub fn terms(&self) -> &[(String, u64)] {
        &self.terms
    }

    /// Render the constraint as text
    ///
    /// With default options every term is rendered, e.g. `p_end==1 && logp0==0 && logp1==1`.
    pub fn render(&self, options: &ConstraintOptions) -> String {
        let body = self
            .terms
            .iter()
            .filter(|(_, tokens)| !options.omit_zero_targets || *tokens != 0)
            .map(|(place, tokens)| format!("{place}=={tokens}"))
            .collect::<Vec<_>>()
            .join(" && ");
        if options.negate {
            format!("!({body})")
        } else {
            body
        }
    }
}

impl fmt::Display for ReachabilityConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&ConstraintOptions::default()))
    }
}
