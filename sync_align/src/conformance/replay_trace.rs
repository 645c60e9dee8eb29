use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{error::ParseError, petri_net::petri_net_struct::TransitionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
/// What a [`TraceStep`] describes
pub enum StepKind {
    /// Starting marking (always the first step)
    Initial,
    /// Marking after firing a transition of the given kind
    Move(TransitionKind),
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Initial => f.write_str("INITIAL"),
            StepKind::Move(kind) => write!(f, "{kind}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// One marking snapshot reported by the external search
pub struct TraceStep {
    /// Initial marking or kind of the move leading here
    pub kind: StepKind,
    /// Token counts of the reported places (in file order)
    pub places: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
///
/// Sequence of marking snapshots, as written by the external search for a counterexample
///
/// Step 0 is always [`StepKind::Initial`].
///
/// ## Format
///
/// Line based, all other lines are ignored:
/// - A line containing `action` starts a new step. Its kind is the last of
///   `LOG`, `MODEL`, `SYNC`, `TAU` that occurs in the line.
/// - A line containing `place` adds a record to the current step.
///   Of its whitespace-separated tokens, the third from the end (up to the first `:`) is the place id
///   and the last one is the token count.
///
/// Records before the first `action` line belong to the initial step.
pub struct ReplayTrace {
    /// All steps in order
    pub steps: Vec<TraceStep>,
}

impl ReplayTrace {
    /// Steps after the initial one
    pub fn moves(&self) -> &[TraceStep] {
        self.steps.get(1..).unwrap_or_default()
    }

    /// Parse a trace from a reader
    pub fn from_reader<R: BufRead>(reader: R) -> crate::Result<Self> {
        let mut parser = TraceParser::new();
        for (i, line) in reader.lines().enumerate() {
            parser.line(i + 1, &line?)?;
        }
        Ok(parser.finish())
    }

    /// Parse a trace file
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl FromStr for ReplayTrace {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TraceParser::new();
        for (i, line) in s.lines().enumerate() {
            parser.line(i + 1, line)?;
        }
        Ok(parser.finish())
    }
}

struct TraceParser {
    steps: Vec<TraceStep>,
    current: TraceStep,
}

impl TraceParser {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            current: TraceStep {
                kind: StepKind::Initial,
                places: Vec::new(),
            },
        }
    }

    fn line(&mut self, line_number: usize, line: &str) -> Result<(), ParseError> {
        if line.contains("action") {
            let kind = TransitionKind::ALL
                .into_iter()
                .filter(|kind| line.contains(kind.as_str()))
                .last()
                .ok_or_else(|| ParseError::InvalidLine {
                    line: line_number,
                    reason: format!("no move kind in action line `{line}`"),
                })?;
            let finished = std::mem::replace(
                &mut self.current,
                TraceStep {
                    kind: StepKind::Move(kind),
                    places: Vec::new(),
                },
            );
            self.steps.push(finished);
        } else if line.contains("place") {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 {
                return Err(ParseError::InvalidLine {
                    line: line_number,
                    reason: format!("unable to parse place record `{line}`"),
                });
            }
            let place_id = tokens[tokens.len() - 3]
                .split(':')
                .next()
                .unwrap_or_default();
            let count_text = tokens[tokens.len() - 1];
            let count = count_text.parse().map_err(|_| ParseError::InvalidLine {
                line: line_number,
                reason: format!("invalid token count `{count_text}`"),
            })?;
            self.current.places.push((place_id.to_string(), count));
        }
        Ok(())
    }

    fn finish(mut self) -> ReplayTrace {
        self.steps.push(self.current);
        ReplayTrace { steps: self.steps }
    }
}
