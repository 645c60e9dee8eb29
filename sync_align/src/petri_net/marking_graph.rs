use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use itertools::Itertools;
use petgraph::graph::{DiGraph, NodeIndex};

use super::petri_net_struct::{Marking, PetriNet, TransitionKind};

/// Default bound on the number of states explored by [`build_marking_graph`]
pub const DEFAULT_STATE_LIMIT: usize = 10_000;

#[derive(Debug, Default)]
/// Hands out consecutive state ids, starting at 0
pub struct IdGenerator {
    next: usize,
}

impl IdGenerator {
    /// Next unused id
    pub fn next_id(&mut self) -> usize {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Reachable marking
pub struct MarkingState {
    /// State id (0 is the initial marking)
    pub id: usize,
    /// Marked places and their token counts
    pub marking: BTreeMap<String, u64>,
}

impl fmt::Display for MarkingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.marking
                .iter()
                .map(|(place, tokens)| {
                    if *tokens == 1 {
                        place.clone()
                    } else {
                        format!("{tokens}*{place}")
                    }
                })
                .join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Firing of a transition between two [`MarkingState`]s
pub struct MarkingEdge {
    /// Transition id
    pub transition_id: String,
    /// Transition name before relabeling
    pub label: String,
    /// Transition kind
    pub kind: TransitionKind,
}

#[derive(Debug, Clone)]
///
/// Reachable state space of a [`PetriNet`], explored breadth-first
///
/// Uses the presence-only enabling rule of [`PetriNet::can_fire`] and [`PetriNet::fire`].
/// Only meant for inspecting small nets.
pub struct MarkingGraph {
    /// States and transitions between them
    pub graph: DiGraph<MarkingState, MarkingEdge>,
    /// Whether all reachable states were explored (i.e., the state limit was not hit)
    pub complete: bool,
}

fn canonical(marking: &Marking) -> BTreeMap<String, u64> {
    marking
        .iter()
        .filter(|(_, tokens)| **tokens > 0)
        .map(|(place, tokens)| (place.clone(), *tokens))
        .collect()
}

///
/// Build the [`MarkingGraph`] of a net
///
/// At most `limit` states are created. Once the limit is reached, edges leading to unseen markings are dropped
/// and the result is flagged as incomplete.
pub fn build_marking_graph(net: &PetriNet, limit: usize) -> MarkingGraph {
    let mut ids = IdGenerator::default();
    let mut graph: DiGraph<MarkingState, MarkingEdge> = DiGraph::new();
    let mut seen: HashMap<BTreeMap<String, u64>, NodeIndex> = HashMap::new();
    let mut queue: VecDeque<(NodeIndex, Marking)> = VecDeque::new();
    let mut complete = true;

    let initial = net.initial_marking();
    let start = graph.add_node(MarkingState {
        id: ids.next_id(),
        marking: canonical(&initial),
    });
    seen.insert(canonical(&initial), start);
    queue.push_back((start, initial));

    while let Some((from, marking)) = queue.pop_front() {
        for transition in &net.transitions {
            if !net.can_fire(&transition.id, &marking) {
                continue;
            }
            let Some(successor) = net.fire(&transition.id, &marking) else {
                complete = false;
                continue;
            };
            let key = canonical(&successor);
            let to = match seen.get(&key).copied() {
                Some(to) => to,
                None if graph.node_count() >= limit => {
                    complete = false;
                    continue;
                }
                None => {
                    let to = graph.add_node(MarkingState {
                        id: ids.next_id(),
                        marking: key.clone(),
                    });
                    seen.insert(key, to);
                    queue.push_back((to, successor));
                    to
                }
            };
            graph.add_edge(
                from,
                to,
                MarkingEdge {
                    transition_id: transition.id.clone(),
                    label: transition.original_name.clone(),
                    kind: transition.kind,
                },
            );
        }
    }
    if !complete {
        tracing::warn!(
            "Marking graph truncated after {} states",
            graph.node_count()
        );
    }
    MarkingGraph { graph, complete }
}
