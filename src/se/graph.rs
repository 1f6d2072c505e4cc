//! The exploded graph: memoized (program point, program state) pairs.

use std::collections::HashMap;
use std::rc::Rc;

use crate::cfg::ProgramPoint;
use crate::se::state::ProgramState;

/// Canonical identity for one `(point, state)` pair.
///
/// Nodes are never mutated after creation; many worklist entries and
/// transitions may hold the same `Rc`.
#[derive(Debug)]
pub struct Node {
    pub point: ProgramPoint,
    pub state: ProgramState,
}

/// Memo table enforcing at-most-once visitation.
///
/// The first request for a pair creates its node and reports it as new,
/// which is the walker's cue to schedule it; later requests return the
/// same node un-flagged. Together with the finite constraint domain and
/// the no-growth rebinding rule this is what bounds the exploration.
#[derive(Debug, Default)]
pub struct ExplodedGraph {
    nodes: HashMap<(ProgramPoint, ProgramState), Rc<Node>>,
}

impl ExplodedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical node for a pair, plus whether this call created it.
    pub fn node(&mut self, point: ProgramPoint, state: ProgramState) -> (Rc<Node>, bool) {
        match self.nodes.entry((point, state)) {
            std::collections::hash_map::Entry::Occupied(entry) => (Rc::clone(entry.get()), false),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let node = Rc::new(Node {
                    point,
                    state: entry.key().1.clone(),
                });
                entry.insert(Rc::clone(&node));
                (node, true)
            }
        }
    }

    /// Number of distinct pairs seen so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{BlockId, Symbol};
    use crate::se::value::SymbolicValue;

    fn point(block: usize, index: usize) -> ProgramPoint {
        ProgramPoint::new(BlockId(block), index)
    }

    #[test]
    fn first_request_creates_and_flags_the_node() {
        let mut graph = ExplodedGraph::new();
        let (_, is_new) = graph.node(point(1, 0), ProgramState::default());
        assert!(is_new);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn re_requesting_a_pair_returns_the_same_node_instance() {
        let mut graph = ExplodedGraph::new();
        let (first, _) = graph.node(point(1, 0), ProgramState::default());
        let (second, is_new) = graph.node(point(1, 0), ProgramState::default());
        assert!(!is_new, "an already-seen pair must not be re-flagged");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn distinct_states_at_one_point_are_distinct_nodes() {
        let mut graph = ExplodedGraph::new();
        let base = ProgramState::default();
        let bound = base.bind(Symbol::new("x"), SymbolicValue(7));
        let (_, first_new) = graph.node(point(1, 0), base);
        let (_, second_new) = graph.node(point(1, 0), bound);
        assert!(first_new && second_new);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn distinct_points_with_one_state_are_distinct_nodes() {
        let mut graph = ExplodedGraph::new();
        let state = ProgramState::default();
        graph.node(point(1, 0), state.clone());
        graph.node(point(1, 1), state.clone());
        graph.node(point(2, 0), state);
        assert_eq!(graph.len(), 3);
    }
}
