//! Symbolic execution: program states, constraints, the exploded graph
//! and the walker that drives them.

pub mod checkers;
pub mod constraints;
pub mod graph;
pub mod state;
pub mod value;
pub mod walker;

pub use checkers::{default_checkers, Checker, CheckerContext, CheckerDispatcher, Diagnostic};
pub use constraints::ConstraintManager;
pub use graph::{ExplodedGraph, Node};
pub use state::ProgramState;
pub use value::{Constraint, SymbolicValue};
pub use walker::{ExplodedGraphWalker, Param, WalkResult, WalkStatus, GRATUITOUS_CONDITION};
