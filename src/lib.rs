// Export modules for library usage
pub mod cfg;
pub mod config;
pub mod engine;
pub mod errors;
pub mod oracle;
pub mod se;

// Re-export commonly used types
pub use crate::cfg::{
    Block, BlockId, Cfg, Element, ElementKind, ProgramPoint, Symbol, Terminator, TerminatorKind,
};

pub use crate::config::AnalysisConfig;

pub use crate::engine::{Engine, FileAnalysis, FunctionAnalysis};

pub use crate::errors::EngineError;

pub use crate::oracle::{DeclarationKind, DefaultOracle, MapOracle, SymbolOracle};

pub use crate::se::checkers::NullDereferenceChecker;

pub use crate::se::{
    default_checkers, Checker, CheckerContext, Constraint, ConstraintManager, Diagnostic,
    ExplodedGraph, ExplodedGraphWalker, Param, ProgramState, SymbolicValue, WalkResult, WalkStatus,
};
