//! Error taxonomy for the engine.
//!
//! Only genuine contract violations are errors. A walk that runs out of
//! step budget reports `WalkStatus::StepBudgetExceeded` as data, an
//! infeasible branch is a silent non-event, and a failing checker is
//! isolated at the dispatch boundary. What remains here is unparseable
//! input and control constructs the CFG builder does not recognize.

use thiserror::Error;

/// Errors that abort an analysis run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The function body contains a control construct outside the
    /// builder's recognized set. The walker assumes every terminator it
    /// sees belongs to that set, so this is fatal for the run rather
    /// than recoverable per function.
    #[error("unsupported control construct `{construct}` at line {line}")]
    UnsupportedConstruct { construct: &'static str, line: usize },

    /// The external parser rejected the source text.
    #[error("failed to parse source: {0}")]
    Parse(#[from] syn::Error),
}
