//! Pluggable diagnostic consumers driven by the walker.
//!
//! A checker receives a pre-statement callback for every element the
//! walker evaluates (including branch conditions) and may inspect the
//! current state, evaluate expressions against it and raise diagnostics.
//! Checkers run in registration order; one failing is isolated so the
//! rest of the batch is unaffected.

pub mod null_dereference;

pub use null_dereference::NullDereferenceChecker;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cfg::{Element, ProgramPoint};
use crate::oracle::SymbolOracle;
use crate::se::constraints::ConstraintManager;
use crate::se::state::ProgramState;
use crate::se::value::{Constraint, SymbolicValue};

/// A finding bound to a source line. Diagnostics are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
    pub checker: String,
}

/// What a checker may observe and do at one callback.
pub struct CheckerContext<'a> {
    point: ProgramPoint,
    element: &'a Element,
    state: &'a ProgramState,
    manager: &'a mut ConstraintManager,
    oracle: &'a dyn SymbolOracle,
    diagnostics: &'a mut Vec<Diagnostic>,
    checker: &'static str,
}

impl CheckerContext<'_> {
    pub fn point(&self) -> ProgramPoint {
        self.point
    }

    pub fn element(&self) -> &Element {
        self.element
    }

    pub fn state(&self) -> &ProgramState {
        self.state
    }

    pub fn oracle(&self) -> &dyn SymbolOracle {
        self.oracle
    }

    /// Evaluate an expression against the current state.
    ///
    /// Read-only from the walker's point of view: any implicit binding
    /// the evaluation would create is discarded with the throwaway state.
    pub fn eval(&mut self, expr: &syn::Expr) -> SymbolicValue {
        self.manager.eval(self.state, expr).1
    }

    pub fn constraint_of(&self, value: SymbolicValue) -> Option<Constraint> {
        self.state.constraint_of(value)
    }

    /// Evaluate an expression and look up the constraint on its value.
    pub fn constraint_on(&mut self, expr: &syn::Expr) -> Option<Constraint> {
        let value = self.eval(expr);
        self.constraint_of(value)
    }

    /// Raise a diagnostic attributed to the running checker.
    pub fn report(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            line,
            message: message.into(),
            checker: self.checker.to_string(),
        });
    }
}

/// One diagnostic consumer.
pub trait Checker {
    fn name(&self) -> &'static str;

    /// Called before the walker schedules the successor of an element,
    /// with the state that element produced.
    fn check_pre_statement(&mut self, context: &mut CheckerContext<'_>) -> Result<()>;
}

struct Slot {
    checker: Box<dyn Checker>,
    disabled: bool,
}

/// Runs registered checkers in order, isolating failures.
pub struct CheckerDispatcher {
    slots: Vec<Slot>,
    diagnostics: Vec<Diagnostic>,
}

impl CheckerDispatcher {
    pub fn new(checkers: Vec<Box<dyn Checker>>) -> Self {
        Self {
            slots: checkers
                .into_iter()
                .map(|checker| Slot {
                    checker,
                    disabled: false,
                })
                .collect(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn dispatch(
        &mut self,
        point: ProgramPoint,
        element: &Element,
        state: &ProgramState,
        manager: &mut ConstraintManager,
        oracle: &dyn SymbolOracle,
    ) {
        for slot in &mut self.slots {
            if slot.disabled {
                continue;
            }
            let name = slot.checker.name();
            let mut context = CheckerContext {
                point,
                element,
                state,
                manager: &mut *manager,
                oracle,
                diagnostics: &mut self.diagnostics,
                checker: name,
            };
            if let Err(error) = slot.checker.check_pre_statement(&mut context) {
                log::warn!(
                    "checker `{name}` failed at line {}: {error:#}; disabled for the rest of this function",
                    element.line
                );
                slot.disabled = true;
            }
        }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// The checkers the engine ships with.
pub fn default_checkers() -> Vec<Box<dyn Checker>> {
    vec![Box::new(NullDereferenceChecker)]
}
