//! Expression evaluation and branch assumptions.
//!
//! The `ConstraintManager` owns the fresh-value allocator for one
//! function walk and knows how to map the handful of condition shapes the
//! engine understands onto constraints. Everything it does not understand
//! degrades to "fresh unconstrained value" or "both branches feasible",
//! never to an error.

use syn::{BinOp, Expr, Lit};

use crate::cfg::Symbol;
use crate::se::state::ProgramState;
use crate::se::value::{Constraint, SymbolicValue};

/// Allocates symbolic values and interprets expressions against a state.
#[derive(Debug)]
pub struct ConstraintManager {
    next_value: u32,
}

impl Default for ConstraintManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintManager {
    pub fn new() -> Self {
        Self {
            next_value: SymbolicValue::FIRST_FRESH,
        }
    }

    /// Allocate a fresh, uninterpreted symbolic value.
    pub fn fresh(&mut self) -> SymbolicValue {
        let value = SymbolicValue(self.next_value);
        self.next_value += 1;
        value
    }

    /// The value bound to a symbol, allocating and implicitly binding a
    /// fresh one for symbols never bound on this path. An unbound symbol
    /// models a value that arrived from outside the function's
    /// visibility, such as a field read.
    pub fn lookup(&mut self, state: &ProgramState, symbol: &Symbol) -> (ProgramState, SymbolicValue) {
        match state.value_of(symbol) {
            Some(value) => (state.clone(), value),
            None => {
                let value = self.fresh();
                (state.bind(symbol.clone(), value), value)
            }
        }
    }

    /// Evaluate an expression to a symbolic value.
    ///
    /// Total: literals map to the canonical singletons,
    /// identifiers go through [`Self::lookup`], and every unmodeled
    /// expression kind yields a fresh unconstrained value.
    pub fn eval(&mut self, state: &ProgramState, expr: &Expr) -> (ProgramState, SymbolicValue) {
        match expr {
            Expr::Paren(inner) => self.eval(state, &inner.expr),
            Expr::Group(inner) => self.eval(state, &inner.expr),
            Expr::Lit(lit) => match &lit.lit {
                Lit::Bool(value) => {
                    let canonical = if value.value {
                        SymbolicValue::TRUE
                    } else {
                        SymbolicValue::FALSE
                    };
                    (state.clone(), canonical)
                }
                _ => (state.clone(), self.fresh()),
            },
            Expr::Path(path) => match path.path.get_ident() {
                Some(ident) if ident == "null" => (state.clone(), SymbolicValue::NULL),
                Some(ident) => self.lookup(state, &Symbol::new(ident.to_string())),
                None => (state.clone(), self.fresh()),
            },
            _ => (state.clone(), self.fresh()),
        }
    }

    /// Split a branch condition into its refinements.
    ///
    /// Returns `(false_state, true_state)`; a side is `None` exactly when
    /// the constraint it would need contradicts one already recorded.
    /// Conditions that do not map onto a single constrainable value leave
    /// both sides feasible with the state unchanged.
    pub fn assume_dual(
        &mut self,
        state: &ProgramState,
        condition: &Expr,
    ) -> (Option<ProgramState>, Option<ProgramState>) {
        match condition {
            Expr::Paren(inner) => self.assume_dual(state, &inner.expr),
            Expr::Group(inner) => self.assume_dual(state, &inner.expr),
            Expr::Unary(unary) if matches!(unary.op, syn::UnOp::Not(_)) => {
                let (false_state, true_state) = self.assume_dual(state, &unary.expr);
                (true_state, false_state)
            }
            Expr::Binary(binary) if matches!(binary.op, BinOp::Eq(_) | BinOp::Ne(_)) => {
                match null_comparison_operand(&binary.left, &binary.right) {
                    Some(operand) => {
                        let (state, value) = self.eval(state, operand);
                        let null_side = state.constrain(value, Constraint::Null);
                        let not_null_side = state.constrain(value, Constraint::NotNull);
                        if matches!(binary.op, BinOp::Eq(_)) {
                            (not_null_side, null_side)
                        } else {
                            (null_side, not_null_side)
                        }
                    }
                    None => both_feasible(state),
                }
            }
            Expr::Path(_) | Expr::Lit(_) => {
                let (state, value) = self.eval(state, condition);
                (
                    state.constrain(value, Constraint::False),
                    state.constrain(value, Constraint::True),
                )
            }
            _ => both_feasible(state),
        }
    }
}

fn both_feasible(state: &ProgramState) -> (Option<ProgramState>, Option<ProgramState>) {
    (Some(state.clone()), Some(state.clone()))
}

/// For `a == null` / `null != b` shapes, the operand being tested.
fn null_comparison_operand<'a>(left: &'a Expr, right: &'a Expr) -> Option<&'a Expr> {
    if is_null_literal(right) {
        Some(left)
    } else if is_null_literal(left) {
        Some(right)
    } else {
        None
    }
}

fn is_null_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Path(path) => path.path.is_ident("null"),
        Expr::Paren(inner) => is_null_literal(&inner.expr),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn fresh_values_never_repeat() {
        let mut manager = ConstraintManager::new();
        let a = manager.fresh();
        let b = manager.fresh();
        assert_ne!(a, b);
        assert!(!a.is_canonical());
    }

    #[test]
    fn literals_evaluate_to_canonical_singletons() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let null: Expr = parse_quote!(null);
        let yes: Expr = parse_quote!(true);
        let no: Expr = parse_quote!(false);
        assert_eq!(manager.eval(&state, &null).1, SymbolicValue::NULL);
        assert_eq!(manager.eval(&state, &yes).1, SymbolicValue::TRUE);
        assert_eq!(manager.eval(&state, &no).1, SymbolicValue::FALSE);
    }

    #[test]
    fn unbound_identifier_is_implicitly_bound() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let expr: Expr = parse_quote!(x);
        let (state, value) = manager.eval(&state, &expr);
        assert_eq!(state.value_of(&Symbol::new("x")), Some(value));

        // the same identifier evaluates to the same value from then on
        let (_, again) = manager.eval(&state, &expr);
        assert_eq!(again, value);
    }

    #[test]
    fn unmodeled_expressions_still_evaluate() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let expr: Expr = parse_quote!(compute(a, b) + 1);
        let (after, value) = manager.eval(&state, &expr);
        assert_eq!(after, state, "opaque evaluation leaves the state alone");
        assert!(!value.is_canonical());
    }

    #[test]
    fn equality_with_null_refines_both_branches() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let condition: Expr = parse_quote!(x == null);
        let (false_state, true_state) = manager.assume_dual(&state, &condition);

        let x = Symbol::new("x");
        let false_state = false_state.expect("unconstrained value can be non-null");
        let true_state = true_state.expect("unconstrained value can be null");
        let value = true_state.value_of(&x).expect("condition binds x");
        assert_eq!(true_state.constraint_of(value), Some(Constraint::Null));
        assert_eq!(false_state.constraint_of(value), Some(Constraint::NotNull));
    }

    #[test]
    fn inequality_with_null_mirrors_equality() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let condition: Expr = parse_quote!(null != x);
        let (false_state, true_state) = manager.assume_dual(&state, &condition);

        let x = Symbol::new("x");
        let true_state = true_state.expect("true branch feasible");
        let false_state = false_state.expect("false branch feasible");
        let value = true_state.value_of(&x).expect("condition binds x");
        assert_eq!(true_state.constraint_of(value), Some(Constraint::NotNull));
        assert_eq!(false_state.constraint_of(value), Some(Constraint::Null));
    }

    #[test]
    fn known_null_makes_the_false_branch_infeasible() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default().bind(Symbol::new("x"), SymbolicValue::NULL);
        let condition: Expr = parse_quote!(x == null);
        let (false_state, true_state) = manager.assume_dual(&state, &condition);
        assert!(false_state.is_none(), "x is null, it cannot be non-null");
        assert!(true_state.is_some());
    }

    #[test]
    fn negation_swaps_the_refinements() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default().bind(Symbol::new("x"), SymbolicValue::NULL);
        let condition: Expr = parse_quote!(!(x == null));
        let (false_state, true_state) = manager.assume_dual(&state, &condition);
        assert!(true_state.is_none());
        assert!(false_state.is_some());
    }

    #[test]
    fn boolean_literal_condition_prunes_one_side() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let condition: Expr = parse_quote!(true);
        let (false_state, true_state) = manager.assume_dual(&state, &condition);
        assert!(false_state.is_none(), "`true` never evaluates false");
        assert!(true_state.is_some());
    }

    #[test]
    fn boolean_identifier_splits_on_truth() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let condition: Expr = parse_quote!(enabled);
        let (false_state, true_state) = manager.assume_dual(&state, &condition);

        let symbol = Symbol::new("enabled");
        let true_state = true_state.expect("unconstrained flag can be true");
        let false_state = false_state.expect("unconstrained flag can be false");
        let value = true_state.value_of(&symbol).expect("condition binds the flag");
        assert_eq!(true_state.constraint_of(value), Some(Constraint::True));
        assert_eq!(false_state.constraint_of(value), Some(Constraint::False));
    }

    #[test]
    fn opaque_condition_keeps_both_branches() {
        let mut manager = ConstraintManager::new();
        let state = ProgramState::default();
        let condition: Expr = parse_quote!(a.len() > b.len());
        let (false_state, true_state) = manager.assume_dual(&state, &condition);
        assert_eq!(false_state, Some(state.clone()));
        assert_eq!(true_state, Some(state));
    }
}
