//! Immutable per-path program state.
//!
//! A `ProgramState` is a snapshot of symbol bindings and value
//! constraints along one execution path. Updates return a new state that
//! shares structure with the old one; a state published into an
//! exploded-graph node is never mutated afterwards, so nodes may share
//! states freely without coordination.
//!
//! Two invariants matter for termination:
//! - rebinding a symbol to the value it already holds returns the same
//!   state, so loops that do not change anything do not mint new states;
//! - the constraint domain is finite, so a value can only be refined a
//!   bounded number of times per path.

use im::HashMap;

use crate::cfg::Symbol;
use crate::se::value::{Constraint, SymbolicValue};

/// Immutable snapshot of symbol bindings plus value constraints.
///
/// Equality is structural; the exploded graph keys nodes on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramState {
    values: HashMap<Symbol, SymbolicValue>,
    constraints: HashMap<SymbolicValue, Constraint>,
}

impl Default for ProgramState {
    /// The empty state still knows what the canonical literals are.
    fn default() -> Self {
        let constraints = HashMap::new()
            .update(SymbolicValue::NULL, Constraint::Null)
            .update(SymbolicValue::TRUE, Constraint::True)
            .update(SymbolicValue::FALSE, Constraint::False);
        ProgramState {
            values: HashMap::new(),
            constraints,
        }
    }
}

impl ProgramState {
    /// Rebind a symbol.
    ///
    /// Returns a state sharing the old maps when the symbol already holds
    /// an equal value; only a genuinely different binding allocates.
    pub fn bind(&self, symbol: Symbol, value: SymbolicValue) -> ProgramState {
        if self.values.get(&symbol) == Some(&value) {
            return self.clone();
        }
        ProgramState {
            values: self.values.update(symbol, value),
            constraints: self.constraints.clone(),
        }
    }

    /// The value currently bound to a symbol on this path, if any.
    pub fn value_of(&self, symbol: &Symbol) -> Option<SymbolicValue> {
        self.values.get(symbol).copied()
    }

    /// The constraint recorded for a value on this path, if any.
    pub fn constraint_of(&self, value: SymbolicValue) -> Option<Constraint> {
        self.constraints.get(&value).copied()
    }

    /// Record a constraint for a value.
    ///
    /// Returns `None` exactly when the constraint contradicts one already
    /// recorded, which makes the assuming branch infeasible. Recording a
    /// constraint the value already satisfies returns an equal state.
    pub fn constrain(&self, value: SymbolicValue, constraint: Constraint) -> Option<ProgramState> {
        match self.constraints.get(&value) {
            None => Some(ProgramState {
                values: self.values.clone(),
                constraints: self.constraints.update(value, constraint),
            }),
            Some(&existing) => Constraint::merge(existing, constraint).map(|merged| {
                if merged == existing {
                    self.clone()
                } else {
                    ProgramState {
                        values: self.values.clone(),
                        constraints: self.constraints.update(value, merged),
                    }
                }
            }),
        }
    }

    /// Number of symbol bindings, used by growth assertions in tests.
    pub fn binding_count(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fresh(id: u32) -> SymbolicValue {
        SymbolicValue(SymbolicValue::FIRST_FRESH + id)
    }

    #[test]
    fn empty_state_knows_canonical_literals() {
        let state = ProgramState::default();
        assert_eq!(state.constraint_of(SymbolicValue::NULL), Some(Constraint::Null));
        assert_eq!(state.constraint_of(SymbolicValue::TRUE), Some(Constraint::True));
        assert_eq!(state.constraint_of(SymbolicValue::FALSE), Some(Constraint::False));
        assert_eq!(state.binding_count(), 0);
    }

    #[test]
    fn bind_then_lookup_round_trips() {
        let state = ProgramState::default().bind(Symbol::new("x"), fresh(0));
        assert_eq!(state.value_of(&Symbol::new("x")), Some(fresh(0)));
        assert_eq!(state.value_of(&Symbol::new("y")), None);
    }

    #[test]
    fn rebinding_an_equal_value_does_not_grow_the_state() {
        let state = ProgramState::default().bind(Symbol::new("x"), fresh(0));
        let again = state.bind(Symbol::new("x"), fresh(0));
        assert_eq!(again, state);
        assert_eq!(again.binding_count(), 1);
    }

    #[test]
    fn rebinding_a_different_value_leaves_the_original_intact() {
        let first = ProgramState::default().bind(Symbol::new("x"), fresh(0));
        let second = first.bind(Symbol::new("x"), fresh(1));
        assert_eq!(first.value_of(&Symbol::new("x")), Some(fresh(0)));
        assert_eq!(second.value_of(&Symbol::new("x")), Some(fresh(1)));
        assert_ne!(first, second);
    }

    #[test]
    fn contradictory_constraint_kills_the_path() {
        let state = ProgramState::default();
        let constrained = state
            .constrain(fresh(0), Constraint::NotNull)
            .expect("fresh value accepts any constraint");
        assert_eq!(constrained.constrain(fresh(0), Constraint::Null), None);
    }

    #[test]
    fn redundant_constraint_returns_an_equal_state() {
        let state = ProgramState::default()
            .constrain(fresh(0), Constraint::True)
            .expect("fresh value accepts any constraint");
        let again = state
            .constrain(fresh(0), Constraint::True)
            .expect("recording the same fact stays feasible");
        assert_eq!(again, state);
    }

    #[test]
    fn canonical_literals_resist_contradiction() {
        let state = ProgramState::default();
        assert_eq!(state.constrain(SymbolicValue::NULL, Constraint::NotNull), None);
        assert_eq!(state.constrain(SymbolicValue::TRUE, Constraint::False), None);
        assert!(state.constrain(SymbolicValue::TRUE, Constraint::True).is_some());
    }

    proptest! {
        #[test]
        fn bind_is_idempotent(id in 0u32..64, name in "[a-z]{1,6}") {
            let symbol = Symbol::new(name);
            let once = ProgramState::default().bind(symbol.clone(), fresh(id));
            let twice = once.bind(symbol, fresh(id));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn constrain_never_flips_feasibility_order(
            a in 0usize..4,
            b in 0usize..4,
            id in 0u32..64,
        ) {
            const ALL: [Constraint; 4] = [
                Constraint::Null,
                Constraint::NotNull,
                Constraint::True,
                Constraint::False,
            ];
            let base = ProgramState::default();
            let one_way = base
                .constrain(fresh(id), ALL[a])
                .and_then(|s| s.constrain(fresh(id), ALL[b]))
                .is_some();
            let other_way = base
                .constrain(fresh(id), ALL[b])
                .and_then(|s| s.constrain(fresh(id), ALL[a]))
                .is_some();
            prop_assert_eq!(one_way, other_way);
        }
    }
}
