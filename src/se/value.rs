//! Symbolic values and the constraint domain.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque placeholder for an unknown runtime value.
///
/// Values compare by identity of allocation: the walker gets a fresh one
/// per evaluated expression or parameter, except for the three canonical
/// singletons shared by every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolicValue(pub(crate) u32);

impl SymbolicValue {
    /// Canonical value of the `true` literal.
    pub const TRUE: SymbolicValue = SymbolicValue(0);
    /// Canonical value of the `false` literal.
    pub const FALSE: SymbolicValue = SymbolicValue(1);
    /// Canonical value of the null reference literal.
    pub const NULL: SymbolicValue = SymbolicValue(2);

    pub(crate) const FIRST_FRESH: u32 = 3;

    pub fn is_canonical(self) -> bool {
        self.0 < Self::FIRST_FRESH
    }
}

impl fmt::Display for SymbolicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SymbolicValue::TRUE => f.write_str("TRUE"),
            SymbolicValue::FALSE => f.write_str("FALSE"),
            SymbolicValue::NULL => f.write_str("NULL"),
            SymbolicValue(id) => write!(f, "SV#{id}"),
        }
    }
}

/// An abstract fact recorded for a symbolic value along one path.
///
/// Absence of a constraint is the unconstrained element of the domain.
/// Constraints are set once per path: trying to record a contradictory
/// one makes the path infeasible instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Null,
    NotNull,
    True,
    False,
}

impl Constraint {
    /// Combine the constraint already recorded for a value with a newly
    /// assumed one.
    ///
    /// Returns `None` when the two are mutually exclusive. Boolean truth
    /// refines `NotNull` (a value known true or false cannot be null);
    /// every other differing pair is a contradiction.
    pub fn merge(existing: Constraint, incoming: Constraint) -> Option<Constraint> {
        use Constraint::*;
        if existing == incoming {
            return Some(existing);
        }
        match (existing, incoming) {
            (NotNull, True) | (NotNull, False) => Some(incoming),
            (True, NotNull) | (False, NotNull) => Some(existing),
            _ => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Constraint::Null => "NULL",
            Constraint::NotNull => "NOT_NULL",
            Constraint::True => "TRUE",
            Constraint::False => "FALSE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Constraint; 4] = [
        Constraint::Null,
        Constraint::NotNull,
        Constraint::True,
        Constraint::False,
    ];

    #[test]
    fn merge_is_idempotent() {
        for c in ALL {
            assert_eq!(Constraint::merge(c, c), Some(c));
        }
    }

    #[test]
    fn nullness_and_truth_are_mutually_exclusive() {
        assert_eq!(Constraint::merge(Constraint::Null, Constraint::NotNull), None);
        assert_eq!(Constraint::merge(Constraint::NotNull, Constraint::Null), None);
        assert_eq!(Constraint::merge(Constraint::True, Constraint::False), None);
        assert_eq!(Constraint::merge(Constraint::False, Constraint::True), None);
    }

    #[test]
    fn truth_refines_not_null() {
        assert_eq!(
            Constraint::merge(Constraint::NotNull, Constraint::True),
            Some(Constraint::True)
        );
        assert_eq!(
            Constraint::merge(Constraint::False, Constraint::NotNull),
            Some(Constraint::False)
        );
    }

    #[test]
    fn a_null_value_has_no_truth_value() {
        assert_eq!(Constraint::merge(Constraint::Null, Constraint::True), None);
        assert_eq!(Constraint::merge(Constraint::False, Constraint::Null), None);
    }

    #[test]
    fn merge_feasibility_is_symmetric() {
        for a in ALL {
            for b in ALL {
                assert_eq!(
                    Constraint::merge(a, b).is_some(),
                    Constraint::merge(b, a).is_some(),
                    "feasibility of {a} with {b}"
                );
            }
        }
    }

    #[test]
    fn canonical_values_are_distinct() {
        assert!(SymbolicValue::TRUE.is_canonical());
        assert!(SymbolicValue::FALSE.is_canonical());
        assert!(SymbolicValue::NULL.is_canonical());
        assert_ne!(SymbolicValue::TRUE, SymbolicValue::FALSE);
        assert_ne!(SymbolicValue::TRUE, SymbolicValue::NULL);
        assert_ne!(SymbolicValue::FALSE, SymbolicValue::NULL);
    }
}
