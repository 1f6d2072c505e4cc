//! Read-only boundary to the symbol and type resolution front end.
//!
//! The engine never builds symbol tables or loads type hierarchies; it
//! only asks. Callers that resolved declarations elsewhere hand the
//! engine an oracle; everyone else gets the structural fallback.

use std::collections::{HashMap, HashSet};

/// Kind of a declaration as reported by the resolution front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    LocalVariable,
    Parameter,
    Field,
    Method,
    Unknown,
}

/// Answers the three questions the engine asks about resolved symbols.
///
/// Implementations must be cheap and side-effect free; the walker may
/// query them on every explored path.
pub trait SymbolOracle: Send + Sync {
    /// What kind of declaration does this name refer to?
    fn declaration_kind(&self, name: &str) -> DeclarationKind;

    /// Is `ty` the named type or a subtype of it?
    fn is_subtype_of(&self, ty: &str, ancestor: &str) -> bool;

    /// Does the declaration carry the named annotation?
    fn has_annotation(&self, declaration: &str, annotation: &str) -> bool;
}

/// Structural fallback used when no resolution data is available.
///
/// Knows nothing beyond what the names themselves say: every declaration
/// kind is unknown, a type is only a subtype of itself, and nothing is
/// annotated.
#[derive(Debug, Default, Clone)]
pub struct DefaultOracle;

impl SymbolOracle for DefaultOracle {
    fn declaration_kind(&self, _name: &str) -> DeclarationKind {
        DeclarationKind::Unknown
    }

    fn is_subtype_of(&self, ty: &str, ancestor: &str) -> bool {
        ty == ancestor
    }

    fn has_annotation(&self, _declaration: &str, _annotation: &str) -> bool {
        false
    }
}

/// Table-driven oracle for callers that resolved symbols elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MapOracle {
    kinds: HashMap<String, DeclarationKind>,
    subtypes: HashMap<String, HashSet<String>>,
    annotations: HashMap<String, HashSet<String>>,
}

impl MapOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, name: impl Into<String>, kind: DeclarationKind) -> Self {
        self.kinds.insert(name.into(), kind);
        self
    }

    pub fn subtype(mut self, ty: impl Into<String>, ancestor: impl Into<String>) -> Self {
        self.subtypes.entry(ty.into()).or_default().insert(ancestor.into());
        self
    }

    pub fn annotate(mut self, declaration: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.annotations
            .entry(declaration.into())
            .or_default()
            .insert(annotation.into());
        self
    }
}

impl SymbolOracle for MapOracle {
    fn declaration_kind(&self, name: &str) -> DeclarationKind {
        self.kinds.get(name).copied().unwrap_or(DeclarationKind::Unknown)
    }

    fn is_subtype_of(&self, ty: &str, ancestor: &str) -> bool {
        ty == ancestor
            || self
                .subtypes
                .get(ty)
                .is_some_and(|ancestors| ancestors.contains(ancestor))
    }

    fn has_annotation(&self, declaration: &str, annotation: &str) -> bool {
        self.annotations
            .get(declaration)
            .is_some_and(|set| set.contains(annotation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_oracle_is_structural() {
        let oracle = DefaultOracle;
        assert_eq!(oracle.declaration_kind("x"), DeclarationKind::Unknown);
        assert!(oracle.is_subtype_of("bool", "bool"));
        assert!(!oracle.is_subtype_of("String", "bool"));
        assert!(!oracle.has_annotation("x", "CheckForNull"));
    }

    #[test]
    fn map_oracle_answers_from_tables() {
        let oracle = MapOracle::new()
            .declare("items", DeclarationKind::Field)
            .subtype("ArrayList", "List")
            .annotate("input", "CheckForNull");

        assert_eq!(oracle.declaration_kind("items"), DeclarationKind::Field);
        assert_eq!(oracle.declaration_kind("other"), DeclarationKind::Unknown);
        assert!(oracle.is_subtype_of("ArrayList", "List"));
        assert!(oracle.is_subtype_of("List", "List"));
        assert!(!oracle.is_subtype_of("List", "ArrayList"));
        assert!(oracle.has_annotation("input", "CheckForNull"));
        assert!(!oracle.has_annotation("input", "Nonnull"));
    }
}
