//! Control flow graph over one function body.
//!
//! The builder lowers a `syn::Block` into basic blocks of elements in
//! source evaluation order. Every branching construct ends a block with a
//! terminator from a closed set; unconditional transfers (returns, loop
//! back-edges, `for`/`match` dispatch) are plain successor edges with no
//! terminator. For a terminator block, `successors[0]` is the edge taken
//! when the condition is true and `successors[1]` the edge when it is
//! false; the walker relies on that ordering.

mod builder;

use std::fmt;

use syn::{Expr, ExprField, ExprMethodCall};

use crate::errors::EngineError;

/// Name of a declared symbol within the analyzed function.
///
/// Scoping is flat per function; a shadowing redeclaration collapses onto
/// the same symbol, which is conservative for the constraints tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a basic block within its CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// A specific location in the CFG: block plus element index within it.
///
/// The index ranges over `[0, elements.len()]`; the top value means
/// "about to evaluate the terminator or leave the block".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramPoint {
    pub block: BlockId,
    pub index: usize,
}

impl ProgramPoint {
    pub fn new(block: BlockId, index: usize) -> Self {
        Self { block, index }
    }

    /// The point at which a block is entered.
    pub fn block_entry(block: BlockId) -> Self {
        Self { block, index: 0 }
    }

    /// The point just after the current one within the same block.
    pub fn next(self) -> Self {
        Self {
            block: self.block,
            index: self.index + 1,
        }
    }
}

/// One evaluation step inside a basic block.
#[derive(Debug, Clone)]
pub enum ElementKind {
    /// `let x;` or `let x: T = init;`
    Declaration {
        symbol: Symbol,
        ty: Option<String>,
        init: Option<Expr>,
    },
    /// `x = value` where the target is a plain identifier. Assignments to
    /// anything more structured are lowered as opaque expressions.
    Assignment { target: Symbol, value: Expr },
    /// `receiver.method(args)`
    MethodCall { call: ExprMethodCall },
    /// `base.field`
    FieldAccess { access: ExprField },
    /// Any other evaluated expression.
    Expression { expr: Expr },
}

/// An element with its source line.
#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementKind,
    pub line: usize,
}

impl Element {
    /// Short human-readable form for logs and debug output.
    pub fn describe(&self) -> String {
        match &self.kind {
            ElementKind::Declaration { symbol, .. } => format!("declaration of `{symbol}`"),
            ElementKind::Assignment { target, .. } => format!("assignment to `{target}`"),
            ElementKind::MethodCall { call } => format!("call to `{}`", call.method),
            ElementKind::FieldAccess { access } => match &access.member {
                syn::Member::Named(name) => format!("access to field `{name}`"),
                syn::Member::Unnamed(index) => format!("access to field `{}`", index.index),
            },
            ElementKind::Expression { .. } => "expression".to_string(),
        }
    }
}

/// Which construct created a binary split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminatorKind {
    /// `if` or `while` test.
    Cond,
    /// Left operand of a short-circuit `&&`.
    And,
    /// Left operand of a short-circuit `||`.
    Or,
    /// Test of an `if` used in value position.
    Ternary,
}

/// The branching construct ending a basic block.
#[derive(Debug, Clone)]
pub struct Terminator {
    pub kind: TerminatorKind,
    pub condition: Expr,
    pub line: usize,
}

/// A basic block: elements in evaluation order, an optional terminator
/// and the ordered successor edges.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub elements: Vec<Element>,
    pub terminator: Option<Terminator>,
    pub successors: Vec<BlockId>,
}

impl Block {
    /// A block with no successors is the method exit.
    pub fn is_exit(&self) -> bool {
        self.successors.is_empty()
    }
}

/// The control flow graph of one function body.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub blocks: Vec<Block>,
    pub entry: BlockId,
}

impl Cfg {
    /// Lower a function body into its CFG.
    ///
    /// Fails with [`EngineError::UnsupportedConstruct`] when the body
    /// contains control flow outside the recognized set; the caller must
    /// treat that as fatal rather than skip the function.
    pub fn build(body: &syn::Block) -> Result<Cfg, EngineError> {
        builder::build(body)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn entry_block(&self) -> &Block {
        self.block(self.entry)
    }
}
