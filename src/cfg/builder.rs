//! Lowering from `syn` statements to basic blocks.

use syn::spanned::Spanned;
use syn::{
    BinOp, Expr, ExprBreak, ExprForLoop, ExprIf, ExprLoop, ExprMatch, ExprReturn, ExprWhile,
    Label, Local, Pat, Stmt, Type, UnOp,
};

use super::{Block, BlockId, Cfg, Element, ElementKind, Symbol, Terminator, TerminatorKind};
use crate::errors::EngineError;

pub(super) fn build(body: &syn::Block) -> Result<Cfg, EngineError> {
    let mut builder = CfgBuilder::new();
    builder.lower_block_stmts(body)?;
    Ok(builder.finish())
}

#[derive(Default)]
struct BlockBuilder {
    elements: Vec<Element>,
    terminator: Option<Terminator>,
    successors: Vec<BlockId>,
    sealed: bool,
}

struct LoopFrame {
    label: Option<String>,
    continue_target: BlockId,
    break_target: BlockId,
}

struct CfgBuilder {
    blocks: Vec<BlockBuilder>,
    current: BlockId,
    entry: BlockId,
    exit: BlockId,
    loops: Vec<LoopFrame>,
}

impl CfgBuilder {
    fn new() -> Self {
        let exit = BlockBuilder {
            sealed: true,
            ..BlockBuilder::default()
        };
        Self {
            blocks: vec![exit, BlockBuilder::default()],
            current: BlockId(1),
            entry: BlockId(1),
            exit: BlockId(0),
            loops: Vec::new(),
        }
    }

    fn finish(self) -> Cfg {
        let exit = self.exit;
        let blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(index, block)| Block {
                id: BlockId(index),
                elements: block.elements,
                terminator: block.terminator,
                // a block left open runs off the end of the function
                successors: if block.sealed {
                    block.successors
                } else {
                    vec![exit]
                },
            })
            .collect();
        Cfg {
            blocks,
            entry: self.entry,
        }
    }

    fn new_block(&mut self) -> BlockId {
        self.blocks.push(BlockBuilder::default());
        BlockId(self.blocks.len() - 1)
    }

    fn start_at(&mut self, id: BlockId) {
        self.current = id;
    }

    fn push_element(&mut self, kind: ElementKind, line: usize) {
        let block = &mut self.blocks[self.current.0];
        debug_assert!(!block.sealed, "element pushed into a sealed block");
        block.elements.push(Element { kind, line });
    }

    fn seal(&mut self, terminator: Option<Terminator>, successors: Vec<BlockId>) {
        let block = &mut self.blocks[self.current.0];
        debug_assert!(!block.sealed, "block sealed twice");
        block.terminator = terminator;
        block.successors = successors;
        block.sealed = true;
    }

    fn seal_goto(&mut self, target: BlockId) {
        self.seal(None, vec![target]);
    }

    fn lower_block_stmts(&mut self, block: &syn::Block) -> Result<(), EngineError> {
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), EngineError> {
        match stmt {
            Stmt::Local(local) => self.lower_local(local),
            Stmt::Expr(expr, _) => self.lower_expr_stmt(expr),
            Stmt::Macro(stmt_macro) => {
                let line = line_of(stmt_macro);
                let expr = Expr::Macro(syn::ExprMacro {
                    attrs: Vec::new(),
                    mac: stmt_macro.mac.clone(),
                });
                self.push_element(ElementKind::Expression { expr }, line);
                Ok(())
            }
            // nested items do not execute as part of this body
            Stmt::Item(_) => Ok(()),
        }
    }

    fn lower_local(&mut self, local: &Local) -> Result<(), EngineError> {
        let line = line_of(local);
        if let Some(init) = &local.init {
            if init.diverge.is_some() {
                return Err(EngineError::UnsupportedConstruct {
                    construct: "let-else binding",
                    line,
                });
            }
        }
        let (name, ty) = binding_of(&local.pat);
        let init_expr = local.init.as_ref().map(|init| &*init.expr);
        if let Some(expr) = init_expr {
            // a conditional initializer splits paths before the binding
            if let Expr::If(cond) = expr {
                self.lower_ternary(cond)?;
            } else {
                self.lower_nested_calls(expr)?;
            }
        }
        match name {
            Some(name) => self.push_element(
                ElementKind::Declaration {
                    symbol: Symbol::new(name),
                    ty,
                    init: init_expr.cloned(),
                },
                line,
            ),
            None => {
                // destructuring patterns bind nothing the engine tracks;
                // the initializer is still evaluated
                if let Some(expr) = init_expr {
                    self.push_element(ElementKind::Expression { expr: expr.clone() }, line);
                }
            }
        }
        Ok(())
    }

    fn lower_expr_stmt(&mut self, expr: &Expr) -> Result<(), EngineError> {
        match expr {
            Expr::If(e) => self.lower_if(e),
            Expr::While(e) => self.lower_while(e),
            Expr::ForLoop(e) => self.lower_for(e),
            Expr::Loop(e) => self.lower_loop(e),
            Expr::Match(e) => self.lower_match(e),
            Expr::Return(e) => self.lower_return(e),
            Expr::Break(e) => self.lower_break(e),
            Expr::Continue(e) => {
                let frame = self.innermost_loop(
                    e.label.as_ref().map(|l| l.ident.to_string()),
                    line_of(e),
                    "continue outside of a loop",
                )?;
                let target = frame.continue_target;
                self.seal_goto(target);
                let unreachable = self.new_block();
                self.start_at(unreachable);
                Ok(())
            }
            Expr::Block(e) => self.lower_block_stmts(&e.block),
            Expr::Unsafe(e) => self.lower_block_stmts(&e.block),
            Expr::Assign(e) => self.lower_assign(e),
            Expr::Async(e) => Err(EngineError::UnsupportedConstruct {
                construct: "async block",
                line: line_of(e),
            }),
            Expr::TryBlock(e) => Err(EngineError::UnsupportedConstruct {
                construct: "try block",
                line: line_of(e),
            }),
            Expr::Yield(e) => Err(EngineError::UnsupportedConstruct {
                construct: "yield expression",
                line: line_of(e),
            }),
            other => self.lower_value_expr(other),
        }
    }

    fn lower_assign(&mut self, assign: &syn::ExprAssign) -> Result<(), EngineError> {
        let line = line_of(assign);
        self.lower_nested_calls(&assign.right)?;
        match ident_of(&assign.left) {
            Some(target) => self.push_element(
                ElementKind::Assignment {
                    target: Symbol::new(target),
                    value: (*assign.right).clone(),
                },
                line,
            ),
            None => {
                // assignment through a field or index is opaque to the
                // binding store but both sides are still evaluated
                self.lower_nested_calls(&assign.left)?;
                self.push_element(
                    ElementKind::Expression {
                        expr: Expr::Assign(assign.clone()),
                    },
                    line,
                );
            }
        }
        Ok(())
    }

    fn lower_if(&mut self, e: &ExprIf) -> Result<(), EngineError> {
        let then_id = self.new_block();
        let else_id = self.new_block();
        let join_id = if e.else_branch.is_some() {
            self.new_block()
        } else {
            else_id
        };
        self.lower_condition(&e.cond, TerminatorKind::Cond, then_id, else_id)?;
        self.start_at(then_id);
        self.lower_block_stmts(&e.then_branch)?;
        self.seal_goto(join_id);
        if let Some((_, else_expr)) = &e.else_branch {
            self.start_at(else_id);
            match &**else_expr {
                Expr::Block(b) => self.lower_block_stmts(&b.block)?,
                Expr::If(nested) => self.lower_if(nested)?,
                other => self.lower_expr_stmt(other)?,
            }
            self.seal_goto(join_id);
        }
        self.start_at(join_id);
        Ok(())
    }

    /// An `if` in value position: both arms are explored, the enclosing
    /// element then evaluates the whole expression.
    fn lower_ternary(&mut self, e: &ExprIf) -> Result<(), EngineError> {
        let then_id = self.new_block();
        let else_id = self.new_block();
        let join_id = self.new_block();
        self.lower_condition(&e.cond, TerminatorKind::Ternary, then_id, else_id)?;
        self.start_at(then_id);
        self.lower_block_stmts(&e.then_branch)?;
        self.seal_goto(join_id);
        self.start_at(else_id);
        if let Some((_, else_expr)) = &e.else_branch {
            match &**else_expr {
                Expr::Block(b) => self.lower_block_stmts(&b.block)?,
                Expr::If(nested) => self.lower_ternary(nested)?,
                other => self.lower_expr_stmt(other)?,
            }
        }
        self.seal_goto(join_id);
        self.start_at(join_id);
        Ok(())
    }

    fn lower_while(&mut self, e: &ExprWhile) -> Result<(), EngineError> {
        let header = self.new_block();
        let body = self.new_block();
        let after = self.new_block();
        self.seal_goto(header);
        self.start_at(header);
        self.lower_condition(&e.cond, TerminatorKind::Cond, body, after)?;
        self.loops.push(LoopFrame {
            label: label_name(&e.label),
            continue_target: header,
            break_target: after,
        });
        self.start_at(body);
        let result = self.lower_block_stmts(&e.body);
        self.loops.pop();
        result?;
        self.seal_goto(header);
        self.start_at(after);
        Ok(())
    }

    fn lower_loop(&mut self, e: &ExprLoop) -> Result<(), EngineError> {
        let header = self.new_block();
        let after = self.new_block();
        self.seal_goto(header);
        self.loops.push(LoopFrame {
            label: label_name(&e.label),
            continue_target: header,
            break_target: after,
        });
        self.start_at(header);
        let result = self.lower_block_stmts(&e.body);
        self.loops.pop();
        result?;
        self.seal_goto(header);
        self.start_at(after);
        Ok(())
    }

    fn lower_for(&mut self, e: &ExprForLoop) -> Result<(), EngineError> {
        self.lower_value_expr(&e.expr)?;
        let header = self.new_block();
        let body = self.new_block();
        let after = self.new_block();
        self.seal_goto(header);
        self.start_at(header);
        // iteration dispatch either enters the body or falls out; neither
        // side carries a constraint
        self.seal(None, vec![body, after]);
        self.loops.push(LoopFrame {
            label: label_name(&e.label),
            continue_target: header,
            break_target: after,
        });
        self.start_at(body);
        let result = self.lower_block_stmts(&e.body);
        self.loops.pop();
        result?;
        self.seal_goto(header);
        self.start_at(after);
        Ok(())
    }

    fn lower_match(&mut self, e: &ExprMatch) -> Result<(), EngineError> {
        self.lower_value_expr(&e.expr)?;
        if e.arms.is_empty() {
            self.seal_goto(self.exit);
            let unreachable = self.new_block();
            self.start_at(unreachable);
            return Ok(());
        }
        let join = self.new_block();
        let arm_ids: Vec<BlockId> = e.arms.iter().map(|_| self.new_block()).collect();
        self.seal(None, arm_ids.clone());
        for (arm, id) in e.arms.iter().zip(&arm_ids) {
            self.start_at(*id);
            if let Some((_, guard)) = &arm.guard {
                self.lower_nested_calls(guard)?;
            }
            self.lower_expr_stmt(&arm.body)?;
            self.seal_goto(join);
        }
        self.start_at(join);
        Ok(())
    }

    fn lower_return(&mut self, e: &ExprReturn) -> Result<(), EngineError> {
        if let Some(value) = &e.expr {
            self.lower_value_expr(value)?;
        }
        self.seal(None, vec![self.exit]);
        let unreachable = self.new_block();
        self.start_at(unreachable);
        Ok(())
    }

    fn lower_break(&mut self, e: &ExprBreak) -> Result<(), EngineError> {
        if let Some(value) = &e.expr {
            self.lower_value_expr(value)?;
        }
        let frame = self.innermost_loop(
            e.label.as_ref().map(|l| l.ident.to_string()),
            line_of(e),
            "break outside of a loop",
        )?;
        let target = frame.break_target;
        self.seal_goto(target);
        let unreachable = self.new_block();
        self.start_at(unreachable);
        Ok(())
    }

    fn innermost_loop(
        &self,
        label: Option<String>,
        line: usize,
        construct: &'static str,
    ) -> Result<&LoopFrame, EngineError> {
        let frame = match &label {
            Some(name) => self
                .loops
                .iter()
                .rev()
                .find(|frame| frame.label.as_deref() == Some(name)),
            None => self.loops.last(),
        };
        frame.ok_or(EngineError::UnsupportedConstruct { construct, line })
    }

    /// Split a branch condition, decomposing short-circuit operators into
    /// chained blocks so that each split tests a single condition.
    fn lower_condition(
        &mut self,
        cond: &Expr,
        kind: TerminatorKind,
        true_target: BlockId,
        false_target: BlockId,
    ) -> Result<(), EngineError> {
        match cond {
            Expr::Paren(inner) => self.lower_condition(&inner.expr, kind, true_target, false_target),
            Expr::Group(inner) => self.lower_condition(&inner.expr, kind, true_target, false_target),
            Expr::Binary(binary) if matches!(binary.op, BinOp::And(_)) => {
                let rhs = self.new_block();
                self.lower_condition(&binary.left, TerminatorKind::And, rhs, false_target)?;
                self.start_at(rhs);
                self.lower_condition(&binary.right, kind, true_target, false_target)
            }
            Expr::Binary(binary) if matches!(binary.op, BinOp::Or(_)) => {
                let rhs = self.new_block();
                self.lower_condition(&binary.left, TerminatorKind::Or, true_target, rhs)?;
                self.start_at(rhs);
                self.lower_condition(&binary.right, kind, true_target, false_target)
            }
            Expr::Unary(unary) if matches!(unary.op, UnOp::Not(_)) => {
                self.lower_condition(&unary.expr, kind, false_target, true_target)
            }
            leaf => {
                self.lower_nested_calls(leaf)?;
                let line = line_of(leaf);
                self.seal(
                    Some(Terminator {
                        kind,
                        condition: leaf.clone(),
                        line,
                    }),
                    vec![true_target, false_target],
                );
                Ok(())
            }
        }
    }

    /// Emit elements for an expression evaluated for its value.
    fn lower_value_expr(&mut self, expr: &Expr) -> Result<(), EngineError> {
        match expr {
            Expr::MethodCall(_) | Expr::Field(_) => self.lower_nested_calls(expr),
            other => {
                self.lower_nested_calls(other)?;
                self.push_element(
                    ElementKind::Expression {
                        expr: other.clone(),
                    },
                    line_of(other),
                );
                Ok(())
            }
        }
    }

    /// Emit one element per member access nested in `expr`, innermost
    /// receiver first so elements follow evaluation order.
    fn lower_nested_calls(&mut self, expr: &Expr) -> Result<(), EngineError> {
        match expr {
            Expr::MethodCall(call) => {
                self.lower_nested_calls(&call.receiver)?;
                for arg in &call.args {
                    self.lower_nested_calls(arg)?;
                }
                self.push_element(ElementKind::MethodCall { call: call.clone() }, line_of(call));
                Ok(())
            }
            Expr::Field(access) => {
                self.lower_nested_calls(&access.base)?;
                self.push_element(
                    ElementKind::FieldAccess {
                        access: access.clone(),
                    },
                    line_of(access),
                );
                Ok(())
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    self.lower_nested_calls(arg)?;
                }
                Ok(())
            }
            Expr::Paren(inner) => self.lower_nested_calls(&inner.expr),
            Expr::Group(inner) => self.lower_nested_calls(&inner.expr),
            Expr::Reference(inner) => self.lower_nested_calls(&inner.expr),
            Expr::Unary(inner) => self.lower_nested_calls(&inner.expr),
            Expr::Cast(inner) => self.lower_nested_calls(&inner.expr),
            Expr::Try(inner) => self.lower_nested_calls(&inner.expr),
            Expr::Binary(binary) => {
                self.lower_nested_calls(&binary.left)?;
                self.lower_nested_calls(&binary.right)
            }
            Expr::Index(index) => {
                self.lower_nested_calls(&index.expr)?;
                self.lower_nested_calls(&index.index)
            }
            Expr::Tuple(tuple) => {
                for elem in &tuple.elems {
                    self.lower_nested_calls(elem)?;
                }
                Ok(())
            }
            Expr::Array(array) => {
                for elem in &array.elems {
                    self.lower_nested_calls(elem)?;
                }
                Ok(())
            }
            Expr::Struct(expr_struct) => {
                for field in &expr_struct.fields {
                    self.lower_nested_calls(&field.expr)?;
                }
                Ok(())
            }
            Expr::Range(range) => {
                if let Some(start) = &range.start {
                    self.lower_nested_calls(start)?;
                }
                if let Some(end) = &range.end {
                    self.lower_nested_calls(end)?;
                }
                Ok(())
            }
            Expr::Await(e) => Err(EngineError::UnsupportedConstruct {
                construct: "await expression",
                line: line_of(e),
            }),
            _ => Ok(()),
        }
    }
}

fn line_of<T: Spanned>(node: &T) -> usize {
    node.span().start().line
}

fn label_name(label: &Option<Label>) -> Option<String> {
    label.as_ref().map(|l| l.name.ident.to_string())
}

fn ident_of(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path) => path.path.get_ident().map(|ident| ident.to_string()),
        _ => None,
    }
}

fn binding_of(pat: &Pat) -> (Option<String>, Option<String>) {
    match pat {
        Pat::Ident(p) => (Some(p.ident.to_string()), None),
        Pat::Type(p) => {
            let ty = type_name(&p.ty);
            match &*p.pat {
                Pat::Ident(inner) => (Some(inner.ident.to_string()), ty),
                _ => (None, ty),
            }
        }
        _ => (None, None),
    }
}

fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        Type::Reference(reference) => type_name(&reference.elem),
        Type::Paren(paren) => type_name(&paren.elem),
        _ => None,
    }
}
