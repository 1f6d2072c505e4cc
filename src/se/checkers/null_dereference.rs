//! Reports member accesses whose receiver is proven null on the current
//! path. Receivers that are merely unchecked stay silent; only a value
//! actually carrying the `Null` constraint fires.

use anyhow::Result;
use syn::Expr;

use super::{Checker, CheckerContext};
use crate::cfg::ElementKind;
use crate::oracle::DeclarationKind;
use crate::se::value::Constraint;

pub struct NullDereferenceChecker;

impl Checker for NullDereferenceChecker {
    fn name(&self) -> &'static str {
        "null-dereference"
    }

    fn check_pre_statement(&mut self, context: &mut CheckerContext<'_>) -> Result<()> {
        let line = context.element().line;
        let receiver = match &context.element().kind {
            ElementKind::MethodCall { call } => (*call.receiver).clone(),
            ElementKind::FieldAccess { access } => (*access.base).clone(),
            _ => return Ok(()),
        };

        if let Some(name) = receiver_name(&receiver) {
            // a method group is not a reference; it cannot be null
            if context.oracle().declaration_kind(&name) == DeclarationKind::Method {
                return Ok(());
            }
        }

        if context.constraint_on(&receiver) == Some(Constraint::Null) {
            let target = receiver_name(&receiver).unwrap_or_else(|| "the expression".to_string());
            context.report(
                line,
                format!("NullPointerException might be thrown as '{target}' is nullable here"),
            );
        }
        Ok(())
    }
}

fn receiver_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path) => path.path.get_ident().map(|ident| ident.to_string()),
        Expr::Paren(inner) => receiver_name(&inner.expr),
        _ => None,
    }
}
