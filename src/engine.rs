//! Per-function orchestration and the batch driver.
//!
//! The `Engine` is the one context object a run needs: configuration,
//! the symbol oracle and the checker factory live here, get passed down
//! explicitly, and are dropped when the engine is. Each analyzed
//! function gets a fresh walker universe (states, exploded graph,
//! worklist) that is discarded at function end, so functions share no
//! mutable state and whole files can be fanned out across threads.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use syn::spanned::Spanned;
use syn::{FnArg, ImplItem, Item, Pat, Type};

use crate::cfg::Cfg;
use crate::config::AnalysisConfig;
use crate::errors::EngineError;
use crate::oracle::{DefaultOracle, SymbolOracle};
use crate::se::checkers::{default_checkers, Checker, Diagnostic};
use crate::se::walker::{ExplodedGraphWalker, Param, WalkStatus};

/// Outcome of analyzing one function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionAnalysis {
    pub name: String,
    pub line: usize,
    pub status: WalkStatus,
    pub steps: usize,
    pub nodes: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of analyzing one source file, function by function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub functions: Vec<FunctionAnalysis>,
}

impl FileAnalysis {
    /// All diagnostics across the file's functions.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.functions.iter().flat_map(|f| f.diagnostics.iter())
    }

    /// Functions whose exploration hit the step budget.
    pub fn aborted_functions(&self) -> impl Iterator<Item = &FunctionAnalysis> {
        self.functions
            .iter()
            .filter(|f| f.status == WalkStatus::StepBudgetExceeded)
    }
}

type CheckerFactory = Box<dyn Fn() -> Vec<Box<dyn Checker>> + Send + Sync>;

/// The engine: owns everything shared across a batch, hands each
/// function its own disposable walker.
pub struct Engine {
    config: AnalysisConfig,
    oracle: Arc<dyn SymbolOracle>,
    checker_factory: CheckerFactory,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl Engine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            oracle: Arc::new(DefaultOracle),
            checker_factory: Box::new(default_checkers),
        }
    }

    /// Replace the structural fallback with a caller-provided oracle.
    pub fn with_oracle(mut self, oracle: Arc<dyn SymbolOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Replace the shipped checker set. The factory runs once per
    /// analyzed function so every walk gets fresh checker instances.
    pub fn with_checkers(
        mut self,
        factory: impl Fn() -> Vec<Box<dyn Checker>> + Send + Sync + 'static,
    ) -> Self {
        self.checker_factory = Box::new(factory);
        self
    }

    /// Analyze a single function body.
    pub fn analyze_function(
        &self,
        name: &str,
        line: usize,
        body: &syn::Block,
        params: &[Param],
    ) -> Result<FunctionAnalysis, EngineError> {
        let cfg = Cfg::build(body)?;
        log::debug!(
            "exploring exploded graph for `{name}` at line {line} ({} blocks)",
            cfg.blocks.len()
        );
        let walker = ExplodedGraphWalker::new(
            &cfg,
            self.oracle.as_ref(),
            (self.checker_factory)(),
            self.config.max_steps,
        );
        let result = walker.walk(params);
        if result.status == WalkStatus::StepBudgetExceeded {
            log::warn!(
                "symbolic execution of `{name}` stopped after {} steps, keeping {} diagnostics",
                result.steps,
                result.diagnostics.len()
            );
        }
        Ok(FunctionAnalysis {
            name: name.to_string(),
            line,
            status: result.status,
            steps: result.steps,
            nodes: result.nodes,
            diagnostics: result.diagnostics,
        })
    }

    /// Analyze every function of one source file in declaration order.
    pub fn analyze_source(&self, source: &str) -> Result<FileAnalysis, EngineError> {
        let file = syn::parse_file(source)?;
        let mut functions = Vec::new();
        for (name, line, params, body) in collect_functions(&file) {
            functions.push(self.analyze_function(&name, line, body, &params)?);
        }
        Ok(FileAnalysis { functions })
    }

    /// Analyze a batch of source files in parallel.
    ///
    /// Files are independent units of work: each worker parses and walks
    /// its own file, so nothing is shared but the engine itself. Results
    /// come back in input order.
    pub fn analyze_sources(&self, sources: &[String]) -> Result<Vec<FileAnalysis>, EngineError> {
        sources
            .par_iter()
            .map(|source| self.analyze_source(source))
            .collect()
    }
}

/// Free functions and inherent methods of one parsed file, with their
/// formal parameters, in declaration order.
fn collect_functions(file: &syn::File) -> Vec<(String, usize, Vec<Param>, &syn::Block)> {
    let mut functions = Vec::new();
    for item in &file.items {
        match item {
            Item::Fn(function) => {
                functions.push((
                    function.sig.ident.to_string(),
                    function.sig.ident.span().start().line,
                    params_of(&function.sig),
                    &*function.block,
                ));
            }
            Item::Impl(item_impl) => {
                let self_ty = type_name(&item_impl.self_ty);
                for impl_item in &item_impl.items {
                    if let ImplItem::Fn(method) = impl_item {
                        let name = match &self_ty {
                            Some(ty) => format!("{ty}::{}", method.sig.ident),
                            None => method.sig.ident.to_string(),
                        };
                        functions.push((
                            name,
                            method.sig.ident.span().start().line,
                            params_of(&method.sig),
                            &method.block,
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    functions
}

fn params_of(signature: &syn::Signature) -> Vec<Param> {
    signature
        .inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Receiver(_) => None,
            FnArg::Typed(typed) => match &*typed.pat {
                Pat::Ident(pat) => Some(Param {
                    name: pat.ident.to_string(),
                    ty: type_name(&typed.ty),
                }),
                _ => None,
            },
        })
        .collect()
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
