//! The symbolic-execution walker.
//!
//! A worklist-driven driver over the exploded graph of one function.
//! Each step pops a pending `(point, state)` node and either evaluates
//! the element at that point, fans the state out over unconditional
//! successor edges, or splits it through dual branch assumption. The
//! graph's memoization guarantees each distinct pair is visited at most
//! once; the step budget is the backstop for functions whose state space
//! still will not converge (fresh values minted inside a loop, for
//! instance).
//!
//! Exploration order is deterministic: last-in first-out over a
//! deterministic successor ordering. That governs only the order in
//! which diagnostics are discovered, not which ones exist.

use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::cfg::{Block, BlockId, Cfg, Element, ElementKind, ProgramPoint, Symbol, Terminator};
use crate::oracle::SymbolOracle;
use crate::se::checkers::{Checker, CheckerDispatcher, Diagnostic};
use crate::se::constraints::ConstraintManager;
use crate::se::graph::{ExplodedGraph, Node};
use crate::se::state::ProgramState;
use crate::se::value::{Constraint, SymbolicValue};

/// Checker name attached to the walker's own condition diagnostics.
pub const GRATUITOUS_CONDITION: &str = "gratuitous-condition";

/// How a function walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStatus {
    /// The worklist drained: every feasible `(point, state)` pair
    /// reachable from the entry was visited exactly once.
    Completed,
    /// The step budget ran out first. Diagnostics raised so far are kept;
    /// anything past the cutoff is unknown.
    StepBudgetExceeded,
}

/// A formal parameter of the analyzed function.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }

    pub fn with_ty(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty.into()),
        }
    }
}

/// Outcome of walking one function.
#[derive(Debug, Clone)]
pub struct WalkResult {
    pub status: WalkStatus,
    /// Worklist dequeues performed.
    pub steps: usize,
    /// Distinct exploded-graph nodes created.
    pub nodes: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walks the exploded graph of one function. Single-use: build, walk,
/// done. Nothing survives into the next function's analysis.
pub struct ExplodedGraphWalker<'a> {
    cfg: &'a Cfg,
    oracle: &'a dyn SymbolOracle,
    dispatcher: CheckerDispatcher,
    manager: ConstraintManager,
    graph: ExplodedGraph,
    worklist: Vec<Rc<Node>>,
    max_steps: usize,
    steps: usize,
    evaluated_true: HashSet<BlockId>,
    evaluated_false: HashSet<BlockId>,
}

impl<'a> ExplodedGraphWalker<'a> {
    pub fn new(
        cfg: &'a Cfg,
        oracle: &'a dyn SymbolOracle,
        checkers: Vec<Box<dyn Checker>>,
        max_steps: usize,
    ) -> Self {
        Self {
            cfg,
            oracle,
            dispatcher: CheckerDispatcher::new(checkers),
            manager: ConstraintManager::new(),
            graph: ExplodedGraph::new(),
            worklist: Vec::new(),
            max_steps,
            steps: 0,
            evaluated_true: HashSet::new(),
            evaluated_false: HashSet::new(),
        }
    }

    /// Explore every feasible path from the entry block.
    pub fn walk(mut self, params: &[Param]) -> WalkResult {
        let mut state = ProgramState::default();
        for param in params {
            let value = self.manager.fresh();
            state = state.bind(Symbol::new(param.name.as_str()), value);
            if self.oracle.has_annotation(&param.name, "CheckForNull") {
                if let Some(seeded) = state.constrain(value, Constraint::Null) {
                    state = seeded;
                }
            }
        }
        self.enqueue(ProgramPoint::block_entry(self.cfg.entry), state);

        loop {
            if self.steps == self.max_steps && !self.worklist.is_empty() {
                log::debug!(
                    "step budget of {} exhausted with {} nodes pending",
                    self.max_steps,
                    self.worklist.len()
                );
                return self.finish(WalkStatus::StepBudgetExceeded);
            }
            let node = match self.worklist.pop() {
                Some(node) => node,
                None => break,
            };
            self.steps += 1;
            self.step(&node);
        }
        self.finish(WalkStatus::Completed)
    }

    fn step(&mut self, node: &Node) {
        let point = node.point;
        let block = self.cfg.block(point.block);
        if block.is_exit() {
            // this path reached the method exit
            return;
        }

        if point.index < block.elements.len() {
            let element = &block.elements[point.index];
            log::trace!(
                "step {}: {:?}[{}] {}",
                self.steps,
                point.block,
                point.index,
                element.describe()
            );
            let state = self.visit_element(element, &node.state);
            self.dispatcher
                .dispatch(point, element, &state, &mut self.manager, self.oracle);
            self.enqueue(point.next(), state);
        } else if let Some(terminator) = &block.terminator {
            // checkers observe the condition with the state it is tested
            // under, then the state splits
            let element = Element {
                kind: ElementKind::Expression {
                    expr: terminator.condition.clone(),
                },
                line: terminator.line,
            };
            self.dispatcher
                .dispatch(point, &element, &node.state, &mut self.manager, self.oracle);
            self.handle_branch(block, terminator, &node.state);
        } else {
            // unconditional block exit: every successor sees this state
            for successor in block.successors.iter().rev() {
                self.enqueue(ProgramPoint::block_entry(*successor), node.state.clone());
            }
        }
    }

    fn visit_element(&mut self, element: &Element, state: &ProgramState) -> ProgramState {
        match &element.kind {
            ElementKind::Declaration { symbol, ty, init } => match init {
                Some(expr) => {
                    let (state, value) = self.manager.eval(state, expr);
                    state.bind(symbol.clone(), value)
                }
                None => {
                    let is_boolean = ty
                        .as_deref()
                        .is_some_and(|ty| self.oracle.is_subtype_of(ty, "bool"));
                    let value = if is_boolean {
                        SymbolicValue::FALSE
                    } else {
                        SymbolicValue::NULL
                    };
                    state.bind(symbol.clone(), value)
                }
            },
            ElementKind::Assignment { target, value } => {
                let (state, value) = self.manager.eval(state, value);
                state.bind(target.clone(), value)
            }
            // member accesses materialize a binding for their receiver so
            // later constraints have something to attach to
            ElementKind::MethodCall { call } => self.manager.eval(state, &call.receiver).0,
            ElementKind::FieldAccess { access } => self.manager.eval(state, &access.base).0,
            ElementKind::Expression { expr } => self.manager.eval(state, expr).0,
        }
    }

    fn handle_branch(&mut self, block: &Block, terminator: &Terminator, state: &ProgramState) {
        debug_assert_eq!(
            block.successors.len(),
            2,
            "a terminator block carries exactly a true and a false edge"
        );
        let (false_state, true_state) = self.manager.assume_dual(state, &terminator.condition);
        if let Some(refined) = false_state {
            self.enqueue(ProgramPoint::block_entry(block.successors[1]), refined);
            self.evaluated_false.insert(block.id);
        }
        if let Some(refined) = true_state {
            self.enqueue(ProgramPoint::block_entry(block.successors[0]), refined);
            self.evaluated_true.insert(block.id);
        }
    }

    fn enqueue(&mut self, point: ProgramPoint, state: ProgramState) {
        let (node, is_new) = self.graph.node(point, state);
        if is_new {
            self.worklist.push(node);
        }
    }

    fn finish(self, status: WalkStatus) -> WalkResult {
        // a partial exploration proves nothing about a condition's range
        let condition_reports = match status {
            WalkStatus::Completed => self.one_sided_conditions(),
            WalkStatus::StepBudgetExceeded => Vec::new(),
        };
        let mut diagnostics = self.dispatcher.into_diagnostics();
        diagnostics.extend(condition_reports);
        WalkResult {
            status,
            steps: self.steps,
            nodes: self.graph.len(),
            diagnostics,
        }
    }

    /// Conditions that only ever evaluated one way across all explored
    /// paths. A condition never reached at all is not reported.
    fn one_sided_conditions(&self) -> Vec<Diagnostic> {
        let mut reports = Vec::new();
        for block in &self.cfg.blocks {
            let Some(terminator) = &block.terminator else {
                continue;
            };
            let seen_true = self.evaluated_true.contains(&block.id);
            let seen_false = self.evaluated_false.contains(&block.id);
            let verdict = match (seen_true, seen_false) {
                (true, false) => "true",
                (false, true) => "false",
                _ => continue,
            };
            reports.push(Diagnostic {
                line: terminator.line,
                message: format!("condition always evaluates to {verdict}"),
                checker: GRATUITOUS_CONDITION.to_string(),
            });
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DefaultOracle;
    use syn::parse_quote;

    fn walk_body(body: syn::Block, params: &[Param], max_steps: usize) -> WalkResult {
        let cfg = Cfg::build(&body).expect("CFG should build");
        ExplodedGraphWalker::new(&cfg, &DefaultOracle, Vec::new(), max_steps).walk(params)
    }

    #[test]
    fn straight_line_walk_reaches_a_fixed_point() {
        let result = walk_body(
            parse_quote! {
                {
                    let x = make();
                    x.run();
                }
            },
            &[],
            100,
        );
        assert_eq!(result.status, WalkStatus::Completed);
        // one node per element, plus the block exit and the method exit
        assert_eq!(result.nodes, 4);
        assert_eq!(result.steps, 4);
    }

    #[test]
    fn both_branches_of_an_unconstrained_test_are_explored() {
        let result = walk_body(
            parse_quote! {
                {
                    if x == null {
                        a();
                    } else {
                        b();
                    }
                }
            },
            &[Param::new("x")],
            100,
        );
        assert_eq!(result.status, WalkStatus::Completed);
        assert!(result.diagnostics.is_empty(), "nothing is one-sided here");
    }

    #[test]
    fn exhausted_walk_visits_each_pair_once() {
        // the join block after the split is reached twice with two
        // distinct states, so it appears twice in the graph, once each
        let result = walk_body(
            parse_quote! {
                {
                    if x == null {
                        skip();
                    }
                    finish();
                }
            },
            &[Param::new("x")],
            1000,
        );
        assert_eq!(result.status, WalkStatus::Completed);
        assert_eq!(result.steps, result.nodes, "every node dequeued exactly once");
    }

    #[test]
    fn budget_cuts_the_walk_short() {
        let result = walk_body(
            parse_quote! {
                {
                    while x != null {
                        x = advance(x);
                    }
                }
            },
            &[Param::new("x")],
            50,
        );
        assert_eq!(result.status, WalkStatus::StepBudgetExceeded);
        assert_eq!(result.steps, 50, "the budget is checked per dequeued node");
    }

    #[test]
    fn constant_condition_is_reported_after_a_completed_walk() {
        let result = walk_body(
            parse_quote! {
                {
                    if enabled == null {
                        mark();
                    }
                    let enabled = null;
                }
            },
            &[],
            1000,
        );
        assert_eq!(result.status, WalkStatus::Completed);
        // `enabled` is unbound at the test, both branches stay feasible
        assert!(result.diagnostics.is_empty());

        let result = walk_body(
            parse_quote! {
                {
                    let flag = true;
                    if flag {
                        mark();
                    }
                }
            },
            &[],
            1000,
        );
        assert_eq!(result.status, WalkStatus::Completed);
        assert_eq!(result.diagnostics.len(), 1);
        let report = &result.diagnostics[0];
        assert_eq!(report.checker, GRATUITOUS_CONDITION);
        assert!(report.message.ends_with("always evaluates to true"));
    }

    #[test]
    fn aborted_walk_reports_no_condition_verdicts() {
        let result = walk_body(
            parse_quote! {
                {
                    while true {
                        x = advance(x);
                    }
                }
            },
            &[Param::new("x")],
            30,
        );
        assert_eq!(result.status, WalkStatus::StepBudgetExceeded);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn declared_boolean_defaults_to_false() {
        // `let done: bool;` then `if done` always takes the false edge
        let result = walk_body(
            parse_quote! {
                {
                    let done: bool;
                    if done {
                        mark();
                    }
                }
            },
            &[],
            1000,
        );
        assert_eq!(result.status, WalkStatus::Completed);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0]
            .message
            .ends_with("always evaluates to false"));
    }
}
