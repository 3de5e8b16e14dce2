//! Flow phase - reachability, definite assignment and cleanup chains
//!
//! One top-down pass per method body. The analyzer threads a [`FlowInfo`]
//! through the statements, mirrors lexical nesting on the
//! [`FlowContextStack`], reports language problems, and records on each node
//! what code generation needs later:
//! - `Stmt::reachable` for statements that can never run
//! - the target and cleanup chain of every `break` / `continue`
//! - the cleanup chain, `save_value_needed` and `guarded_by_monitor` of every
//!   `return`
//! - whether a `try`'s finally block can complete normally

use crate::ast::{
    Block, CatchClause, Expr, LocalId, LocalVar, MethodDecl, MethodKind, NodeId, Span, Stmt, StmtKind,
    SwitchStmt, TryStmt,
};
use crate::common::{ClassHierarchy, Problem, ProblemKind, ProblemReporter, Type};
use crate::consts::{Constant, STRING};
use crate::wash::completion::block_can_complete_normally;
use crate::wash::flow_context::{
    handler_reachable, ContextId, ContextKind, ContinueTarget, FlowContext, FlowContextStack,
    Handler, ThrowOutcome,
};
use crate::wash::flow_info::{ConditionalFlow, FlowInfo};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

/// Anchor of the method (or initializer) context; no statement has this id
pub const METHOD_NODE: NodeId = NodeId(u32::MAX);

/// What the flow pass found for one method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSummary {
    pub errors: usize,
    pub warnings: usize,
    /// The end of the body is reachable
    pub completes_normally: bool,
}

/// Run flow analysis over a method body, annotating it in place.
pub fn analyze_method(
    method: &mut MethodDecl,
    hierarchy: &dyn ClassHierarchy,
    reporter: &mut dyn ProblemReporter,
) -> FlowSummary {
    let qualified = method.qualified_name();
    debug!("flow analysis of {} started", qualified);

    let mut flow = FlowInfo::initial(method.locals.len());
    for param in &method.params {
        flow.mark_assigned(*param);
    }

    let mut analyzer = FlowAnalyzer {
        reporter,
        hierarchy,
        locals: &method.locals,
        owner: &method.owner,
        kind: method.kind,
        is_static: method.is_static,
        return_type: method.return_type.clone(),
        contexts: FlowContextStack::new(),
        reported_loop_finals: FxHashSet::default(),
        errors: 0,
        warnings: 0,
    };
    let root = match method.kind {
        MethodKind::Initializer => FlowContext::new(ContextKind::Initializer, METHOD_NODE),
        _ => FlowContext::method(METHOD_NODE, method.return_type.clone(), method.throws.clone()),
    };
    analyzer.contexts.push(root);

    let exit = analyzer.analyze_block(&mut method.body, flow);
    analyzer.contexts.pop();

    let completes_normally = exit.is_reachable();
    if completes_normally && method.kind == MethodKind::Method && method.return_type != Type::Void {
        analyzer.report(ProblemKind::MissingReturn, method.span);
    }

    let summary = FlowSummary {
        errors: analyzer.errors,
        warnings: analyzer.warnings,
        completes_normally,
    };
    debug!(
        "flow analysis of {} finished: {} error(s), {} warning(s)",
        qualified, summary.errors, summary.warnings
    );
    summary
}

pub struct FlowAnalyzer<'a> {
    reporter: &'a mut dyn ProblemReporter,
    pub(crate) hierarchy: &'a dyn ClassHierarchy,
    pub(crate) locals: &'a [LocalVar],
    pub(crate) owner: &'a str,
    pub(crate) kind: MethodKind,
    pub(crate) is_static: bool,
    return_type: Type,
    pub(crate) contexts: FlowContextStack,
    reported_loop_finals: FxHashSet<(LocalId, Span)>,
    errors: usize,
    warnings: usize,
}

/// Key identifying a case label for duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CaseKey {
    Int(i32),
    Str(String),
}

impl<'a> FlowAnalyzer<'a> {
    pub(crate) fn report(&mut self, kind: ProblemKind, span: Span) {
        let problem = Problem::new(kind, span);
        if problem.is_error() {
            self.errors += 1;
        } else {
            self.warnings += 1;
        }
        trace!("{}", problem);
        self.reporter.report(problem);
    }

    pub(crate) fn local_name(&self, local: LocalId) -> String {
        self.locals
            .get(local.index())
            .map(|l| l.name.clone())
            .unwrap_or_else(|| format!("local#{}", local.0))
    }

    pub(crate) fn is_final_local(&self, local: LocalId) -> bool {
        self.locals.get(local.index()).map_or(false, |l| l.is_final)
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    pub fn analyze_block(&mut self, block: &mut Block, flow: FlowInfo) -> FlowInfo {
        let mut flow = flow;
        for stmt in &mut block.stmts {
            flow = self.analyze_stmt(stmt, flow);
        }
        for local in block.declared_locals() {
            flow.reset(local);
        }
        flow
    }

    pub fn analyze_stmt(&mut self, stmt: &mut Stmt, flow: FlowInfo) -> FlowInfo {
        let mut flow = flow;
        if flow.is_dead_end() {
            self.report(ProblemKind::UnreachableCode, stmt.span);
            flow = flow.unreachable();
        }
        stmt.reachable = flow.is_reachable();
        let id = stmt.id;
        let span = stmt.span;

        match &mut stmt.kind {
            StmtKind::Block(block) => self.analyze_block(block, flow),

            StmtKind::LocalDecl(decl) => {
                flow.reset(decl.local);
                match &mut decl.init {
                    Some(init) => {
                        let mut flow = self.analyze_expr(init, flow);
                        flow.mark_assigned(decl.local);
                        flow
                    }
                    None => flow,
                }
            }

            StmtKind::Expr(expr) => self.analyze_expr(expr, flow),

            StmtKind::If(s) => {
                let constant = s.condition.constant_bool();
                let cond = self.analyze_condition(&mut s.condition, flow);
                let then_exit = self.analyze_stmt(&mut s.then_branch, cond.when_true);
                let else_exit = match &mut s.else_branch {
                    Some(else_branch) => self.analyze_stmt(else_branch, cond.when_false),
                    None => cond.when_false,
                };
                let merged = then_exit.merged_with(&else_exit);
                // a constant condition never makes the following code an error
                if constant.is_some() && !merged.is_reachable() {
                    merged.unreachable()
                } else {
                    merged
                }
            }

            StmtKind::While(w) => {
                let constant = w.condition.constant_bool();
                let entry = flow.copy();
                self.contexts.push(FlowContext::looping(id));
                let cond = self.analyze_condition(&mut w.condition, flow);
                let body_entry = if constant == Some(false) {
                    self.enter_dead_body(&entry, w.body.span, cond.when_true)
                } else {
                    cond.when_true
                };
                let body_exit = self.analyze_stmt(&mut w.body, body_entry);
                let ctx = self.pop_context();
                let back_edge = merge_opt(body_exit, ctx.continues.as_ref());
                self.check_loop_finals(&ctx, &back_edge);
                let exit = loop_exit(constant, &entry, cond.when_false, ctx.breaks.as_ref());
                with_possible(exit, &back_edge)
            }

            StmtKind::DoWhile(d) => {
                let constant = d.condition.constant_bool();
                self.contexts.push(FlowContext::looping(id));
                let body_exit = self.analyze_stmt(&mut d.body, flow);
                let ctx = self.pop_context();
                let cond_entry = merge_opt(body_exit, ctx.continues.as_ref());
                let cond = self.analyze_condition(&mut d.condition, cond_entry.copy());
                let back_edge = cond.when_true;
                self.check_loop_finals(&ctx, &back_edge);
                let exit = if constant == Some(true) {
                    match &ctx.breaks {
                        Some(breaks) => breaks.copy(),
                        None => cond_entry.dead_end(),
                    }
                } else {
                    merge_opt(cond.when_false, ctx.breaks.as_ref())
                };
                with_possible(exit, &back_edge)
            }

            StmtKind::For(f) => {
                let mut flow = flow;
                for init in &mut f.init {
                    flow = self.analyze_stmt(init, flow);
                }
                let constant = match &f.condition {
                    Some(cond) => cond.constant_bool(),
                    None => Some(true),
                };
                let entry = flow.copy();
                self.contexts.push(FlowContext::looping(id));
                let cond = match &mut f.condition {
                    Some(cond) => self.analyze_condition(cond, flow),
                    None => ConditionalFlow {
                        when_false: flow.unreachable(),
                        when_true: flow,
                    },
                };
                let body_entry = if constant == Some(false) {
                    self.enter_dead_body(&entry, f.body.span, cond.when_true)
                } else {
                    cond.when_true
                };
                let body_exit = self.analyze_stmt(&mut f.body, body_entry);
                let ctx = self.pop_context();
                let mut back_edge = merge_opt(body_exit, ctx.continues.as_ref());
                for update in &mut f.update {
                    back_edge = self.analyze_expr(update, back_edge);
                }
                self.check_loop_finals(&ctx, &back_edge);
                let exit = loop_exit(constant, &entry, cond.when_false, ctx.breaks.as_ref());
                let mut exit = with_possible(exit, &back_edge);
                for local in f.init_locals() {
                    exit.reset(local);
                }
                exit
            }

            StmtKind::ForEach(f) => {
                let entry = self.analyze_expr(&mut f.iterable, flow);
                self.contexts.push(FlowContext::looping(id));
                let mut body_entry = entry.copy();
                body_entry.mark_assigned(f.var);
                let body_exit = self.analyze_stmt(&mut f.body, body_entry);
                let ctx = self.pop_context();
                let back_edge = merge_opt(body_exit, ctx.continues.as_ref());
                self.check_loop_finals(&ctx, &back_edge);
                let mut exit = with_possible(merge_opt(entry, ctx.breaks.as_ref()), &back_edge);
                exit.reset(f.var);
                exit
            }

            StmtKind::Labeled(l) => {
                self.contexts
                    .push(FlowContext::labeled(id, &l.label, l.body.concrete().is_loop()));
                let body_exit = self.analyze_stmt(&mut l.body, flow);
                let ctx = self.pop_context();
                merge_opt(body_exit, ctx.breaks.as_ref())
            }

            StmtKind::Break(b) => {
                let target = match &b.label {
                    None => self
                        .contexts
                        .target_for_default_break()
                        .ok_or(ProblemKind::BreakOutsideSwitchOrLoop),
                    Some(label) => self
                        .contexts
                        .target_for_break_label(label)
                        .ok_or_else(|| ProblemKind::UndefinedLabel {
                            label: label.clone(),
                        }),
                };
                match target {
                    Ok(ctx) => {
                        let chain = self.contexts.cleanup_chain(ctx, &flow);
                        if !chain.escapes {
                            self.contexts.get_mut(ctx).record_break_from(&flow);
                        }
                        b.info.target = Some(self.contexts.get(ctx).node);
                        b.info.chain = chain;
                        flow.dead_end()
                    }
                    Err(problem) => {
                        self.report(problem, span);
                        flow
                    }
                }
            }

            StmtKind::Continue(c) => {
                let target = match &c.label {
                    None => self
                        .contexts
                        .target_for_default_continue()
                        .ok_or(ProblemKind::ContinueOutsideLoop),
                    Some(label) => match self.contexts.target_for_continue_label(label) {
                        ContinueTarget::Found(ctx) => Ok(ctx),
                        ContinueTarget::UndefinedLabel => Err(ProblemKind::UndefinedLabel {
                            label: label.clone(),
                        }),
                        ContinueTarget::NotALoop => Err(ProblemKind::InvalidContinueTarget {
                            label: label.clone(),
                        }),
                    },
                };
                match target {
                    Ok(ctx) => {
                        let chain = self.contexts.cleanup_chain(ctx, &flow);
                        if !chain.escapes {
                            self.contexts.get_mut(ctx).record_continue_from(&flow);
                        }
                        c.info.target = Some(self.contexts.get(ctx).node);
                        c.info.chain = chain;
                        flow.dead_end()
                    }
                    Err(problem) => {
                        self.report(problem, span);
                        flow
                    }
                }
            }

            StmtKind::Return(r) => {
                let problem = if self.kind == MethodKind::Initializer {
                    Some(ProblemKind::ReturnInInitializer)
                } else {
                    match (&r.value, self.return_type == Type::Void) {
                        (Some(_), true) => Some(ProblemKind::VoidMethodReturnsValue),
                        (None, false) => Some(ProblemKind::MissingReturnValue),
                        _ => None,
                    }
                };
                if let Some(problem) = problem {
                    self.report(problem, span);
                }
                let flow = match &mut r.value {
                    Some(value) => self.analyze_expr(value, flow),
                    None => flow,
                };
                let root = ContextId(0);
                let chain = self.contexts.cleanup_chain(root, &flow);
                if !chain.escapes {
                    self.contexts.get_mut(root).record_return_from(&flow);
                }
                let constant = r.value.as_ref().map_or(false, |v| v.constant.is_some());
                r.info.save_value_needed = r.value.is_some() && !constant && chain.has_finally();
                r.info.guarded_by_monitor = chain.has_monitor();
                r.info.chain = chain;
                flow.dead_end()
            }

            StmtKind::Throw(t) => {
                let flow = self.analyze_expr(&mut t.expr, flow);
                if let Some(class) = t.expr.result_type().class_name() {
                    self.record_thrown(class, &flow, t.expr.span);
                }
                flow.dead_end()
            }

            StmtKind::Try(t) => self.analyze_try(id, t, flow),

            StmtKind::Synchronized(s) => {
                let flow = self.analyze_expr(&mut s.lock, flow);
                self.contexts.push(FlowContext::synchronized(id));
                let exit = self.analyze_block(&mut s.body, flow);
                self.pop_context();
                exit
            }

            StmtKind::Switch(s) => self.analyze_switch(id, s, flow),

            StmtKind::Assert(a) => {
                let cond = self.analyze_condition(&mut a.condition, flow.copy());
                let mut after = flow;
                after.add_possible_from(&cond.when_true);
                if let Some(message) = &mut a.message {
                    let failed = self.analyze_expr(message, cond.when_false);
                    after.add_possible_from(&failed);
                } else {
                    after.add_possible_from(&cond.when_false);
                }
                after
            }

            StmtKind::Case(_) | StmtKind::Empty => flow,
        }
    }

    fn pop_context(&mut self) -> FlowContext {
        match self.contexts.pop() {
            Some(ctx) => ctx,
            // push and pop are paired within each statement
            None => FlowContext::new(ContextKind::Initializer, METHOD_NODE),
        }
    }

    /// Body of a loop whose condition is constant `false`
    fn enter_dead_body(&mut self, entry: &FlowInfo, body_span: Span, flow: FlowInfo) -> FlowInfo {
        if entry.is_reachable() {
            self.report(ProblemKind::UnreachableCode, body_span);
        }
        flow.unreachable()
    }

    fn check_loop_finals(&mut self, ctx: &FlowContext, back_edge: &FlowInfo) {
        let ContextKind::Loop { final_assignments } = &ctx.kind else {
            return;
        };
        // no second iteration
        if !back_edge.is_reachable() {
            return;
        }
        for (local, span) in final_assignments {
            if back_edge.is_possibly_assigned(*local) && self.reported_loop_finals.insert((*local, *span)) {
                let name = self.local_name(*local);
                self.report(ProblemKind::FinalLocalAssignedInLoop { name }, *span);
            }
        }
    }

    pub(crate) fn record_thrown(&mut self, class: &str, flow: &FlowInfo, span: Span) {
        if self.contexts.record_thrown(class, flow, self.hierarchy) == ThrowOutcome::Unhandled {
            self.report(
                ProblemKind::UnhandledException {
                    class: class.replace('/', "."),
                },
                span,
            );
        }
    }

    // ========================================================================
    // TRY
    // ========================================================================

    fn analyze_try(&mut self, id: NodeId, t: &mut TryStmt, entry: FlowInfo) -> FlowInfo {
        let has_finally = t.has_finally();
        let finally_completes = t
            .finally_block
            .as_ref()
            .map_or(true, block_can_complete_normally);
        t.info.finally_completes = finally_completes;
        if let (false, Some(finally_block)) = (finally_completes, &t.finally_block) {
            self.report(ProblemKind::FinallyDoesNotCompleteNormally, finally_block.span);
        }

        // try block and resources, with every catch clause as a handler
        let handlers = t.catches.iter().map(|c| c.class.clone()).collect();
        let cleanup = has_finally || !t.resources.is_empty();
        self.contexts
            .push(FlowContext::try_region(id, handlers, cleanup, finally_completes));
        let mut flow = entry.copy();
        for resource in &mut t.resources {
            flow = self.analyze_expr(&mut resource.init, flow);
            flow.mark_assigned(resource.local);
        }
        for resource in &t.resources {
            for class in &resource.close.thrown {
                self.record_thrown(class, &flow, resource.init.span);
            }
        }
        let body_exit = self.analyze_block(&mut t.body, flow);
        let body_ctx = self.pop_context();

        let mut try_possible = entry.copy();
        try_possible.add_possible_from(&body_exit);
        if let Some(exits) = &body_ctx.exits {
            try_possible.add_possible_from(exits);
        }
        let handlers = match body_ctx.kind {
            ContextKind::Try { handlers } => handlers,
            _ => Vec::new(),
        };

        // catch clauses see the finally but no handlers of their own try
        let mut merged = body_exit;
        let mut finally_possible = try_possible.copy();
        for (index, catch) in t.catches.iter_mut().enumerate() {
            let catch_entry = self.catch_entry(catch, index, &handlers, &entry, &try_possible);
            self.contexts
                .push(FlowContext::try_region(id, Vec::new(), has_finally, finally_completes));
            let mut exit = self.analyze_block(&mut catch.body, catch_entry);
            let catch_ctx = self.pop_context();
            if let Some(exits) = &catch_ctx.exits {
                finally_possible.add_possible_from(exits);
            }
            finally_possible.add_possible_from(&exit);
            exit.reset(catch.param);
            merged = merged.merged_with(&exit);
        }

        let mut result = match &mut t.finally_block {
            Some(finally_block) => {
                let mut finally_entry = entry.copy();
                finally_entry.add_possible_from(&finally_possible);
                let finally_exit = self.analyze_block(finally_block, finally_entry);
                let mut result = merged;
                result.add_definite_from(&finally_exit);
                result.add_possible_from(&finally_exit);
                if finally_completes {
                    result
                } else {
                    result.dead_end()
                }
            }
            None => merged,
        };
        for resource in &t.resources {
            result.reset(resource.local);
        }
        result
    }

    fn catch_entry(
        &mut self,
        catch: &CatchClause,
        index: usize,
        handlers: &[Handler],
        entry: &FlowInfo,
        try_possible: &FlowInfo,
    ) -> FlowInfo {
        let mut flow = entry.copy();
        flow.add_possible_from(try_possible);
        let class = catch.class.replace('/', ".");
        let already_caught = handlers[..index]
            .iter()
            .any(|h| self.hierarchy.is_subclass(&catch.class, &h.class));
        let reachable = handlers
            .get(index)
            .map_or(true, |h| handler_reachable(h, self.hierarchy));
        if already_caught {
            self.report(ProblemKind::CatchAlreadyCaught { class }, catch.span);
            flow = flow.unreachable();
        } else if !reachable {
            self.report(ProblemKind::UnreachableCatchBlock { class }, catch.span);
            flow = flow.unreachable();
        }
        flow.mark_assigned(catch.param);
        flow
    }

    // ========================================================================
    // SWITCH
    // ========================================================================

    fn analyze_switch(&mut self, id: NodeId, s: &mut SwitchStmt, flow: FlowInfo) -> FlowInfo {
        let entry = self.analyze_expr(&mut s.selector, flow);
        let selector_type = s.selector.result_type();
        self.contexts.push(FlowContext::new(ContextKind::Switch, id));

        let mut seen = FxHashSet::default();
        let mut has_default = false;
        let mut current = entry.unreachable();
        for stmt in &mut s.body {
            if let StmtKind::Case(label) = &stmt.kind {
                self.check_case_label(label.as_ref(), &selector_type, &mut seen, &mut has_default, stmt.span);
                current = current.merged_with(&entry);
                stmt.reachable = current.is_reachable();
                continue;
            }
            current = self.analyze_stmt(stmt, current);
        }

        let ctx = self.pop_context();
        let mut exit = merge_opt(current, ctx.breaks.as_ref());
        if !has_default {
            exit = exit.merged_with(&entry);
        }
        for local in s.declared_locals() {
            exit.reset(local);
        }
        exit
    }

    fn check_case_label(
        &mut self,
        label: Option<&Expr>,
        selector: &Type,
        seen: &mut FxHashSet<CaseKey>,
        has_default: &mut bool,
        span: Span,
    ) {
        let Some(expr) = label else {
            if *has_default {
                self.report(ProblemKind::DuplicateDefault, span);
            }
            *has_default = true;
            return;
        };
        let Some(constant) = &expr.constant else {
            self.report(ProblemKind::NonConstantCaseLabel, span);
            return;
        };
        let key = if selector.is_int_switchable() {
            constant
                .as_int()
                .filter(|v| fits_switch_type(selector, *v))
                .map(CaseKey::Int)
        } else if selector.class_name() == Some(STRING) {
            constant.as_str().map(|s| CaseKey::Str(s.to_string()))
        } else {
            None
        };
        match key {
            Some(key) => {
                if !seen.insert(key) {
                    self.report(
                        ProblemKind::DuplicateCase {
                            value: case_text(constant),
                        },
                        span,
                    );
                }
            }
            None => self.report(
                ProblemKind::CaseTypeMismatch {
                    expected: selector.to_string(),
                },
                span,
            ),
        }
    }
}

fn case_text(constant: &Constant) -> String {
    constant.to_string()
}

fn fits_switch_type(ty: &Type, value: i32) -> bool {
    match ty {
        Type::Byte => i8::try_from(value).is_ok(),
        Type::Short => i16::try_from(value).is_ok(),
        Type::Char => u16::try_from(value).is_ok(),
        _ => true,
    }
}

fn merge_opt(flow: FlowInfo, other: Option<&FlowInfo>) -> FlowInfo {
    match other {
        Some(other) => flow.merged_with(other),
        None => flow,
    }
}

fn with_possible(mut flow: FlowInfo, back_edge: &FlowInfo) -> FlowInfo {
    flow.add_possible_from(back_edge);
    flow
}

/// Exit of a pre-tested loop: condition false or a break. A loop that runs
/// forever without a break ends in a dead end.
fn loop_exit(
    constant: Option<bool>,
    entry: &FlowInfo,
    when_false: FlowInfo,
    breaks: Option<&FlowInfo>,
) -> FlowInfo {
    match (constant, breaks) {
        (Some(true), None) => entry.dead_end(),
        (Some(true), Some(breaks)) => breaks.copy(),
        (_, breaks) => merge_opt(when_false, breaks),
    }
}
