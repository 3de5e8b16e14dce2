//! Flow context stack - the control scopes enclosing the statement under analysis
//!
//! Contexts live in a `Vec` used as a stack; `ContextId` is the index of a
//! context and `parent` the index of the one below it. Lookups walk from the
//! top towards the method context.

use crate::ast::{CleanupChain, CleanupKind, CleanupRegion, LocalId, NodeId, Span};
use crate::common::{ClassHierarchy, Type};
use crate::consts::RUNTIME_EXCEPTION;
use crate::wash::flow_info::FlowInfo;
use smallvec::SmallVec;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextId(pub usize);

/// A `catch` clause of the enclosing `try`
#[derive(Debug, Clone)]
pub struct Handler {
    pub class: String,
    /// Some thrown exception may be caught here
    pub marked: bool,
}

#[derive(Debug, Clone)]
pub enum ContextKind {
    Method {
        return_type: Type,
        throws: Vec<String>,
    },
    Initializer,
    Loop {
        /// Deferred checks for final locals assigned in the body
        final_assignments: Vec<(LocalId, Span)>,
    },
    Labeled {
        label: String,
        body_is_loop: bool,
    },
    Switch,
    Try {
        handlers: Vec<Handler>,
    },
    Synchronized,
}

#[derive(Debug, Clone)]
pub struct FlowContext {
    pub kind: ContextKind,
    /// Statement the context belongs to
    pub node: NodeId,
    pub parent: Option<ContextId>,
    pub subroutine: Option<CleanupRegion>,
    pub breaks: Option<FlowInfo>,
    pub continues: Option<FlowInfo>,
    pub returns: Option<FlowInfo>,
    /// Possible bits of every path leaving a `Try` context early
    pub exits: Option<FlowInfo>,
}

impl FlowContext {
    pub fn new(kind: ContextKind, node: NodeId) -> Self {
        Self {
            kind,
            node,
            parent: None,
            subroutine: None,
            breaks: None,
            continues: None,
            returns: None,
            exits: None,
        }
    }

    pub fn method(node: NodeId, return_type: Type, throws: Vec<String>) -> Self {
        Self::new(
            ContextKind::Method {
                return_type,
                throws,
            },
            node,
        )
    }

    pub fn looping(node: NodeId) -> Self {
        Self::new(
            ContextKind::Loop {
                final_assignments: Vec::new(),
            },
            node,
        )
    }

    pub fn labeled(node: NodeId, label: &str, body_is_loop: bool) -> Self {
        Self::new(
            ContextKind::Labeled {
                label: label.to_string(),
                body_is_loop,
            },
            node,
        )
    }

    /// `try` context; a cleanup region is exposed only for a non-empty finally
    /// or resources to close
    pub fn try_region(node: NodeId, handlers: Vec<String>, cleanup: bool, can_return: bool) -> Self {
        let mut ctx = Self::new(
            ContextKind::Try {
                handlers: handlers
                    .into_iter()
                    .map(|class| Handler { class, marked: false })
                    .collect(),
            },
            node,
        );
        if cleanup {
            ctx.subroutine = Some(CleanupRegion {
                owner: node,
                kind: CleanupKind::Finally,
                can_return,
            });
        }
        ctx
    }

    pub fn synchronized(node: NodeId) -> Self {
        let mut ctx = Self::new(ContextKind::Synchronized, node);
        ctx.subroutine = Some(CleanupRegion {
            owner: node,
            kind: CleanupKind::MonitorExit,
            can_return: true,
        });
        ctx
    }

    /// Cleanup region owned by this context
    pub fn subroutine(&self) -> Option<CleanupRegion> {
        self.subroutine
    }

    pub fn record_break_from(&mut self, flow: &FlowInfo) {
        self.breaks = Some(merge_into(self.breaks.take(), flow));
    }

    pub fn record_continue_from(&mut self, flow: &FlowInfo) {
        self.continues = Some(merge_into(self.continues.take(), flow));
    }

    pub fn record_return_from(&mut self, flow: &FlowInfo) {
        self.returns = Some(merge_into(self.returns.take(), flow));
    }

    fn record_exit_through(&mut self, flow: &FlowInfo) {
        if matches!(self.kind, ContextKind::Try { .. }) {
            match &mut self.exits {
                Some(exits) => exits.add_possible_from(flow),
                None => self.exits = Some(flow.copy()),
            }
        }
    }
}

fn merge_into(acc: Option<FlowInfo>, flow: &FlowInfo) -> FlowInfo {
    match acc {
        Some(acc) => acc.merged_with(flow),
        None => flow.copy(),
    }
}

/// Result of looking up a labeled `continue`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueTarget {
    Found(ContextId),
    UndefinedLabel,
    NotALoop,
}

/// Where a thrown exception ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowOutcome {
    Caught,
    Declared,
    Unchecked,
    Unhandled,
}

#[derive(Debug, Default)]
pub struct FlowContextStack {
    contexts: Vec<FlowContext>,
}

impl FlowContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut context: FlowContext) -> ContextId {
        context.parent = self.contexts.len().checked_sub(1).map(ContextId);
        self.contexts.push(context);
        ContextId(self.contexts.len() - 1)
    }

    /// Pop the innermost context. The analyzer keeps push and pop balanced.
    pub fn pop(&mut self) -> Option<FlowContext> {
        self.contexts.pop()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn get(&self, id: ContextId) -> &FlowContext {
        &self.contexts[id.0]
    }

    pub fn get_mut(&mut self, id: ContextId) -> &mut FlowContext {
        &mut self.contexts[id.0]
    }

    pub fn top(&self) -> Option<&FlowContext> {
        self.contexts.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut FlowContext> {
        self.contexts.last_mut()
    }

    fn innermost(&self, pred: impl Fn(&FlowContext) -> bool) -> Option<ContextId> {
        self.contexts.iter().rposition(pred).map(ContextId)
    }

    // ========================================================================
    // TARGET LOOKUP
    // ========================================================================

    pub fn target_for_default_break(&self) -> Option<ContextId> {
        self.innermost(|c| matches!(c.kind, ContextKind::Loop { .. } | ContextKind::Switch))
    }

    pub fn target_for_break_label(&self, label: &str) -> Option<ContextId> {
        self.innermost(|c| matches!(&c.kind, ContextKind::Labeled { label: l, .. } if l == label))
    }

    pub fn target_for_default_continue(&self) -> Option<ContextId> {
        self.innermost(|c| matches!(c.kind, ContextKind::Loop { .. }))
    }

    /// The loop labeled `label`, possibly through further labels
    pub fn target_for_continue_label(&self, label: &str) -> ContinueTarget {
        let Some(labeled) = self.target_for_break_label(label) else {
            return ContinueTarget::UndefinedLabel;
        };
        if !matches!(self.get(labeled).kind, ContextKind::Labeled { body_is_loop: true, .. }) {
            return ContinueTarget::NotALoop;
        }
        let loop_ctx = self.contexts[labeled.0 + 1..]
            .iter()
            .position(|c| !matches!(c.kind, ContextKind::Labeled { .. }))
            .map(|offset| ContextId(labeled.0 + 1 + offset));
        match loop_ctx {
            Some(id) if matches!(self.get(id).kind, ContextKind::Loop { .. }) => ContinueTarget::Found(id),
            _ => ContinueTarget::NotALoop,
        }
    }

    /// Outermost context, the method or initializer
    pub fn root(&self) -> Option<ContextId> {
        if self.contexts.is_empty() {
            None
        } else {
            Some(ContextId(0))
        }
    }

    /// Remember a final-local assignment on every enclosing loop; each loop
    /// re-checks it against its back edge when it closes
    pub fn defer_final_check(&mut self, local: LocalId, span: Span) {
        for ctx in &mut self.contexts {
            if let ContextKind::Loop { final_assignments } = &mut ctx.kind {
                final_assignments.push((local, span));
            }
        }
    }

    // ========================================================================
    // CLEANUP CHAINS
    // ========================================================================

    /// Cleanup regions crossed by a jump from the top of the stack to `target`
    /// (exclusive), innermost first. Stops at the first region that cannot
    /// return. Every crossed `try` sees the jump's flow.
    pub fn cleanup_chain(&mut self, target: ContextId, flow: &FlowInfo) -> CleanupChain {
        let mut regions: SmallVec<[CleanupRegion; 2]> = SmallVec::new();
        let mut escapes = false;
        for index in (target.0 + 1..self.contexts.len()).rev() {
            let ctx = &mut self.contexts[index];
            ctx.record_exit_through(flow);
            if let Some(region) = ctx.subroutine() {
                regions.push(region);
                if !region.can_return {
                    escapes = true;
                    break;
                }
            }
        }
        trace!(
            "cleanup chain to context {}: {} region(s), escapes={}",
            target.0,
            regions.len(),
            escapes
        );
        CleanupChain { regions, escapes }
    }

    // ========================================================================
    // CHECKED EXCEPTIONS
    // ========================================================================

    /// Propagate a thrown class outwards, marking handlers that may catch it
    pub fn record_thrown(
        &mut self,
        class: &str,
        flow: &FlowInfo,
        hierarchy: &dyn ClassHierarchy,
    ) -> ThrowOutcome {
        for index in (0..self.contexts.len()).rev() {
            let ctx = &mut self.contexts[index];
            ctx.record_exit_through(flow);
            match &mut ctx.kind {
                ContextKind::Try { handlers } => {
                    for handler in handlers.iter_mut() {
                        if hierarchy.is_subclass(class, &handler.class) {
                            handler.marked = true;
                            return ThrowOutcome::Caught;
                        }
                        if hierarchy.is_subclass(&handler.class, class) {
                            handler.marked = true;
                        }
                    }
                }
                ContextKind::Method { throws, .. } => {
                    if hierarchy.is_unchecked(class) {
                        return ThrowOutcome::Unchecked;
                    }
                    if throws.iter().any(|t| hierarchy.is_subclass(class, t)) {
                        return ThrowOutcome::Declared;
                    }
                    return ThrowOutcome::Unhandled;
                }
                ContextKind::Initializer => {
                    if hierarchy.is_unchecked(class) {
                        return ThrowOutcome::Unchecked;
                    }
                    return ThrowOutcome::Unhandled;
                }
                _ => {}
            }
        }
        if hierarchy.is_unchecked(class) {
            ThrowOutcome::Unchecked
        } else {
            ThrowOutcome::Unhandled
        }
    }
}

/// A catch clause is worth analyzing when the body may throw its type
pub fn handler_reachable(handler: &Handler, hierarchy: &dyn ClassHierarchy) -> bool {
    handler.marked
        || hierarchy.is_unchecked(&handler.class)
        || hierarchy.is_subclass(RUNTIME_EXCEPTION, &handler.class)
}
