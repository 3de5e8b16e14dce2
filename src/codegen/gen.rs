//! Statement code generation - corresponds to javac's Gen.java
//!
//! Walks an analyzed method body and emits bytecode. Flow analysis already
//! decided everything about non-local jumps: each `break`, `continue` and
//! `return` carries its target and the cleanup regions it crosses, innermost
//! first. Generation keeps a stack of [`GenFrame`]s mirroring the enclosing
//! statements and replays those regions on the way out.
//!
//! Exception-table ranges are tracked per frame as a [`Coverage`]: code a jump
//! emits while leaving a `try` or `synchronized` (its finally block, resource
//! closing, monitor exit) is cut out of that statement's handler ranges.

use super::code::{Code, LocalRange};
use super::label::Label;
use super::opcodes::*;
use super::pool::PoolSink;
use super::switch::emit_dispatch;
use crate::ast::{
    Block, BranchStmt, CleanupChain, CleanupKind, ForEachKind, ForEachStmt, LocalId, MethodDecl, NodeId, Stmt,
    StmtKind, SwitchStmt, SynchronizedStmt, TryResource, TryStmt,
};
use crate::common::{Error, Result, Type, TypeCode};
use crate::config::Config;
use crate::consts::{ASSERTIONS_DISABLED, ASSERTION_ERROR, OBJECT, STRING};
use tracing::trace;

/// Handler coverage of one statement: closed ranges plus the open one
#[derive(Debug, Clone, Default)]
pub(crate) struct Coverage {
    open: Option<usize>,
    ranges: Vec<(usize, usize)>,
}

impl Coverage {
    fn open_at(pc: usize) -> Self {
        Self {
            open: Some(pc),
            ranges: Vec::new(),
        }
    }

    /// Close the open range; false when nothing was open
    fn close(&mut self, pc: usize) -> bool {
        match self.open.take() {
            Some(start) => {
                if pc > start {
                    self.ranges.push((start, pc));
                }
                true
            }
            None => false,
        }
    }

    fn reopen(&mut self, pc: usize) {
        self.open = Some(pc);
    }

    fn finish(mut self, pc: usize) -> Vec<(usize, usize)> {
        self.close(pc);
        self.ranges
    }
}

/// jsr/ret subroutine of a finally block
#[derive(Debug, Clone, Copy)]
struct Subroutine {
    label: Label,
    can_return: bool,
}

enum FrameKind<'a> {
    /// Loop, labeled statement or switch
    Jump {
        break_label: Label,
        continue_label: Option<Label>,
    },
    /// `try` body or catch clause
    Finally {
        block: Option<&'a Block>,
        resources: &'a [TryResource],
        subroutine: Option<Subroutine>,
    },
    Monitor {
        slot: u16,
    },
}

struct GenFrame<'a> {
    id: NodeId,
    kind: FrameKind<'a>,
    coverage: Coverage,
    /// Range guarded by the resource-closing handler
    resource_coverage: Coverage,
}

impl<'a> GenFrame<'a> {
    fn jump(id: NodeId, break_label: Label, continue_label: Option<Label>) -> Self {
        Self {
            id,
            kind: FrameKind::Jump {
                break_label,
                continue_label,
            },
            coverage: Coverage::default(),
            resource_coverage: Coverage::default(),
        }
    }
}

/// Which coverage of a frame an unwind cut
#[derive(Debug, Clone, Copy)]
enum Cut {
    Handlers(usize),
    Resources(usize),
}

#[derive(Debug, Clone, Copy)]
struct LiveLocal {
    local: LocalId,
    slot: u16,
    start: usize,
}

pub struct Gen<'a> {
    pub(crate) method: &'a MethodDecl,
    pub(crate) config: &'a Config,
    pub(crate) pool: &'a mut dyn PoolSink,
    pub(crate) code: Code,
    slots: Vec<Option<u16>>,
    live: Vec<LiveLocal>,
    frames: Vec<GenFrame<'a>>,
    subroutines: bool,
    pub(crate) uses_assertions: bool,
}

impl<'a> Gen<'a> {
    pub fn new(method: &'a MethodDecl, config: &'a Config, pool: &'a mut dyn PoolSink, fatcode: bool) -> Self {
        Self {
            method,
            config,
            pool,
            code: Code::new(fatcode, config.debug_code),
            slots: vec![None; method.locals.len()],
            live: Vec::new(),
            frames: Vec::new(),
            subroutines: config.uses_subroutines(),
            uses_assertions: false,
        }
    }

    /// Emit the whole body, parameters first
    pub fn gen_body(&mut self) -> Result<()> {
        let method = self.method;
        if !method.is_static {
            self.code.alloc_local(1);
        }
        for param in &method.params {
            self.declare_local(*param);
            self.start_range(*param);
        }
        self.gen_block(&method.body)?;
        if self.code.is_alive() {
            if method.return_type != Type::Void {
                return Err(Error::internal(format!(
                    "control reaches the end of {}",
                    method.qualified_name()
                )));
            }
            self.code.emit(RETURN);
        }
        self.close_ranges(0);
        Ok(())
    }

    // ========================================================================
    // LOCALS
    // ========================================================================

    pub(crate) fn local_type(&self, local: LocalId) -> &'a Type {
        let method: &'a MethodDecl = self.method;
        &method.local(local).ty
    }

    pub(crate) fn declare_local(&mut self, local: LocalId) -> u16 {
        let slot = self.code.alloc_local(self.local_type(local).width());
        self.slots[local.index()] = Some(slot);
        slot
    }

    /// The local holds a value from here on
    fn start_range(&mut self, local: LocalId) {
        if let Some(slot) = self.slots[local.index()] {
            let start = self.code.pc();
            self.live.push(LiveLocal { local, slot, start });
        }
    }

    pub(crate) fn slot(&self, local: LocalId) -> Result<u16> {
        self.slots[local.index()]
            .ok_or_else(|| Error::internal(format!("local {} used before its declaration", local.0)))
    }

    fn close_ranges(&mut self, from: usize) {
        let end = self.code.pc();
        let closing: Vec<LiveLocal> = self.live.drain(from..).collect();
        if !self.config.local_variable_table {
            return;
        }
        let method = self.method;
        for live in closing {
            let var = method.local(live.local);
            self.code.add_local_range(LocalRange {
                name: var.name.clone(),
                descriptor: var.ty.descriptor(),
                slot: live.slot,
                start_pc: live.start,
                end_pc: end,
            });
        }
    }

    /// Run `f` in a scope whose locals die at its end
    fn scoped(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let mark = self.code.local_mark();
        let live = self.live.len();
        f(self)?;
        self.close_ranges(live);
        self.code.release_locals(mark);
        Ok(())
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    pub fn gen_block(&mut self, block: &'a Block) -> Result<()> {
        self.scoped(|this| {
            for stmt in &block.stmts {
                this.gen_stmt(stmt)?;
            }
            Ok(())
        })
    }

    pub fn gen_stmt(&mut self, stmt: &'a Stmt) -> Result<()> {
        if !stmt.reachable {
            return Ok(());
        }
        if !matches!(stmt.kind, StmtKind::Block(_) | StmtKind::Case(_) | StmtKind::Empty) {
            self.code.mark_line(stmt.span.start.line);
        }
        match &stmt.kind {
            StmtKind::Block(block) => self.gen_block(block),

            StmtKind::LocalDecl(decl) => {
                let slot = self.declare_local(decl.local);
                if let Some(init) = &decl.init {
                    self.gen_expr(init)?;
                    self.code.emit_store(self.local_type(decl.local).type_code(), slot);
                }
                self.start_range(decl.local);
                Ok(())
            }

            StmtKind::Expr(expr) => self.gen_expr_stmt(expr),

            StmtKind::If(s) => match s.condition.constant_bool() {
                Some(true) => self.gen_stmt(&s.then_branch),
                Some(false) => match &s.else_branch {
                    Some(else_branch) => self.gen_stmt(else_branch),
                    None => Ok(()),
                },
                None => {
                    let else_label = self.code.new_label();
                    self.gen_cond(&s.condition, false, else_label)?;
                    self.gen_stmt(&s.then_branch)?;
                    match &s.else_branch {
                        Some(else_branch) => {
                            let end = self.code.new_label();
                            self.code.jump(GOTO, end)?;
                            self.code.place(else_label)?;
                            self.gen_stmt(else_branch)?;
                            self.code.place(end)
                        }
                        None => self.code.place(else_label),
                    }
                }
            },

            StmtKind::While(w) => {
                if w.condition.constant_bool() == Some(false) {
                    return Ok(());
                }
                let (brk, cont) = (self.code.new_label(), self.code.new_label());
                self.frames.push(GenFrame::jump(stmt.id, brk, Some(cont)));
                let top = self.code.new_label();
                self.code.place(top)?;
                if w.condition.constant_bool().is_none() {
                    self.gen_cond(&w.condition, false, brk)?;
                }
                self.gen_stmt(&w.body)?;
                self.code.place(cont)?;
                self.code.jump(GOTO, top)?;
                self.frames.pop();
                self.code.place(brk)
            }

            StmtKind::DoWhile(d) => {
                let (brk, cont) = (self.code.new_label(), self.code.new_label());
                self.frames.push(GenFrame::jump(stmt.id, brk, Some(cont)));
                let top = self.code.new_label();
                self.code.place(top)?;
                self.gen_stmt(&d.body)?;
                self.code.place(cont)?;
                match d.condition.constant_bool() {
                    Some(true) => self.code.jump(GOTO, top)?,
                    Some(false) => {}
                    None => self.gen_cond(&d.condition, true, top)?,
                }
                self.frames.pop();
                self.code.place(brk)
            }

            StmtKind::For(f) => self.scoped(|this| {
                for init in &f.init {
                    this.gen_stmt(init)?;
                }
                let constant = f.condition.as_ref().map_or(Some(true), |c| c.constant_bool());
                if constant == Some(false) {
                    return Ok(());
                }
                let (brk, cont) = (this.code.new_label(), this.code.new_label());
                this.frames.push(GenFrame::jump(stmt.id, brk, Some(cont)));
                let top = this.code.new_label();
                this.code.place(top)?;
                if let (None, Some(cond)) = (constant, &f.condition) {
                    this.gen_cond(cond, false, brk)?;
                }
                this.gen_stmt(&f.body)?;
                this.code.place(cont)?;
                for update in &f.update {
                    this.gen_expr_stmt(update)?;
                }
                this.code.jump(GOTO, top)?;
                this.frames.pop();
                this.code.place(brk)
            }),

            StmtKind::ForEach(f) => self.scoped(|this| this.gen_foreach(stmt.id, f)),

            StmtKind::Labeled(l) => {
                let brk = self.code.new_label();
                self.frames.push(GenFrame::jump(stmt.id, brk, None));
                self.gen_stmt(&l.body)?;
                self.frames.pop();
                self.code.place(brk)
            }

            StmtKind::Break(b) => self.gen_branch(b, false),
            StmtKind::Continue(c) => self.gen_branch(c, true),

            StmtKind::Return(r) => {
                let chain = &r.info.chain;
                let ret = self.method.return_type.type_code();
                match &r.value {
                    None => {
                        let cuts = self.unwind(None, chain)?;
                        if let Some(cuts) = cuts {
                            self.code.emit(RETURN);
                            self.restore(cuts);
                        }
                    }
                    Some(value) if chain.escapes => {
                        self.gen_expr(value)?;
                        self.pop_value(&value.result_type());
                        self.unwind(None, chain)?;
                    }
                    Some(value) if value.constant.is_some() => {
                        if let Some(cuts) = self.unwind(None, chain)? {
                            self.gen_expr(value)?;
                            self.code.emit_return(ret);
                            self.restore(cuts);
                        }
                    }
                    Some(value) if r.info.save_value_needed => {
                        let mark = self.code.local_mark();
                        self.gen_expr(value)?;
                        let temp = self.code.alloc_local(self.method.return_type.width());
                        self.code.emit_store(ret, temp);
                        if let Some(cuts) = self.unwind(None, chain)? {
                            self.code.emit_load(ret, temp);
                            self.code.emit_return(ret);
                            self.restore(cuts);
                        }
                        self.code.release_locals(mark);
                    }
                    Some(value) => {
                        // monitor exits leave the operand stack alone
                        self.gen_expr(value)?;
                        if let Some(cuts) = self.unwind(None, chain)? {
                            self.code.emit_return(ret);
                            self.restore(cuts);
                        }
                    }
                }
                Ok(())
            }

            StmtKind::Throw(t) => {
                self.gen_expr(&t.expr)?;
                self.code.emit(ATHROW);
                Ok(())
            }

            StmtKind::Try(t) => self.gen_try(stmt.id, t),
            StmtKind::Synchronized(s) => self.gen_synchronized(stmt.id, s),
            StmtKind::Switch(s) => self.scoped(|this| this.gen_switch(stmt.id, s)),

            StmtKind::Assert(a) => {
                if !self.config.emit_assertions {
                    return Ok(());
                }
                self.uses_assertions = true;
                let skip = self.code.new_label();
                let flag = self.pool.field(&self.method.owner, ASSERTIONS_DISABLED, "Z")?;
                self.code.emit_field(GETSTATIC, flag, 1);
                self.code.jump(IFNE, skip)?;
                self.gen_cond(&a.condition, true, skip)?;
                let error = self.pool.class(ASSERTION_ERROR)?;
                self.code.emit_class_op(NEW, error);
                self.code.emit(DUP);
                let (descriptor, slots) = match &a.message {
                    Some(message) => {
                        self.gen_expr(message)?;
                        let ty = message.result_type();
                        (assertion_descriptor(&ty), ty.width())
                    }
                    None => ("()V".to_string(), 0),
                };
                let init = self.pool.method(ASSERTION_ERROR, "<init>", &descriptor, false)?;
                self.code.emit_invoke(INVOKESPECIAL, init, slots, 0);
                self.code.emit(ATHROW);
                self.code.place(skip)
            }

            // case labels are placed by the enclosing switch
            StmtKind::Case(_) | StmtKind::Empty => Ok(()),
        }
    }

    // ========================================================================
    // JUMPS
    // ========================================================================

    fn jump_frame(&self, target: NodeId) -> Option<usize> {
        self.frames
            .iter()
            .rposition(|f| f.id == target && matches!(f.kind, FrameKind::Jump { .. }))
    }

    fn gen_branch(&mut self, branch: &'a BranchStmt, is_continue: bool) -> Result<()> {
        // an unresolved target was reported by flow analysis
        let Some(target) = branch.info.target else {
            return Ok(());
        };
        let kind = if is_continue { "continue" } else { "break" };
        let index = self.jump_frame(target).ok_or(Error::UnresolvedTarget { kind })?;
        let label = match &self.frames[index].kind {
            FrameKind::Jump {
                break_label,
                continue_label,
            } => {
                if is_continue {
                    continue_label.ok_or(Error::UnresolvedTarget { kind })?
                } else {
                    *break_label
                }
            }
            _ => return Err(Error::UnresolvedTarget { kind }),
        };
        if let Some(cuts) = self.unwind(Some(index), &branch.info.chain)? {
            self.code.jump(GOTO, label)?;
            self.restore(cuts);
        }
        Ok(())
    }

    /// Run the cleanups of `chain` while leaving every frame above `target`
    /// (all frames for a return). Returns the coverage cuts to restore once
    /// the jump itself is emitted, or `None` when a non-returning cleanup
    /// ended the path.
    fn unwind(&mut self, target: Option<usize>, chain: &CleanupChain) -> Result<Option<Vec<Cut>>> {
        if !self.code.is_alive() {
            return Ok(None);
        }
        let stop = target.map_or(0, |t| t + 1);
        let mut regions = chain.regions.iter().peekable();
        let mut cuts = Vec::new();
        let mut index = self.frames.len();
        while index > stop {
            index -= 1;
            let pc = self.code.pc();
            if self.frames[index].resource_coverage.close(pc) {
                cuts.push(Cut::Resources(index));
            }
            let region = match regions.peek() {
                Some(r) if r.owner == self.frames[index].id && self.has_cleanup(index) => regions.next().copied(),
                _ => None,
            };
            trace!("unwinding frame {} (cleanup: {})", index, region.is_some());
            if let Some(region) = region {
                if region.kind == CleanupKind::Finally {
                    self.close_resources_of(index)?;
                }
            }
            let pc = self.code.pc();
            if self.frames[index].coverage.close(pc) {
                cuts.push(Cut::Handlers(index));
            }
            if let Some(region) = region {
                self.run_cleanup(index)?;
                if !region.can_return || !self.code.is_alive() {
                    self.restore(cuts);
                    return Ok(None);
                }
            }
        }
        Ok(Some(cuts))
    }

    fn restore(&mut self, cuts: Vec<Cut>) {
        let pc = self.code.pc();
        for cut in cuts {
            match cut {
                Cut::Handlers(i) => self.frames[i].coverage.reopen(pc),
                Cut::Resources(i) => self.frames[i].resource_coverage.reopen(pc),
            }
        }
    }

    fn has_cleanup(&self, index: usize) -> bool {
        match &self.frames[index].kind {
            FrameKind::Finally { block, resources, .. } => block.is_some() || !resources.is_empty(),
            FrameKind::Monitor { .. } => true,
            FrameKind::Jump { .. } => false,
        }
    }

    fn close_resources_of(&mut self, index: usize) -> Result<()> {
        if let FrameKind::Finally { resources, .. } = self.frames[index].kind {
            self.close_resources(resources)?;
        }
        Ok(())
    }

    /// Finally block or monitor exit of frame `index`, emitted with only the
    /// frames outside it in scope
    fn run_cleanup(&mut self, index: usize) -> Result<()> {
        match self.frames[index].kind {
            FrameKind::Monitor { slot } => {
                self.code.emit_load(TypeCode::Reference, slot);
                self.code.emit(MONITOREXIT);
                Ok(())
            }
            FrameKind::Finally {
                block, subroutine, ..
            } => {
                let Some(block) = block else {
                    return Ok(());
                };
                let inner = self.frames.split_off(index);
                let result = self.call_finally(block, subroutine);
                self.frames.extend(inner);
                result
            }
            FrameKind::Jump { .. } => Ok(()),
        }
    }

    fn call_finally(&mut self, block: &'a Block, subroutine: Option<Subroutine>) -> Result<()> {
        match subroutine {
            Some(sub) if sub.can_return => self.code.jump(JSR, sub.label),
            Some(sub) => self.code.jump(GOTO, sub.label),
            None => self.gen_block(block),
        }
    }

    // ========================================================================
    // TRY / SYNCHRONIZED
    // ========================================================================

    /// Close resources in reverse order, skipping nulls
    fn close_resources(&mut self, resources: &'a [TryResource]) -> Result<()> {
        for resource in resources.iter().rev() {
            let slot = self.slot(resource.local)?;
            let skip = self.code.new_label();
            self.code.emit_load(TypeCode::Reference, slot);
            self.code.jump(IFNULL, skip)?;
            self.code.emit_load(TypeCode::Reference, slot);
            self.gen_invoke_ref(&resource.close)?;
            self.pop_value(&resource.close.ret);
            self.code.place(skip)?;
        }
        Ok(())
    }

    fn gen_try(&mut self, id: NodeId, t: &'a TryStmt) -> Result<()> {
        let finally = t.finally_block.as_ref().filter(|b| !b.is_empty());
        let can_return = t.info.finally_completes;
        let subroutine = match finally {
            Some(_) if self.subroutines => Some(Subroutine {
                label: self.code.new_label(),
                can_return,
            }),
            _ => None,
        };
        let end = self.code.new_label();
        let mark = self.code.local_mark();
        let live = self.live.len();

        // body, resources first
        let start = self.code.pc();
        self.frames.push(GenFrame {
            id,
            kind: FrameKind::Finally {
                block: finally,
                resources: &t.resources,
                subroutine,
            },
            coverage: Coverage::open_at(start),
            resource_coverage: Coverage::default(),
        });
        for resource in &t.resources {
            let slot = self.declare_local(resource.local);
            self.gen_expr(&resource.init)?;
            self.code.emit_store(TypeCode::Reference, slot);
            self.start_range(resource.local);
        }
        if !t.resources.is_empty() {
            let pc = self.code.pc();
            if let Some(frame) = self.frames.last_mut() {
                frame.resource_coverage = Coverage::open_at(pc);
            }
        }
        self.gen_block(&t.body)?;
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::internal("try frame missing"))?;
        let resource_ranges = frame.resource_coverage.finish(self.code.pc());
        if self.code.is_alive() {
            self.close_resources(&t.resources)?;
        }
        let body_ranges = frame.coverage.finish(self.code.pc());
        if self.code.is_alive() {
            if let Some(block) = finally {
                self.call_finally(block, subroutine)?;
            }
            self.code.jump(GOTO, end)?;
        }

        // resource handler: close, then rethrow
        let mut catch_ranges = body_ranges;
        if !resource_ranges.is_empty() {
            let handler = self.code.entry_point(1);
            let temp = self.code.alloc_local(1);
            self.code.emit_store(TypeCode::Reference, temp);
            self.close_resources(&t.resources)?;
            self.code.emit_load(TypeCode::Reference, temp);
            self.code.emit(ATHROW);
            for (s, e) in &resource_ranges {
                self.code.add_handler(*s, *e, handler, None);
            }
            catch_ranges.push((handler, self.code.pc()));
        }
        self.close_ranges(live);

        // catch clauses; an empty try range has no handlers to reach them
        let mut catch_all_ranges = catch_ranges.clone();
        let catches = if catch_ranges.is_empty() { &[][..] } else { &t.catches[..] };
        for catch in catches {
            let handler = self.code.entry_point(1);
            let class = self.pool.class(&catch.class)?;
            for (s, e) in &catch_ranges {
                self.code.add_handler(*s, *e, handler, Some(class));
            }
            let catch_mark = self.code.local_mark();
            let catch_live = self.live.len();
            let slot = self.declare_local(catch.param);
            self.code.emit_store(TypeCode::Reference, slot);
            self.start_range(catch.param);
            if finally.is_some() {
                self.frames.push(GenFrame {
                    id,
                    kind: FrameKind::Finally {
                        block: finally,
                        resources: &[],
                        subroutine,
                    },
                    coverage: Coverage::open_at(handler),
                    resource_coverage: Coverage::default(),
                });
            }
            self.gen_block(&catch.body)?;
            if finally.is_some() {
                let frame = self
                    .frames
                    .pop()
                    .ok_or_else(|| Error::internal("catch frame missing"))?;
                catch_all_ranges.extend(frame.coverage.finish(self.code.pc()));
            }
            self.close_ranges(catch_live);
            if self.code.is_alive() {
                if let Some(block) = finally {
                    self.call_finally(block, subroutine)?;
                }
                self.code.jump(GOTO, end)?;
            }
            self.code.release_locals(catch_mark);
        }

        // catch-all: run the finally block and rethrow
        if let Some(block) = finally {
            if !catch_all_ranges.is_empty() {
                let handler = self.code.entry_point(1);
                let temp = self.code.alloc_local(1);
                self.code.emit_store(TypeCode::Reference, temp);
                self.call_finally(block, subroutine)?;
                self.code.emit_load(TypeCode::Reference, temp);
                self.code.emit(ATHROW);
                for (s, e) in &catch_all_ranges {
                    self.code.add_handler(*s, *e, handler, None);
                }
            }
            if let Some(sub) = subroutine {
                self.gen_subroutine(block, sub)?;
            }
        }

        self.code.release_locals(mark);
        self.code.place(end)
    }

    /// Finally block as a jsr target; a non-returning one is entered by goto
    /// and keeps no return address.
    fn gen_subroutine(&mut self, block: &'a Block, sub: Subroutine) -> Result<()> {
        if self.code.label_refs(sub.label) == 0 {
            return Ok(());
        }
        self.code.place(sub.label)?;
        if sub.can_return {
            let ret = self.code.alloc_local(1);
            self.code.emit_store(TypeCode::Reference, ret);
            self.gen_block(block)?;
            self.code.emit_ret(ret);
        } else {
            self.gen_block(block)?;
        }
        Ok(())
    }

    fn gen_synchronized(&mut self, id: NodeId, s: &'a SynchronizedStmt) -> Result<()> {
        let mark = self.code.local_mark();
        let end = self.code.new_label();
        self.gen_expr(&s.lock)?;
        self.code.emit(DUP);
        let slot = self.code.alloc_local(1);
        self.code.emit_store(TypeCode::Reference, slot);
        self.code.emit(MONITORENTER);
        let start = self.code.pc();
        self.frames.push(GenFrame {
            id,
            kind: FrameKind::Monitor { slot },
            coverage: Coverage::open_at(start),
            resource_coverage: Coverage::default(),
        });
        self.gen_block(&s.body)?;
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::internal("monitor frame missing"))?;
        let ranges = frame.coverage.finish(self.code.pc());
        if self.code.is_alive() {
            self.code.emit_load(TypeCode::Reference, slot);
            self.code.emit(MONITOREXIT);
            self.code.jump(GOTO, end)?;
        }
        if !ranges.is_empty() {
            let handler = self.code.entry_point(1);
            let temp = self.code.alloc_local(1);
            self.code.emit_store(TypeCode::Reference, temp);
            self.code.emit_load(TypeCode::Reference, slot);
            self.code.emit(MONITOREXIT);
            self.code.emit_load(TypeCode::Reference, temp);
            self.code.emit(ATHROW);
            for (s, e) in &ranges {
                self.code.add_handler(*s, *e, handler, None);
            }
        }
        self.code.release_locals(mark);
        self.code.place(end)
    }

    // ========================================================================
    // SWITCH / FOREACH
    // ========================================================================

    fn gen_switch(&mut self, id: NodeId, s: &'a SwitchStmt) -> Result<()> {
        let brk = self.code.new_label();
        let labels: Vec<Option<Label>> = s
            .body
            .iter()
            .map(|stmt| matches!(stmt.kind, StmtKind::Case(_)).then(|| self.code.new_label()))
            .collect();
        let mut default = None;
        let mut cases = Vec::new();
        for (stmt, label) in s.body.iter().zip(&labels) {
            if let (StmtKind::Case(value), Some(label)) = (&stmt.kind, label) {
                match value {
                    None => default = Some(*label),
                    Some(expr) => cases.push((expr, *label)),
                }
            }
        }
        let default = default.unwrap_or(brk);

        self.gen_expr(&s.selector)?;
        if s.selector.result_type().class_name() == Some(STRING) {
            let temp = self.code.alloc_local(1);
            self.code.emit_store(TypeCode::Reference, temp);
            let equals = self.pool.method(STRING, "equals", &format!("(L{};)Z", OBJECT), false)?;
            for (expr, label) in &cases {
                let text = expr
                    .constant
                    .as_ref()
                    .and_then(|c| c.as_str())
                    .ok_or_else(|| Error::internal("string case without a string constant"))?;
                let index = self.pool.string(text)?;
                self.code.emit_load(TypeCode::Reference, temp);
                self.code.emit_ldc(index, 1);
                self.code.emit_invoke(INVOKEVIRTUAL, equals, 1, 1);
                self.code.jump(IFNE, *label)?;
            }
            self.code.jump(GOTO, default)?;
        } else {
            let keys = cases
                .iter()
                .map(|(expr, label)| {
                    expr.constant
                        .as_ref()
                        .and_then(|c| c.as_int())
                        .map(|key| (key, *label))
                        .ok_or_else(|| Error::internal("case label without an int constant"))
                })
                .collect::<Result<Vec<_>>>()?;
            emit_dispatch(&mut self.code, &keys, default)?;
        }

        self.frames.push(GenFrame::jump(id, brk, None));
        for (stmt, label) in s.body.iter().zip(&labels) {
            match label {
                Some(label) => self.code.place(*label)?,
                None => self.gen_stmt(stmt)?,
            }
        }
        self.frames.pop();
        self.code.place(brk)
    }

    fn gen_foreach(&mut self, id: NodeId, f: &'a ForEachStmt) -> Result<()> {
        let (brk, cont) = (self.code.new_label(), self.code.new_label());
        let top = self.code.new_label();
        let var_code = self.local_type(f.var).type_code();
        self.gen_expr(&f.iterable)?;
        match &f.kind {
            ForEachKind::Array { element } => {
                let array = self.code.alloc_local(1);
                self.code.emit_store(TypeCode::Reference, array);
                let index = self.code.alloc_local(1);
                self.code.emit_int(0);
                self.code.emit_store(TypeCode::Int, index);
                self.frames.push(GenFrame::jump(id, brk, Some(cont)));
                self.code.place(top)?;
                self.code.emit_load(TypeCode::Int, index);
                self.code.emit_load(TypeCode::Reference, array);
                self.code.emit(ARRAYLENGTH);
                self.code.jump(IF_ICMPGE, brk)?;
                self.code.emit_load(TypeCode::Reference, array);
                self.code.emit_load(TypeCode::Int, index);
                self.code.emit(array_load(element));
                let slot = self.declare_local(f.var);
                self.code.emit_store(var_code, slot);
                self.start_range(f.var);
                self.gen_stmt(&f.body)?;
                self.code.place(cont)?;
                self.code.emit_iinc(index, 1);
                self.code.jump(GOTO, top)?;
            }
            ForEachKind::Iterable {
                iterator,
                has_next,
                next,
                element_cast,
            } => {
                self.gen_invoke_ref(iterator)?;
                let iter = self.code.alloc_local(1);
                self.code.emit_store(TypeCode::Reference, iter);
                self.frames.push(GenFrame::jump(id, brk, Some(cont)));
                self.code.place(top)?;
                self.code.emit_load(TypeCode::Reference, iter);
                self.gen_invoke_ref(has_next)?;
                self.code.jump(IFEQ, brk)?;
                self.code.emit_load(TypeCode::Reference, iter);
                self.gen_invoke_ref(next)?;
                if let Some(class) = element_cast {
                    let index = self.pool.class(class)?;
                    self.code.emit_class_op(CHECKCAST, index);
                }
                let slot = self.declare_local(f.var);
                self.code.emit_store(var_code, slot);
                self.start_range(f.var);
                self.gen_stmt(&f.body)?;
                self.code.place(cont)?;
                self.code.jump(GOTO, top)?;
            }
        }
        self.frames.pop();
        self.code.place(brk)
    }
}

fn array_load(element: &Type) -> u8 {
    match element {
        Type::Boolean | Type::Byte => BALOAD,
        Type::Char => CALOAD,
        Type::Short => SALOAD,
        Type::Int => IALOAD,
        Type::Long => LALOAD,
        Type::Float => FALOAD,
        Type::Double => DALOAD,
        _ => AALOAD,
    }
}

/// `AssertionError` constructor taking a detail message of type `ty`
fn assertion_descriptor(ty: &Type) -> String {
    let param = match ty {
        Type::Boolean => "Z".to_string(),
        Type::Char => "C".to_string(),
        Type::Byte | Type::Short | Type::Int => "I".to_string(),
        Type::Long => "J".to_string(),
        Type::Float => "F".to_string(),
        Type::Double => "D".to_string(),
        _ => format!("L{};", OBJECT),
    };
    format!("({})V", param)
}
