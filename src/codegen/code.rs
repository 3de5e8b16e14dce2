//! Code buffer - instruction emission, labels, stack depth and method tables
//!
//! Emission follows javac's `Code`: while the code is dead (after an
//! unconditional transfer) instructions are dropped, and placing a label that
//! some jump targets revives it at the depth the jumps agreed on.

use super::label::{Fixup, Label, LabelState};
use super::opcodes::{self, *};
use crate::common::{Error, Result, TypeCode};
use tracing::trace;

/// Exception table entry. Ranges are half-open `[start_pc, end_pc)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerEntry {
    pub start_pc: usize,
    pub end_pc: usize,
    pub handler_pc: usize,
    /// Pool index of the caught class; `None` catches everything
    pub catch_type: Option<u16>,
}

/// Line number table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub start_pc: usize,
    pub line: usize,
}

/// Live range of a named local variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRange {
    pub name: String,
    pub descriptor: String,
    pub slot: u16,
    pub start_pc: usize,
    pub end_pc: usize,
}

/// Everything a finished code buffer hands to the class-file writer
#[derive(Debug, Clone, Default)]
pub struct FinishedCode {
    pub bytes: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub handlers: Vec<HandlerEntry>,
    pub lines: Vec<LineEntry>,
    pub local_ranges: Vec<LocalRange>,
}

pub struct Code {
    bytes: Vec<u8>,
    /// Emission enabled? (javac `alive`)
    alive: bool,
    stack: u16,
    max_stack: u16,
    /// Set when an instruction popped more than the stack held
    underflow: bool,
    next_local: u16,
    max_locals: u16,
    /// Use 32-bit offsets for unconditional jumps
    fatcode: bool,
    debug_code: bool,
    labels: Vec<LabelState>,
    handlers: Vec<HandlerEntry>,
    lines: Vec<LineEntry>,
    local_ranges: Vec<LocalRange>,
}

impl Code {
    pub fn new(fatcode: bool, debug_code: bool) -> Self {
        Self {
            bytes: Vec::with_capacity(64),
            alive: true,
            stack: 0,
            max_stack: 0,
            underflow: false,
            next_local: 0,
            max_locals: 0,
            fatcode,
            debug_code,
            labels: Vec::new(),
            handlers: Vec::new(),
            lines: Vec::new(),
            local_ranges: Vec::new(),
        }
    }

    pub fn pc(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn stack_depth(&self) -> u16 {
        self.stack
    }

    pub fn is_fatcode(&self) -> bool {
        self.fatcode
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Start of an exception handler (or subroutine) reached only through
    /// the exception table: code becomes alive with `stack` operands.
    pub fn entry_point(&mut self, stack: u16) -> usize {
        self.alive = true;
        self.stack = 0;
        self.grow_stack(stack as i16);
        self.pc()
    }

    // ========================================================================
    // LOCALS
    // ========================================================================

    /// Reserve the next `width` local slots
    pub fn alloc_local(&mut self, width: u16) -> u16 {
        let slot = self.next_local;
        self.next_local += width.max(1);
        self.max_locals = self.max_locals.max(self.next_local);
        slot
    }

    pub fn local_mark(&self) -> u16 {
        self.next_local
    }

    /// Free every slot allocated since `mark`
    pub fn release_locals(&mut self, mark: u16) {
        self.next_local = mark;
    }

    pub fn add_local_range(&mut self, range: LocalRange) {
        if range.end_pc > range.start_pc {
            self.local_ranges.push(range);
        }
    }

    // ========================================================================
    // RAW EMISSION
    // ========================================================================

    fn put1(&mut self, b: u8) {
        self.bytes.push(b);
    }

    fn put2(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    fn put4(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    fn grow_stack(&mut self, delta: i16) {
        let depth = self.stack as i32 + delta as i32;
        if depth < 0 {
            self.underflow = true;
            self.stack = 0;
        } else {
            self.stack = depth as u16;
            self.max_stack = self.max_stack.max(self.stack);
        }
    }

    /// Write an opcode. Returns false when the code is dead and nothing was
    /// written.
    fn start_op(&mut self, op: u8) -> bool {
        if !self.alive {
            return false;
        }
        if self.debug_code {
            trace!("emit@{} stack={}: {}", self.pc(), self.stack, opcodes::mnemonic(op));
        }
        self.put1(op);
        true
    }

    fn end_op(&mut self, op: u8, delta: i16) {
        self.grow_stack(delta);
        if ends_flow(op) {
            self.alive = false;
        }
    }

    // ========================================================================
    // INSTRUCTIONS
    // ========================================================================

    /// Emit an operand-less instruction with a fixed stack effect
    pub fn emit(&mut self, op: u8) {
        if self.start_op(op) {
            self.end_op(op, stack_effect(op).unwrap_or(0));
        }
    }

    pub fn emit_int(&mut self, value: i32) {
        match value {
            -1..=5 => self.emit((ICONST_0 as i32 + value) as u8),
            -128..=127 => {
                if self.start_op(BIPUSH) {
                    self.put1(value as i8 as u8);
                    self.end_op(BIPUSH, 1);
                }
            }
            _ => {
                if self.start_op(SIPUSH) {
                    self.put2(value as i16 as u16);
                    self.end_op(SIPUSH, 1);
                }
            }
        }
    }

    /// `ldc` family for a pool constant of the given width
    pub fn emit_ldc(&mut self, index: u16, width: u16) {
        if width == 2 {
            if self.start_op(LDC2_W) {
                self.put2(index);
                self.end_op(LDC2_W, 2);
            }
        } else if index <= 0xff {
            if self.start_op(LDC) {
                self.put1(index as u8);
                self.end_op(LDC, 1);
            }
        } else if self.start_op(LDC_W) {
            self.put2(index);
            self.end_op(LDC_W, 1);
        }
    }

    fn emit_local_op(&mut self, base: u8, short_base: u8, slot: u16, delta: i16) {
        if slot <= 3 {
            let op = short_base + slot as u8;
            if self.start_op(op) {
                self.end_op(op, delta);
            }
        } else if slot <= 0xff {
            if self.start_op(base) {
                self.put1(slot as u8);
                self.end_op(base, delta);
            }
        } else if self.start_op(WIDE) {
            self.put1(base);
            self.put2(slot);
            self.end_op(base, delta);
        }
    }

    pub fn emit_load(&mut self, code: TypeCode, slot: u16) {
        let (base, short) = match code {
            TypeCode::Int => (ILOAD, ILOAD_0),
            TypeCode::Long => (LLOAD, LLOAD_0),
            TypeCode::Float => (FLOAD, FLOAD_0),
            TypeCode::Double => (DLOAD, DLOAD_0),
            TypeCode::Reference | TypeCode::Void => (ALOAD, ALOAD_0),
        };
        self.emit_local_op(base, short, slot, stack_effect(base).unwrap_or(1));
    }

    pub fn emit_store(&mut self, code: TypeCode, slot: u16) {
        let (base, short) = match code {
            TypeCode::Int => (ISTORE, ISTORE_0),
            TypeCode::Long => (LSTORE, LSTORE_0),
            TypeCode::Float => (FSTORE, FSTORE_0),
            TypeCode::Double => (DSTORE, DSTORE_0),
            TypeCode::Reference | TypeCode::Void => (ASTORE, ASTORE_0),
        };
        self.emit_local_op(base, short, slot, stack_effect(base).unwrap_or(-1));
    }

    pub fn emit_iinc(&mut self, slot: u16, delta: i16) {
        let narrow = slot <= 0xff && (-128..=127).contains(&delta);
        if narrow {
            if self.start_op(IINC) {
                self.put1(slot as u8);
                self.put1(delta as i8 as u8);
                self.end_op(IINC, 0);
            }
        } else if self.start_op(WIDE) {
            self.put1(IINC);
            self.put2(slot);
            self.put2(delta as u16);
            self.end_op(IINC, 0);
        }
    }

    /// `ret` of a jsr subroutine
    pub fn emit_ret(&mut self, slot: u16) {
        if slot <= 0xff {
            if self.start_op(RET) {
                self.put1(slot as u8);
                self.end_op(RET, 0);
            }
        } else if self.start_op(WIDE) {
            self.put1(RET);
            self.put2(slot);
            self.end_op(RET, 0);
        }
    }

    pub fn emit_return(&mut self, code: TypeCode) {
        self.emit(match code {
            TypeCode::Int => IRETURN,
            TypeCode::Long => LRETURN,
            TypeCode::Float => FRETURN,
            TypeCode::Double => DRETURN,
            TypeCode::Reference => ARETURN,
            TypeCode::Void => RETURN,
        });
    }

    /// getstatic / putstatic / getfield / putfield on a field of `width` slots
    pub fn emit_field(&mut self, op: u8, index: u16, width: u16) {
        let w = width as i16;
        let delta = match op {
            GETSTATIC => w,
            PUTSTATIC => -w,
            GETFIELD => w - 1,
            _ => -w - 1,
        };
        if self.start_op(op) {
            self.put2(index);
            self.end_op(op, delta);
        }
    }

    /// Method invocation; `arg_slots` excludes the receiver
    pub fn emit_invoke(&mut self, op: u8, index: u16, arg_slots: u16, ret_width: u16) {
        let receiver = if op == INVOKESTATIC { 0 } else { 1 };
        let delta = ret_width as i16 - arg_slots as i16 - receiver;
        if self.start_op(op) {
            self.put2(index);
            if op == INVOKEINTERFACE {
                self.put1((arg_slots + 1) as u8);
                self.put1(0);
            }
            self.end_op(op, delta);
        }
    }

    /// new / checkcast / anewarray / instanceof
    pub fn emit_class_op(&mut self, op: u8, index: u16) {
        if self.start_op(op) {
            self.put2(index);
            self.end_op(op, stack_effect(op).unwrap_or(0));
        }
    }

    // ========================================================================
    // LABELS AND JUMPS
    // ========================================================================

    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelState::default());
        Label(self.labels.len() - 1)
    }

    pub fn is_placed(&self, label: Label) -> bool {
        self.labels[label.0].is_placed()
    }

    pub fn label_pc(&self, label: Label) -> Option<usize> {
        self.labels[label.0].pc
    }

    /// Number of jumps emitted towards `label`
    pub fn label_refs(&self, label: Label) -> usize {
        self.labels[label.0].refs
    }

    fn agree_depth(&mut self, label: Label, depth: u16) -> Result<()> {
        let state = &mut self.labels[label.0];
        match state.stack {
            Some(expected) if expected != depth => Err(Error::StackDepthMismatch {
                label: label.0,
                expected,
                found: depth,
            }),
            _ => {
                state.stack = Some(depth);
                Ok(())
            }
        }
    }

    /// Write the offset operand of a branch at `at` towards `label`
    fn branch_operand(&mut self, at: usize, label: Label, wide: bool) -> Result<()> {
        let operand = self.pc();
        let state = &mut self.labels[label.0];
        state.refs += 1;
        match state.pc {
            Some(target) => {
                let offset = target as i64 - at as i64;
                if wide {
                    self.put4(offset as i32);
                } else {
                    let narrow = i16::try_from(offset).map_err(|_| Error::BranchOffsetOverflow { offset })?;
                    self.put2(narrow as u16);
                }
            }
            None => {
                state.fixups.push(Fixup { at, operand, wide });
                if wide {
                    self.put4(0);
                } else {
                    self.put2(0);
                }
            }
        }
        Ok(())
    }

    /// Emit a jump to `label`. In fat-code mode unconditional jumps use the
    /// 32-bit forms and conditional jumps branch around a `goto_w`.
    pub fn jump(&mut self, op: u8, label: Label) -> Result<()> {
        if !self.alive {
            return Ok(());
        }
        if self.fatcode {
            match op {
                GOTO => return self.jump_raw(GOTO_W, label),
                JSR => return self.jump_raw(JSR_W, label),
                _ if is_conditional_jump(op) => {
                    let inverted = negate_jump(op);
                    self.start_op(inverted);
                    // skip this 3-byte test and the 5-byte goto_w
                    self.put2(8);
                    self.end_op(inverted, stack_effect(op).unwrap_or(0));
                    let depth = self.stack;
                    self.jump_raw(GOTO_W, label)?;
                    self.alive = true;
                    self.stack = depth;
                    return Ok(());
                }
                _ => {}
            }
        }
        self.jump_raw(op, label)
    }

    fn jump_raw(&mut self, op: u8, label: Label) -> Result<()> {
        let at = self.pc();
        self.start_op(op);
        let delta = stack_effect(op).unwrap_or(0);
        let depth_at_target = if op == JSR || op == JSR_W {
            self.max_stack = self.max_stack.max(self.stack + 1);
            self.stack + 1
        } else {
            (self.stack as i32 + delta as i32).max(0) as u16
        };
        self.agree_depth(label, depth_at_target)?;
        self.branch_operand(at, label, op == GOTO_W || op == JSR_W)?;
        self.end_op(op, delta);
        Ok(())
    }

    /// Place `label` at the current pc and patch the jumps waiting for it
    pub fn place(&mut self, label: Label) -> Result<()> {
        let pc = self.pc();
        if self.labels[label.0].is_placed() {
            return Err(Error::internal(format!("label {} placed twice", label.0)));
        }
        if self.alive {
            self.agree_depth(label, self.stack)?;
        } else if let Some(depth) = self.labels[label.0].stack {
            self.alive = true;
            self.stack = depth;
        }
        let state = &mut self.labels[label.0];
        state.pc = Some(pc);
        let fixups = std::mem::take(&mut state.fixups);
        for fixup in fixups {
            let offset = pc as i64 - fixup.at as i64;
            if fixup.wide {
                self.bytes[fixup.operand..fixup.operand + 4].copy_from_slice(&(offset as i32).to_be_bytes());
            } else {
                let narrow = i16::try_from(offset).map_err(|_| Error::BranchOffsetOverflow { offset })?;
                self.bytes[fixup.operand..fixup.operand + 2].copy_from_slice(&narrow.to_be_bytes());
            }
        }
        Ok(())
    }

    fn switch_header(&mut self, op: u8) -> Option<usize> {
        let at = self.pc();
        if !self.start_op(op) {
            return None;
        }
        self.grow_stack(-1);
        while self.pc() % 4 != 0 {
            self.put1(0);
        }
        Some(at)
    }

    fn switch_target(&mut self, at: usize, label: Label) -> Result<()> {
        self.agree_depth(label, self.stack)?;
        self.branch_operand(at, label, true)
    }

    pub fn emit_tableswitch(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) -> Result<()> {
        let Some(at) = self.switch_header(TABLESWITCH) else {
            return Ok(());
        };
        self.switch_target(at, default)?;
        self.put4(low);
        self.put4(high);
        for target in targets {
            self.switch_target(at, *target)?;
        }
        self.alive = false;
        Ok(())
    }

    /// `pairs` must be sorted by key
    pub fn emit_lookupswitch(&mut self, default: Label, pairs: &[(i32, Label)]) -> Result<()> {
        let Some(at) = self.switch_header(LOOKUPSWITCH) else {
            return Ok(());
        };
        self.switch_target(at, default)?;
        self.put4(pairs.len() as i32);
        for (key, target) in pairs {
            self.put4(*key);
            self.switch_target(at, *target)?;
        }
        self.alive = false;
        Ok(())
    }

    // ========================================================================
    // TABLES
    // ========================================================================

    /// Register a handler; empty ranges are dropped
    pub fn add_handler(&mut self, start_pc: usize, end_pc: usize, handler_pc: usize, catch_type: Option<u16>) {
        if start_pc < end_pc {
            self.handlers.push(HandlerEntry {
                start_pc,
                end_pc,
                handler_pc,
                catch_type,
            });
        }
    }

    pub fn handlers(&self) -> &[HandlerEntry] {
        &self.handlers
    }

    pub fn mark_line(&mut self, line: usize) {
        if !self.alive {
            return;
        }
        let pc = self.pc();
        match self.lines.last_mut() {
            Some(last) if last.start_pc == pc => last.line = line,
            Some(last) if last.line == line => {}
            _ => self.lines.push(LineEntry { start_pc: pc, line }),
        }
    }

    pub fn finish(self) -> Result<FinishedCode> {
        if self.underflow {
            return Err(Error::internal("operand stack underflow"));
        }
        if self.labels.iter().any(|l| !l.is_placed() && !l.fixups.is_empty()) {
            return Err(Error::UnresolvedTarget { kind: "jump" });
        }
        Ok(FinishedCode {
            bytes: self.bytes,
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            handlers: self.handlers,
            lines: self.lines,
            local_ranges: self.local_ranges,
        })
    }
}
