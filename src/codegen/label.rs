//! Jump targets
//!
//! A [`Label`] is a handle into the label arena of its [`Code`](super::code::Code).
//! Jumps to a label that is not placed yet are remembered as fixups and
//! patched when the label is placed; jumps to a placed label are resolved at
//! once.

/// Handle of a jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) usize);

impl Label {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A branch instruction waiting for its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fixup {
    /// pc of the branch opcode; offsets are relative to it
    pub at: usize,
    /// Position of the offset operand
    pub operand: usize,
    /// 32-bit offset operand
    pub wide: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LabelState {
    pub pc: Option<usize>,
    /// Operand stack depth every path reaching the label must agree on
    pub stack: Option<u16>,
    pub fixups: Vec<Fixup>,
    /// Number of jumps (resolved or not) targeting the label
    pub refs: usize,
}

impl LabelState {
    pub fn is_placed(&self) -> bool {
        self.pc.is_some()
    }
}
