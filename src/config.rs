//! Compiler configuration for the analysis and emission passes

use crate::consts::{JSR_FORBIDDEN_MAJOR, MAX_CODE_SIZE};

/// Configuration shared by flow analysis and code generation
#[derive(Debug, Clone)]
pub struct Config {
    /// Target class-file major version (49 = Java 5, 52 = Java 8)
    pub target_version: u16,
    /// Inline finally blocks at every exit instead of emitting jsr/ret subroutines
    pub inline_finally: bool,
    /// Compile `assert` statements (otherwise they emit nothing)
    pub emit_assertions: bool,
    /// Record local variable live ranges
    pub local_variable_table: bool,
    /// Trace every emitted instruction
    pub debug_code: bool,
    /// Upper bound on the size of a method's code array
    pub max_code_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_version: 52,
            inline_finally: true,
            emit_assertions: true,
            local_variable_table: true,
            debug_code: false,
            max_code_size: MAX_CODE_SIZE,
        }
    }
}

impl Config {
    pub fn with_target_version(mut self, major: u16) -> Self {
        self.target_version = major;
        self
    }

    pub fn with_inline_finally(mut self, inline: bool) -> Self {
        self.inline_finally = inline;
        self
    }

    pub fn with_emit_assertions(mut self, emit: bool) -> Self {
        self.emit_assertions = emit;
        self
    }

    pub fn with_local_variable_table(mut self, emit: bool) -> Self {
        self.local_variable_table = emit;
        self
    }

    pub fn with_debug_code(mut self, debug: bool) -> Self {
        self.debug_code = debug;
        self
    }

    pub fn with_max_code_size(mut self, size: usize) -> Self {
        self.max_code_size = size;
        self
    }

    /// Finally blocks become jsr/ret subroutines only when asked for and
    /// the target still verifies them.
    pub fn uses_subroutines(&self) -> bool {
        !self.inline_finally && self.target_version < JSR_FORBIDDEN_MAJOR
    }
}
