//! Code generation module
//!
//! Turns analyzed method bodies into JVM bytecode: the instruction buffer
//! and its labels, constant pool interning, switch dispatch, and the
//! statement and expression generators that replay the cleanup chains flow
//! analysis recorded.

pub mod code;
pub mod disasm;
pub mod gen;
mod gen_expr;
pub mod label;
pub mod method;
pub mod opcodes;
pub mod pool;
pub mod switch;

pub use code::{Code, FinishedCode, HandlerEntry, LineEntry, LocalRange};
pub use gen::Gen;
pub use label::Label;
pub use method::{generate_method, problem_method, MethodCode};
pub use pool::{ConstantPool, PoolEntry, PoolSink};
pub use switch::SwitchKind;
