//! Flow phase of the compiler
//!
//! Runs between binding resolution and code generation. Everything here works
//! on resolved trees and writes its verdicts back into them:
//!
//! - `flow_info`: reachability and assignment state of one control path
//! - `flow_context`: the stack of enclosing loops, labels, switches, `try`s
//!   and `synchronized` blocks, and the cleanup chains of jumps
//! - `completion`: structural completion check for finally blocks
//! - `flow`: the analyzer proper

pub mod completion;
pub mod flow;
pub mod flow_context;
mod flow_expr;
pub mod flow_info;

pub use flow::{analyze_method, FlowAnalyzer, FlowSummary};
pub use flow_context::{ContextId, ContextKind, FlowContext, FlowContextStack, ThrowOutcome};
pub use flow_info::{ConditionalFlow, FlowInfo, Reachability};
