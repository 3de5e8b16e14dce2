//! Per-method code generation driver
//!
//! Runs [`Gen`] over an analyzed method and packages the result. A method
//! whose 16-bit branch offsets overflow is regenerated once in fat-code mode;
//! methods that failed analysis get a problem body instead.

use super::code::{FinishedCode, HandlerEntry, LineEntry, LocalRange};
use super::disasm;
use super::gen::Gen;
use super::opcodes::*;
use super::pool::{ConstantPool, PoolSink};
use crate::ast::MethodDecl;
use crate::common::{Error, Result};
use crate::config::Config;
use crate::consts::{ERROR, PROBLEM_PREFIX, STRING};
use std::fmt::Write as _;
use tracing::debug;

/// Code attribute of one method, ready for the class-file writer
#[derive(Debug, Clone)]
pub struct MethodCode {
    pub name: String,
    pub descriptor: String,
    pub code: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub handlers: Vec<HandlerEntry>,
    pub lines: Vec<LineEntry>,
    pub local_ranges: Vec<LocalRange>,
    /// Owner needs its `$assertionsDisabled` flag
    pub uses_assertions: bool,
    /// Body replaced by a throw of the collected problems
    pub is_problem: bool,
    /// Generated with 32-bit jump offsets
    pub fatcode: bool,
}

impl MethodCode {
    fn new(method: &MethodDecl, finished: FinishedCode) -> Self {
        Self {
            name: method.name.clone(),
            descriptor: method.descriptor(),
            code: finished.bytes,
            max_stack: finished.max_stack,
            max_locals: finished.max_locals,
            handlers: finished.handlers,
            lines: finished.lines,
            local_ranges: finished.local_ranges,
            uses_assertions: false,
            is_problem: false,
            fatcode: false,
        }
    }

    /// javap-style listing of the code and its exception table
    pub fn listing(&self, pool: Option<&ConstantPool>) -> Result<String> {
        let mut out = format!("{}{}\n", self.name, self.descriptor);
        out.push_str(&disasm::render(&disasm::disassemble(&self.code)?, pool));
        if !self.handlers.is_empty() {
            out.push_str("Exception table:\n");
            for h in &self.handlers {
                let kind = match (h.catch_type, pool) {
                    (None, _) => "any".to_string(),
                    (Some(index), Some(pool)) => pool.describe(index),
                    (Some(index), None) => format!("#{}", index),
                };
                let _ = writeln!(out, "  {:>5} {:>5} {:>5}   {}", h.start_pc, h.end_pc, h.handler_pc, kind);
            }
        }
        Ok(out)
    }
}

fn generate(method: &MethodDecl, config: &Config, pool: &mut dyn PoolSink, fatcode: bool) -> Result<MethodCode> {
    let mut gen = Gen::new(method, config, pool, fatcode);
    gen.gen_body()?;
    let uses_assertions = gen.uses_assertions;
    let finished = gen.code.finish()?;
    if finished.bytes.len() > config.max_code_size {
        return Err(Error::code_too_large(method.qualified_name(), finished.bytes.len()));
    }
    let mut code = MethodCode::new(method, finished);
    code.uses_assertions = uses_assertions;
    code.fatcode = fatcode;
    Ok(code)
}

/// Emit the code of an analyzed, error-free method
pub fn generate_method(method: &MethodDecl, config: &Config, pool: &mut dyn PoolSink) -> Result<MethodCode> {
    match generate(method, config, pool, false) {
        Err(Error::BranchOffsetOverflow { offset }) => {
            debug!(
                "{}: branch offset {} out of range, regenerating with wide jumps",
                method.qualified_name(),
                offset
            );
            generate(method, config, pool, true)
        }
        result => result,
    }
}

/// Body that throws `java.lang.Error` describing `problems`
pub fn problem_method(method: &MethodDecl, problems: &[String], pool: &mut dyn PoolSink) -> Result<MethodCode> {
    let mut code = super::code::Code::new(false, false);
    let params: u16 = method.params.iter().map(|p| method.local(*p).ty.width()).sum();
    let locals = params + u16::from(!method.is_static);
    if locals > 0 {
        code.alloc_local(locals);
    }
    let message = format!("{}{}", PROBLEM_PREFIX, problems.join("\n"));
    let error = pool.class(ERROR)?;
    let text = pool.string(&message)?;
    let init = pool.method(ERROR, "<init>", &format!("(L{};)V", STRING), false)?;
    code.emit_class_op(NEW, error);
    code.emit(DUP);
    code.emit_ldc(text, 1);
    code.emit_invoke(INVOKESPECIAL, init, 1, 0);
    code.emit(ATHROW);
    let mut result = MethodCode::new(method, code.finish()?);
    result.is_problem = true;
    Ok(result)
}
