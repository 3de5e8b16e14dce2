//! Terminos Language Compiler (tolc) - flow analysis and code generation core
//!
//! Takes resolved method bodies, checks them for reachability, definite
//! assignment and exception handling, and emits JVM bytecode in which every
//! `break`, `continue` and `return` runs the finally blocks and monitor exits
//! it leaves.
//!
//! ## Architecture
//!
//! - **ast**: resolved statement and expression trees plus the annotations
//!   flow analysis writes into them
//! - **wash**: flow analysis (context stack, flow info, completion rules)
//! - **codegen**: instruction emission, constant pool, method packaging
//! - **common**: errors, problem reporting, type handles
//!
//! ## Compilation Flow
//!
//! ```text
//! MethodDecl → Flow analysis → annotated MethodDecl → Code generation → MethodCode
//!                   ↓ problems                              ↓ abort
//!               ProblemReporter                       problem method / type
//! ```

pub mod ast;
pub mod codegen;
pub mod common;
pub mod config;
pub mod consts;
pub mod wash;

pub use common::{Error, Result};
pub use config::Config;

use ast::{MethodDecl, TypeDecl};
use codegen::{generate_method, problem_method, ConstantPool, MethodCode, PoolSink};
use common::{AbortScope, ClassHierarchy, ProblemCollector, ProblemReporter};
use tracing::debug;

/// Emitted methods of one type together with the pool they index into
#[derive(Debug, Clone)]
pub struct ClassCode {
    pub name: String,
    pub pool: ConstantPool,
    pub methods: Vec<MethodCode>,
    /// Some method compiles `assert`; the writer adds `$assertionsDisabled`
    pub uses_assertions: bool,
}

#[derive(Debug, Clone)]
pub enum CompiledType {
    Class(ClassCode),
    /// The type could not be emitted at all
    Problem { name: String, message: String },
}

impl CompiledType {
    pub fn name(&self) -> &str {
        match self {
            CompiledType::Class(class) => &class.name,
            CompiledType::Problem { name, .. } => name,
        }
    }
}

/// Analyze and emit one method.
///
/// Problems go to `reporter`. A method with errors, or whose emission fails
/// with a method-level abort, becomes a problem method; type-level aborts
/// are returned.
pub fn compile_method(
    method: &mut MethodDecl,
    hierarchy: &dyn ClassHierarchy,
    config: &Config,
    pool: &mut dyn PoolSink,
    reporter: &mut dyn ProblemReporter,
) -> Result<MethodCode> {
    let mut collector = ProblemCollector::new();
    let summary = wash::analyze_method(method, hierarchy, &mut collector);
    let errors: Vec<String> = collector.errors().map(|p| p.message.clone()).collect();
    for problem in collector.problems {
        reporter.report(problem);
    }
    if summary.errors > 0 {
        debug!("{}: {} errors, emitting problem method", method.qualified_name(), summary.errors);
        return problem_method(method, &errors, pool);
    }

    match generate_method(method, config, pool) {
        Ok(code) => Ok(code),
        Err(err) if err.abort_scope() == AbortScope::Method => {
            debug!("{}: emission aborted: {}", method.qualified_name(), err);
            problem_method(method, &[err.to_string()], pool)
        }
        Err(err) => Err(err),
    }
}

/// Compile every method of `decl` into `pool`
pub fn compile_type(
    decl: &mut TypeDecl,
    hierarchy: &dyn ClassHierarchy,
    config: &Config,
    mut pool: ConstantPool,
    reporter: &mut dyn ProblemReporter,
) -> CompiledType {
    debug!("compiling type {}", decl.name);
    let mut methods = Vec::with_capacity(decl.methods.len());
    for method in &mut decl.methods {
        match compile_method(method, hierarchy, config, &mut pool, reporter) {
            Ok(code) => methods.push(code),
            Err(err) => {
                debug!("type {} aborted: {}", decl.name, err);
                return CompiledType::Problem {
                    name: decl.name.clone(),
                    message: err.to_string(),
                };
            }
        }
    }
    let uses_assertions = methods.iter().any(|m| m.uses_assertions);
    CompiledType::Class(ClassCode {
        name: decl.name.clone(),
        pool,
        methods,
        uses_assertions,
    })
}

/// Compile a unit; a failing type never stops the others
pub fn compile_unit(
    types: &mut [TypeDecl],
    hierarchy: &dyn ClassHierarchy,
    config: &Config,
    reporter: &mut dyn ProblemReporter,
) -> Vec<CompiledType> {
    types
        .iter_mut()
        .map(|decl| compile_type(decl, hierarchy, config, ConstantPool::new(), reporter))
        .collect()
}
