// Common test utilities
#![allow(dead_code)]

use tolc_flowgen::ast::*;
use tolc_flowgen::codegen::disasm;
use tolc_flowgen::codegen::{generate_method, ConstantPool, MethodCode};
use tolc_flowgen::common::{ClassTable, ProblemCollector, ProblemKind, Type};
use tolc_flowgen::wash::analyze_method;
use tolc_flowgen::Config;

pub const OWNER: &str = "p/T";

/// Route `tracing` output through the test harness (RUST_LOG=debug to see it)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn builder() -> AstBuilder {
    AstBuilder::new(OWNER)
}

pub fn hierarchy() -> ClassTable {
    let mut table = ClassTable::with_java_lang();
    table.add("java/io/IOException", "java/lang/Exception");
    table.add("java/lang/IllegalStateException", "java/lang/RuntimeException");
    table
}

/// Run flow analysis, returning every reported problem
pub fn analyze(method: &mut MethodDecl) -> ProblemCollector {
    init_tracing();
    let mut problems = ProblemCollector::new();
    analyze_method(method, &hierarchy(), &mut problems);
    problems
}

pub fn kinds(problems: &ProblemCollector) -> Vec<ProblemKind> {
    problems.problems.iter().map(|p| p.kind.clone()).collect()
}

pub fn assert_clean(problems: &ProblemCollector) {
    assert!(problems.problems.is_empty(), "unexpected problems: {:?}", kinds(problems));
}

/// Analyze (which must succeed cleanly) and emit with `config`
pub fn emit_with(method: &mut MethodDecl, config: &Config) -> (MethodCode, ConstantPool) {
    let problems = analyze(method);
    assert!(!problems.has_errors(), "unexpected errors: {:?}", kinds(&problems));
    let mut pool = ConstantPool::new();
    let code = generate_method(method, config, &mut pool).expect("emission failed");
    (code, pool)
}

pub fn emit(method: &mut MethodDecl) -> (MethodCode, ConstantPool) {
    emit_with(method, &Config::default())
}

pub fn ops(code: &MethodCode) -> Vec<&'static str> {
    disasm::mnemonics(&code.code).expect("undecodable code")
}

pub fn count(code: &MethodCode, mnemonic: &str) -> usize {
    ops(code).iter().filter(|m| **m == mnemonic).count()
}

pub fn insns(code: &MethodCode) -> Vec<disasm::Insn> {
    disasm::disassemble(&code.code).expect("undecodable code")
}

pub fn static_call(name: &str, ret: Type) -> MethodRef {
    MethodRef::new(InvokeKind::Static, OWNER, name, &[], ret)
}

pub fn void_call(b: &AstBuilder, name: &str) -> Stmt {
    b.expr_stmt(b.call(static_call(name, Type::Void), vec![]))
}

pub fn int_call(b: &AstBuilder, name: &str) -> Expr {
    b.call(static_call(name, Type::Int), vec![])
}

pub fn bool_call(b: &AstBuilder, name: &str) -> Expr {
    b.call(static_call(name, Type::Boolean), vec![])
}

/// Every statement of `block` in source order, nested ones included
pub fn statements(block: &Block) -> Vec<&Stmt> {
    let mut out = Vec::new();
    collect_block(block, &mut out);
    out
}

fn collect_block<'m>(block: &'m Block, out: &mut Vec<&'m Stmt>) {
    for stmt in &block.stmts {
        collect(stmt, out);
    }
}

fn collect<'m>(stmt: &'m Stmt, out: &mut Vec<&'m Stmt>) {
    out.push(stmt);
    match &stmt.kind {
        StmtKind::Block(block) => collect_block(block, out),
        StmtKind::If(s) => {
            collect(&s.then_branch, out);
            if let Some(e) = &s.else_branch {
                collect(e, out);
            }
        }
        StmtKind::While(w) => collect(&w.body, out),
        StmtKind::DoWhile(d) => collect(&d.body, out),
        StmtKind::For(f) => {
            for init in &f.init {
                collect(init, out);
            }
            collect(&f.body, out);
        }
        StmtKind::ForEach(f) => collect(&f.body, out),
        StmtKind::Labeled(l) => collect(&l.body, out),
        StmtKind::Try(t) => {
            collect_block(&t.body, out);
            for catch in &t.catches {
                collect_block(&catch.body, out);
            }
            if let Some(f) = &t.finally_block {
                collect_block(f, out);
            }
        }
        StmtKind::Synchronized(s) => collect_block(&s.body, out),
        StmtKind::Switch(s) => {
            for stmt in &s.body {
                collect(stmt, out);
            }
        }
        _ => {}
    }
}

/// The first `break` or `continue` in the body
pub fn first_branch(method: &MethodDecl) -> &BranchStmt {
    statements(&method.body)
        .into_iter()
        .find_map(|s| match &s.kind {
            StmtKind::Break(b) | StmtKind::Continue(b) => Some(b),
            _ => None,
        })
        .expect("no break or continue")
}

pub fn first_return(method: &MethodDecl) -> &ReturnStmt {
    statements(&method.body)
        .into_iter()
        .find_map(|s| match &s.kind {
            StmtKind::Return(r) => Some(r),
            _ => None,
        })
        .expect("no return")
}
