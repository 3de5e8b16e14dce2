mod common;

use common::*;
use tolc_flowgen::ast::*;
use tolc_flowgen::codegen::opcodes::*;
use tolc_flowgen::codegen::disasm::Operand;
use tolc_flowgen::codegen::{ConstantPool, MethodCode, PoolSink};
use tolc_flowgen::common::Type;
use tolc_flowgen::consts::OBJECT;
use tolc_flowgen::Config;

/// pcs of every `invokestatic` of the no-argument void method `name`
fn calls_to(code: &MethodCode, pool: &mut ConstantPool, name: &str) -> Vec<usize> {
    let index = pool.method(OWNER, name, "()V", false).unwrap();
    insns(code)
        .into_iter()
        .filter(|i| i.op == INVOKESTATIC && i.operand == Operand::Pool(index))
        .map(|i| i.pc)
        .collect()
}

fn covered(code: &MethodCode, pc: usize) -> bool {
    code.handlers.iter().any(|h| h.start_pc <= pc && pc < h.end_pc)
}

/// try { if (c()) return; work(); } finally { cleanup(); }
fn early_return_with_finally() -> MethodDecl {
    let b = builder();
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![
            b.if_then(bool_call(&b, "c"), b.return_value(None)),
            void_call(&b, "work"),
        ]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    )]);
    b.method("m", Type::Void, body)
}

#[test]
fn finally_is_inlined_at_every_exit() {
    let mut m = early_return_with_finally();
    let (code, mut pool) = emit(&mut m);
    // the return, the normal exit and the catch-all handler
    let cleanups = calls_to(&code, &mut pool, "cleanup");
    assert_eq!(cleanups.len(), 3);
    assert_eq!(count(&code, "athrow"), 1);
    assert!(!code.fatcode);
}

// Inlined finally code is cut out of the handler ranges
#[test]
fn handler_ranges_skip_inlined_finally() {
    let mut m = early_return_with_finally();
    let (code, mut pool) = emit(&mut m);
    let work = calls_to(&code, &mut pool, "work");
    assert!(covered(&code, work[0]));
    for pc in calls_to(&code, &mut pool, "cleanup") {
        assert!(!covered(&code, pc), "cleanup at {} is guarded:\n{}", pc, code.listing(Some(&pool)).unwrap());
    }
    // the early return splits the try range in two
    assert_eq!(code.handlers.len(), 2);
    assert!(code.handlers.iter().all(|h| h.catch_type.is_none()));
    let handler = code.handlers[0].handler_pc;
    assert!(code.handlers.iter().all(|h| h.handler_pc == handler));
}

#[test]
fn finally_as_subroutine_on_old_targets() {
    let mut m = early_return_with_finally();
    let config = Config::default().with_inline_finally(false).with_target_version(49);
    let (code, mut pool) = emit_with(&mut m, &config);
    assert_eq!(calls_to(&code, &mut pool, "cleanup").len(), 1);
    assert_eq!(count(&code, "jsr"), 3);
    assert_eq!(count(&code, "ret"), 1);

    // every jsr enters the same subroutine, which stores its return address
    let listing = insns(&code);
    let targets: Vec<usize> = listing.iter().filter(|i| i.op == JSR).flat_map(|i| i.targets()).collect();
    assert!(targets.windows(2).all(|w| w[0] == w[1]));
    let entry = listing.iter().find(|i| i.pc == targets[0]).unwrap();
    assert!(entry.mnemonic().starts_with("astore"));
}

// Modern targets inline even when subroutines are asked for
#[test]
fn subroutines_need_an_old_target() {
    let mut m = early_return_with_finally();
    let config = Config::default().with_inline_finally(false);
    let (code, _) = emit_with(&mut m, &config);
    assert_eq!(count(&code, "jsr"), 0);
}

// try { return 1; } finally { cleanup(); } has an empty guarded range
#[test]
fn constant_return_runs_finally_first() {
    let b = builder();
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![b.return_value(Some(b.int(1)))]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    )]);
    let mut m = b.method("m", Type::Int, body);
    let (code, _) = emit(&mut m);
    assert_eq!(ops(&code), vec!["invokestatic", "iconst_1", "ireturn"]);
    assert!(code.handlers.is_empty());
}

#[test]
fn computed_return_is_stashed_across_finally() {
    let b = builder();
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![b.return_value(Some(int_call(&b, "compute")))]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    )]);
    let mut m = b.method("m", Type::Int, body);
    let (code, _) = emit(&mut m);
    let ops = ops(&code);
    assert_eq!(
        &ops[..5],
        &["invokestatic", "istore_1", "invokestatic", "iload_1", "ireturn"]
    );
    // the call and the stash are guarded, the finally copy is not
    assert_eq!(code.handlers.len(), 1);
    assert_eq!((code.handlers[0].start_pc, code.handlers[0].end_pc), (0, 4));
}

#[test]
fn catch_clause_exits_run_the_finally() {
    let b = builder();
    let e = b.local("e", Type::class("java/lang/RuntimeException"));
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![void_call(&b, "work")]),
        vec![b.catch(e, "java/lang/RuntimeException", b.block(vec![void_call(&b, "recover")]))],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    )]);
    let mut m = b.method("m", Type::Void, body);
    let (code, mut pool) = emit(&mut m);
    // normal exit, catch exit, catch-all
    assert_eq!(calls_to(&code, &mut pool, "cleanup").len(), 3);

    let typed: Vec<_> = code.handlers.iter().filter(|h| h.catch_type.is_some()).collect();
    let any: Vec<_> = code.handlers.iter().filter(|h| h.catch_type.is_none()).collect();
    assert_eq!(typed.len(), 1);
    let class = pool.class("java/lang/RuntimeException").unwrap();
    assert_eq!(typed[0].catch_type, Some(class));
    // the catch-all guards the try body and the catch clause
    assert_eq!(any.len(), 2);
    let recover = calls_to(&code, &mut pool, "recover")[0];
    assert!(any.iter().any(|h| h.start_pc <= recover && recover < h.end_pc));
}

// A finally that never completes is reached by goto and never returns
#[test]
fn abrupt_finally_ends_every_path() {
    let b = builder();
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![b.return_value(Some(int_call(&b, "compute")))]),
        vec![],
        Some(b.block(vec![b.return_value(Some(b.int(0)))])),
    )]);
    let mut m = b.method("m", Type::Int, body);
    let (code, _) = emit(&mut m);
    let ops = ops(&code);
    // compute() is evaluated and dropped; the finally's return wins
    assert_eq!(&ops[..4], &["invokestatic", "pop", "iconst_0", "ireturn"]);
    assert_eq!(count(&code, "istore_1"), 0);

    let config = Config::default().with_inline_finally(false).with_target_version(49);
    let (code, _) = emit_with(&mut m, &config);
    assert_eq!(count(&code, "jsr"), 0);
    assert_eq!(count(&code, "ret"), 0);
    assert!(count(&code, "goto") >= 1);
}

#[test]
fn synchronized_releases_the_monitor_on_every_exit() {
    let b = builder();
    let lock = b.param("lock", Type::class(OBJECT));
    let body = b.block(vec![b.synchronized(
        b.load(lock),
        b.block(vec![
            b.if_then(bool_call(&b, "c"), b.return_value(None)),
            void_call(&b, "work"),
        ]),
    )]);
    let mut m = b.method("m", Type::Void, body);
    let (code, _) = emit(&mut m);
    assert_eq!(count(&code, "monitorenter"), 1);
    // return, normal exit, handler
    assert_eq!(count(&code, "monitorexit"), 3);
    for insn in insns(&code).iter().filter(|i| i.op == MONITOREXIT) {
        assert!(!covered(&code, insn.pc));
    }
}

#[test]
fn return_inside_synchronized_keeps_value_on_stack() {
    let b = builder();
    let lock = b.param("lock", Type::class(OBJECT));
    let body = b.block(vec![b.synchronized(
        b.load(lock),
        b.block(vec![b.return_value(Some(int_call(&b, "compute")))]),
    )]);
    let mut m = b.method("m", Type::Int, body);
    let (code, _) = emit(&mut m);
    assert_eq!(
        ops(&code),
        vec![
            "aload_1", "dup", "astore_2", "monitorenter", "invokestatic", "aload_2", "monitorexit", "ireturn",
            "astore_3", "aload_2", "monitorexit", "aload_3", "athrow",
        ]
    );
    assert_eq!(code.handlers.len(), 1);
    assert_eq!((code.handlers[0].start_pc, code.handlers[0].end_pc), (4, 7));
}

// continue outer across two monitors releases the inner one first
#[test]
fn continue_across_monitors_releases_both() {
    let b = builder();
    let a = b.param("a", Type::class(OBJECT));
    let c = b.param("c", Type::class(OBJECT));
    let inner = b.synchronized(b.load(c), b.block(vec![b.continue_to(Some("outer"))]));
    let outer_sync = b.synchronized(b.load(a), b.block(vec![inner]));
    let looping = b.while_loop(bool_call(&b, "more"), b.block_stmt(vec![outer_sync]));
    let body = b.block(vec![b.labeled("outer", looping)]);
    let mut m = b.method("m", Type::Void, body);
    let (code, _) = emit(&mut m);

    // this=0 a=1 c=2, outer monitor in 3, inner monitor in 4
    let listing = insns(&code);
    let jump = listing
        .windows(5)
        .find(|w| w[1].op == MONITOREXIT && w[3].op == MONITOREXIT && w[4].op == GOTO)
        .expect("no double release before the continue");
    assert_eq!((jump[0].op, &jump[0].operand), (ALOAD, &Operand::Local(4)));
    assert_eq!(jump[2].mnemonic(), "aload_3");
    // the continue lands on the back edge to the loop test
    let cont = jump[4].targets()[0];
    let back_edge = listing.iter().find(|i| i.pc == cont).unwrap();
    assert_eq!(back_edge.op, GOTO);
    assert_eq!(back_edge.targets(), vec![0]);
}

#[test]
fn break_out_of_try_in_loop() {
    let b = builder();
    let try_stmt = b.try_stmt(
        vec![],
        b.block(vec![b.if_then(bool_call(&b, "c"), b.break_to(None)), void_call(&b, "work")]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    );
    let looping = b.while_loop(bool_call(&b, "more"), b.block_stmt(vec![try_stmt]));
    let body = b.block(vec![looping, void_call(&b, "after")]);
    let mut m = b.method("m", Type::Void, body);
    let (code, mut pool) = emit(&mut m);
    let cleanups = calls_to(&code, &mut pool, "cleanup");
    assert_eq!(cleanups.len(), 3);
    // the break's copy of the finally is followed by its jump out of the loop
    let after = calls_to(&code, &mut pool, "after")[0];
    let listing = insns(&code);
    let next = listing.iter().find(|i| i.pc > cleanups[0]).unwrap();
    assert_eq!(next.op, GOTO);
    assert_eq!(next.targets(), vec![after]);
}

#[test]
fn resources_are_closed_on_every_exit() {
    let b = builder();
    let res = b.local("r", Type::class("p/Res"));
    let open = MethodRef::new(InvokeKind::Static, OWNER, "open", &[], Type::class("p/Res"));
    let close = MethodRef::new(InvokeKind::Virtual, "p/Res", "close", &[], Type::Void);
    let body = b.block(vec![b.try_stmt(
        vec![TryResource {
            local: res,
            init: b.call(open, vec![]),
            close,
        }],
        b.block(vec![
            b.if_then(bool_call(&b, "c"), b.return_value(None)),
            void_call(&b, "work"),
        ]),
        vec![],
        None,
    )]);
    let mut m = b.method("m", Type::Void, body);
    let (code, _) = emit(&mut m);
    // return, normal exit, resource handler
    assert_eq!(count(&code, "invokevirtual"), 3);
    assert_eq!(count(&code, "ifnull"), 3);
    for insn in insns(&code).iter().filter(|i| i.op == INVOKEVIRTUAL) {
        assert!(!covered(&code, insn.pc));
    }
    assert!(code.handlers.iter().all(|h| h.catch_type.is_none()));
}
