mod common;

use common::*;
use tolc_flowgen::ast::*;
use tolc_flowgen::common::Type;
use tolc_flowgen::consts::OBJECT;

fn throw_runtime(b: &AstBuilder) -> Stmt {
    b.throw(b.new_object(
        MethodRef::new(InvokeKind::Special, "java/lang/RuntimeException", "<init>", &[], Type::Void),
        vec![],
    ))
}

fn owners(chain: &CleanupChain) -> Vec<NodeId> {
    chain.regions.iter().map(|r| r.owner).collect()
}

// for (;;) { if (c) break; } inside try/finally crosses nothing: the loop is inside
#[test]
fn break_inside_try_targets_the_loop() {
    let b = builder();
    let looping = b.for_loop(
        vec![],
        None,
        vec![],
        b.block_stmt(vec![b.if_then(bool_call(&b, "c"), b.break_to(None))]),
    );
    let loop_id = looping.id;
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![looping]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    )]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));
    let branch = first_branch(&m);
    assert_eq!(branch.info.target, Some(loop_id));
    assert!(branch.info.chain.is_empty());
}

// A break leaving the try crosses its finally once
#[test]
fn break_out_of_try_crosses_finally() {
    let b = builder();
    let try_stmt = b.try_stmt(
        vec![],
        b.block(vec![b.if_then(bool_call(&b, "c"), b.break_to(None))]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    );
    let try_id = try_stmt.id;
    let looping = b.while_loop(bool_call(&b, "more"), b.block_stmt(vec![try_stmt]));
    let loop_id = looping.id;
    let body = b.block(vec![looping]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));

    let branch = first_branch(&m);
    assert_eq!(branch.info.target, Some(loop_id));
    assert_eq!(owners(&branch.info.chain), vec![try_id]);
    let region = branch.info.chain.regions[0];
    assert_eq!(region.kind, CleanupKind::Finally);
    assert!(region.can_return);
    assert!(!branch.info.chain.escapes);
}

// A labeled break out of a switch resolves to the labeled statement
#[test]
fn labeled_break_out_of_switch() {
    let b = builder();
    let labeled = b.labeled(
        "out",
        b.switch(
            int_call(&b, "sel"),
            vec![b.case(b.int(1)), b.break_to(Some("out")), b.default_case(), void_call(&b, "other")],
        ),
    );
    let labeled_id = labeled.id;
    let body = b.block(vec![labeled]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));
    let branch = first_branch(&m);
    assert_eq!(branch.info.target, Some(labeled_id));
    assert!(branch.info.chain.is_empty());
}

// Constant results are pushed after the finally runs, nothing to stash
#[test]
fn constant_return_through_finally() {
    let b = builder();
    let try_stmt = b.try_stmt(
        vec![],
        b.block(vec![b.return_value(Some(b.int(1)))]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    );
    let try_id = try_stmt.id;
    let body = b.block(vec![try_stmt]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));

    let ret = first_return(&m);
    assert_eq!(owners(&ret.info.chain), vec![try_id]);
    assert!(!ret.info.save_value_needed);
    assert!(!ret.info.guarded_by_monitor);
}

#[test]
fn computed_return_through_finally_is_saved() {
    let b = builder();
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![b.return_value(Some(int_call(&b, "compute")))]),
        vec![],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    )]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));
    assert!(first_return(&m).info.save_value_needed);
}

// Only a finally forces the save; a monitor exit leaves the value on the stack
#[test]
fn return_inside_synchronized() {
    let b = builder();
    let lock = b.param("lock", Type::class(OBJECT));
    let body = b.block(vec![b.synchronized(
        b.load(lock),
        b.block(vec![b.return_value(Some(int_call(&b, "compute")))]),
    )]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));

    let ret = first_return(&m);
    assert_eq!(ret.info.chain.len(), 1);
    assert_eq!(ret.info.chain.regions[0].kind, CleanupKind::MonitorExit);
    assert!(ret.info.guarded_by_monitor);
    assert!(!ret.info.save_value_needed);
}

// continue outer across two monitors releases both, innermost first
#[test]
fn continue_across_nested_monitors() {
    let b = builder();
    let a = b.param("a", Type::class(OBJECT));
    let c = b.param("c", Type::class(OBJECT));
    let inner = b.synchronized(b.load(c), b.block(vec![b.continue_to(Some("outer"))]));
    let inner_id = inner.id;
    let outer_sync = b.synchronized(b.load(a), b.block(vec![inner]));
    let outer_id = outer_sync.id;
    let looping = b.while_loop(bool_call(&b, "more"), b.block_stmt(vec![outer_sync]));
    let loop_id = looping.id;
    let body = b.block(vec![b.labeled("outer", looping)]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));

    let branch = first_branch(&m);
    assert_eq!(branch.info.target, Some(loop_id));
    assert_eq!(owners(&branch.info.chain), vec![inner_id, outer_id]);
    assert!(branch
        .info
        .chain
        .regions
        .iter()
        .all(|r| r.kind == CleanupKind::MonitorExit && r.can_return));
    assert!(!branch.info.chain.escapes);
}

// A finally that always throws ends the chain; the jump never arrives
#[test]
fn non_returning_finally_escapes() {
    let b = builder();
    let outer_try = b.try_stmt(
        vec![],
        b.block(vec![b.break_to(None)]),
        vec![],
        Some(b.block(vec![throw_runtime(&b)])),
    );
    let try_id = outer_try.id;
    let looping = b.while_loop(bool_call(&b, "more"), b.block_stmt(vec![outer_try]));
    let body = b.block(vec![looping, void_call(&b, "after")]);
    let mut m = b.method("m", Type::Void, body);
    let problems = analyze(&mut m);
    assert!(!problems.has_errors());

    let branch = first_branch(&m);
    assert_eq!(owners(&branch.info.chain), vec![try_id]);
    assert!(!branch.info.chain.regions[0].can_return);
    assert!(branch.info.chain.escapes);
    // the loop still exits through its condition
    assert!(m.body.stmts[1].reachable);
}

// Regions outside the non-returning one are never listed
#[test]
fn chain_stops_at_escaping_region() {
    let b = builder();
    let lock = b.param("lock", Type::class(OBJECT));
    let inner_try = b.try_stmt(
        vec![],
        b.block(vec![b.return_value(None)]),
        vec![],
        Some(b.block(vec![throw_runtime(&b)])),
    );
    let try_id = inner_try.id;
    let body = b.block(vec![b.synchronized(b.load(lock), b.block(vec![inner_try]))]);
    let mut m = b.method("m", Type::Void, body);
    analyze(&mut m);

    let ret = first_return(&m);
    assert_eq!(owners(&ret.info.chain), vec![try_id]);
    assert!(ret.info.chain.escapes);
    assert!(!ret.info.guarded_by_monitor);
}

// A return from a catch clause runs the finally of its own try
#[test]
fn return_from_catch_crosses_finally() {
    let b = builder();
    let e = b.local("e", Type::class("java/lang/RuntimeException"));
    let try_stmt = b.try_stmt(
        vec![],
        b.block(vec![void_call(&b, "work")]),
        vec![b.catch(e, "java/lang/RuntimeException", b.block(vec![b.return_value(None)]))],
        Some(b.block(vec![void_call(&b, "cleanup")])),
    );
    let try_id = try_stmt.id;
    let body = b.block(vec![try_stmt]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));
    assert_eq!(owners(&first_return(&m).info.chain), vec![try_id]);
}

// A try without finally or resources owns no region
#[test]
fn plain_try_adds_no_region() {
    let b = builder();
    let e = b.local("e", Type::class("java/lang/RuntimeException"));
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![b.return_value(None)]),
        vec![b.catch(e, "java/lang/RuntimeException", b.block(vec![]))],
        None,
    )]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));
    assert!(first_return(&m).info.chain.is_empty());
}
