mod common;

use common::*;
use tolc_flowgen::ast::*;
use tolc_flowgen::common::{ProblemKind, Type};

fn uninitialized(name: &str) -> ProblemKind {
    ProblemKind::UninitializedLocal { name: name.into() }
}

// Both branches assign: x is definitely assigned after the if
#[test]
fn if_else_both_assign() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.if_else(
            bool_call(&b, "c"),
            b.expr_stmt(b.assign(x, b.int(1))),
            b.expr_stmt(b.assign(x, b.int(2))),
        ),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));
}

#[test]
fn if_without_else_leaves_x_unassigned() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.if_then(bool_call(&b, "c"), b.expr_stmt(b.assign(x, b.int(1)))),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_eq!(kinds(&analyze(&mut m)), vec![uninitialized("x")]);
}

// A branch that jumps away does not weaken the merge
#[test]
fn abrupt_branch_keeps_live_side_facts() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.if_else(
            bool_call(&b, "c"),
            b.expr_stmt(b.assign(x, b.int(1))),
            b.return_value(Some(b.int(0))),
        ),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));
}

// if (b && (x = f()) > 0) use(x) is legal; after the if it is not
#[test]
fn assignment_inside_short_circuit_condition() {
    let b = builder();
    let flag = b.param("flag", Type::Boolean);
    let x = b.local("x", Type::Int);
    let cond = b.and(
        b.load(flag),
        b.compare(CompareOp::Gt, b.assign(x, int_call(&b, "f")), b.int(0)),
    );
    let body = b.block(vec![
        b.declare(x, None),
        b.if_then(cond, b.return_value(Some(b.load(x)))),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    let problems = analyze(&mut m);
    assert_eq!(kinds(&problems), vec![uninitialized("x")]);
    // the only report is the read after the if
    assert_eq!(problems.problems[0].span, first_return_after_if(&m));
}

fn first_return_after_if(m: &MethodDecl) -> tolc_flowgen::ast::Span {
    match &m.body.stmts[2].kind {
        StmtKind::Return(ReturnStmt { value: Some(v), .. }) => v.span,
        _ => panic!("expected a return"),
    }
}

// `||` only reaches its right operand when the left is false
#[test]
fn or_assigns_on_false_branch() {
    let b = builder();
    let flag = b.param("flag", Type::Boolean);
    let x = b.local("x", Type::Int);
    // if (flag || (x = f()) > 0) {} else { use(x) }
    let cond = b.or(
        b.load(flag),
        b.compare(CompareOp::Gt, b.assign(x, int_call(&b, "f")), b.int(0)),
    );
    let body = b.block(vec![
        b.declare(x, None),
        b.if_else(cond, b.empty(), b.return_value(Some(b.load(x)))),
        b.return_value(Some(b.int(0))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));
}

// Zero iterations: an assignment in a while body proves nothing after it
#[test]
fn loop_body_may_not_run() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.while_loop(bool_call(&b, "c"), b.expr_stmt(b.assign(x, b.int(1)))),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_eq!(kinds(&analyze(&mut m)), vec![uninitialized("x")]);
}

// The only way out of while (true) is the break, after the assignment
#[test]
fn infinite_loop_exit_through_break() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.while_loop(
            b.boolean(true),
            b.block_stmt(vec![b.expr_stmt(b.assign(x, b.int(1))), b.break_to(None)]),
        ),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    let problems = analyze(&mut m);
    assert_clean(&problems);
}

// do-while bodies run at least once
#[test]
fn do_while_body_runs_once() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.do_while(b.expr_stmt(b.assign(x, b.int(1))), bool_call(&b, "c")),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));
}

#[test]
fn final_local_assigned_twice() {
    let b = builder();
    let x = b.final_local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.if_then(bool_call(&b, "c"), b.expr_stmt(b.assign(x, b.int(1)))),
        b.expr_stmt(b.assign(x, b.int(2))),
    ]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![ProblemKind::FinalLocalAlreadyAssigned { name: "x".into() }]
    );
}

#[test]
fn final_local_assigned_in_loop() {
    let b = builder();
    let x = b.final_local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.while_loop(bool_call(&b, "c"), b.expr_stmt(b.assign(x, b.int(1)))),
    ]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![ProblemKind::FinalLocalAssignedInLoop { name: "x".into() }]
    );
}

// Assigning in a loop that always breaks right after is fine
#[test]
fn final_local_in_loop_that_breaks() {
    let b = builder();
    let x = b.final_local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.while_loop(
            bool_call(&b, "c"),
            b.block_stmt(vec![b.expr_stmt(b.assign(x, b.int(1))), b.break_to(None)]),
        ),
    ]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));
}

// A catch may run after any prefix of the try block
#[test]
fn try_assignment_is_not_definite_in_catch() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let e = b.local("e", Type::class("java/lang/RuntimeException"));
    let body = b.block(vec![
        b.declare(x, None),
        b.try_stmt(
            vec![],
            b.block(vec![b.expr_stmt(b.assign(x, int_call(&b, "f")))]),
            vec![b.catch(e, "java/lang/RuntimeException", b.block(vec![]))],
            None,
        ),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_eq!(kinds(&analyze(&mut m)), vec![uninitialized("x")]);
}

// What finally assigns is definite after the try statement
#[test]
fn finally_assignment_is_definite_after() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.declare(x, None),
        b.try_stmt(
            vec![],
            b.block(vec![void_call(&b, "work")]),
            vec![],
            Some(b.block(vec![b.expr_stmt(b.assign(x, b.int(1)))])),
        ),
        b.return_value(Some(b.load(x))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));
}

#[test]
fn final_field_outside_constructor() {
    let b = builder();
    let field = FieldRef {
        owner: OWNER.into(),
        name: "limit".into(),
        ty: Type::Int,
        is_static: false,
        is_final: true,
    };
    let body = b.block(vec![b.expr_stmt(b.set_field(field.clone(), None, b.int(3)))]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![ProblemKind::FinalFieldAssignment { name: "limit".into() }]
    );

    let body = b.block(vec![b.expr_stmt(b.set_field(field, None, b.int(3)))]);
    let mut ctor = b.method("<init>", Type::Void, body);
    ctor.kind = MethodKind::Constructor;
    assert_clean(&analyze(&mut ctor));
}

#[test]
fn checked_exceptions_must_be_handled() {
    let b = builder();
    let io = "java/io/IOException";
    let read = static_call("read", Type::Int).throwing(io);
    let body = b.block(vec![b.expr_stmt(b.call(read.clone(), vec![]))]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![ProblemKind::UnhandledException {
            class: "java.io.IOException".into()
        }]
    );

    let body = b.block(vec![b.expr_stmt(b.call(read, vec![]))]);
    let mut declared = b.method("m", Type::Void, body);
    declared.throws.push(io.into());
    assert_clean(&analyze(&mut declared));
}

#[test]
fn catch_clause_checks() {
    let b = builder();
    let e1 = b.local("e1", Type::class("java/io/IOException"));
    let e2 = b.local("e2", Type::class("java/lang/Exception"));
    let e3 = b.local("e3", Type::class("java/lang/IllegalStateException"));
    let body = b.block(vec![b.try_stmt(
        vec![],
        b.block(vec![void_call(&b, "work")]),
        vec![
            b.catch(e1, "java/io/IOException", b.block(vec![])),
            b.catch(e2, "java/lang/Exception", b.block(vec![])),
            b.catch(e3, "java/lang/IllegalStateException", b.block(vec![])),
        ],
        None,
    )]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![
            ProblemKind::UnreachableCatchBlock {
                class: "java.io.IOException".into()
            },
            ProblemKind::CatchAlreadyCaught {
                class: "java.lang.IllegalStateException".into()
            },
        ]
    );
}
