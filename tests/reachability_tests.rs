mod common;

use common::*;
use tolc_flowgen::ast::*;
use tolc_flowgen::common::{ProblemKind, Type};

fn unreachable_count(problems: &tolc_flowgen::common::ProblemCollector) -> usize {
    problems.count(|k| *k == ProblemKind::UnreachableCode)
}

// Everything after a return is one unreachable run, reported once
#[test]
fn code_after_return_reported_once() {
    let b = builder();
    let body = b.block(vec![
        b.return_value(None),
        void_call(&b, "a"),
        void_call(&b, "b"),
    ]);
    let mut m = b.method("m", Type::Void, body);
    let problems = analyze(&mut m);
    assert_eq!(kinds(&problems), vec![ProblemKind::UnreachableCode]);
    assert!(!m.body.stmts[1].reachable);
    assert!(!m.body.stmts[2].reachable);
}

// Unreachable code inside an unreachable block is not reported again
#[test]
fn nested_unreachable_block_reported_once() {
    let b = builder();
    let body = b.block(vec![
        b.throw(b.new_object(
            MethodRef::new(InvokeKind::Special, "java/lang/RuntimeException", "<init>", &[], Type::Void),
            vec![],
        )),
        b.block_stmt(vec![void_call(&b, "a"), b.return_value(None), void_call(&b, "b")]),
    ]);
    let mut m = b.method("m", Type::Void, body);
    let problems = analyze(&mut m);
    assert_eq!(unreachable_count(&problems), 1);
}

// if (false) { ... } is silently dead; if (true) return; does not poison what follows
#[test]
fn constant_if_is_never_an_error() {
    let b = builder();
    let body = b.block(vec![
        b.if_then(b.boolean(false), void_call(&b, "never")),
        b.if_then(b.boolean(true), b.return_value(None)),
        void_call(&b, "after"),
    ]);
    let mut m = b.method("m", Type::Void, body);
    let problems = analyze(&mut m);
    assert_clean(&problems);
    let StmtKind::If(first) = &m.body.stmts[0].kind else { unreachable!() };
    assert!(!first.then_branch.reachable);
    assert!(!m.body.stmts[2].reachable);
}

// while (false) body is an error; while (true) without break ends the block
#[test]
fn constant_loops() {
    let b = builder();
    let body = b.block(vec![b.while_loop(b.boolean(false), void_call(&b, "x"))]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(kinds(&analyze(&mut m)), vec![ProblemKind::UnreachableCode]);

    let b = builder();
    let body = b.block(vec![
        b.for_loop(vec![], None, vec![], b.block_stmt(vec![void_call(&b, "spin")])),
        void_call(&b, "after"),
    ]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(kinds(&analyze(&mut m)), vec![ProblemKind::UnreachableCode]);
}

// A break makes the statement after an infinite loop reachable
#[test]
fn break_reaches_loop_exit() {
    let b = builder();
    let body = b.block(vec![
        b.while_loop(
            b.boolean(true),
            b.block_stmt(vec![b.if_then(bool_call(&b, "done"), b.break_to(None))]),
        ),
        b.return_value(Some(b.int(1))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_clean(&analyze(&mut m));
}

#[test]
fn missing_return_reported_once() {
    let b = builder();
    let body = b.block(vec![b.if_then(bool_call(&b, "c"), b.return_value(Some(b.int(1))))]);
    let mut m = b.method("m", Type::Int, body);
    assert_eq!(kinds(&analyze(&mut m)), vec![ProblemKind::MissingReturn]);
}

// An unresolved break is inert: the code after it is still analyzed normally
#[test]
fn unresolved_targets_are_inert() {
    let b = builder();
    let x = b.local("x", Type::Int);
    let body = b.block(vec![
        b.break_to(None),
        b.continue_to(Some("nowhere")),
        b.declare(x, None),
        b.expr_stmt(b.assign(x, b.load(x))),
    ]);
    let mut m = b.method("m", Type::Void, body);
    let problems = analyze(&mut m);
    assert_eq!(
        kinds(&problems),
        vec![
            ProblemKind::BreakOutsideSwitchOrLoop,
            ProblemKind::UndefinedLabel {
                label: "nowhere".into()
            },
            ProblemKind::UninitializedLocal { name: "x".into() },
        ]
    );
    assert!(first_branch(&m).info.target.is_none());
}

#[test]
fn continue_to_a_block_label() {
    let b = builder();
    let body = b.block(vec![b.labeled(
        "blk",
        b.block_stmt(vec![b.while_loop(bool_call(&b, "c"), b.continue_to(Some("blk")))]),
    )]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![ProblemKind::InvalidContinueTarget { label: "blk".into() }]
    );
}

// a: b: while (c) { continue a; } continues the loop under both labels
#[test]
fn continue_through_stacked_labels() {
    let b = builder();
    let looping = b.while_loop(bool_call(&b, "c"), b.block_stmt(vec![b.continue_to(Some("a"))]));
    let loop_id = looping.id;
    let body = b.block(vec![b.labeled("a", b.labeled("b", looping)), void_call(&b, "after")]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));
    let branch = first_branch(&m);
    assert_eq!(branch.info.target, Some(loop_id));
    assert!(branch.info.chain.is_empty());
    assert!(m.body.stmts[1].reachable);
}

// Duplicate case is reported and the rest of the method is still checked
#[test]
fn duplicate_case_does_not_stop_analysis() {
    let b = builder();
    let y = b.local("y", Type::Int);
    let body = b.block(vec![
        b.switch(
            int_call(&b, "sel"),
            vec![
                b.case(b.int(3)),
                void_call(&b, "a"),
                b.break_to(None),
                b.case(b.int(3)),
                void_call(&b, "b"),
            ],
        ),
        b.declare(y, None),
        b.return_value(Some(b.load(y))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    let problems = analyze(&mut m);
    assert_eq!(
        kinds(&problems),
        vec![
            ProblemKind::DuplicateCase { value: "3".into() },
            ProblemKind::UninitializedLocal { name: "y".into() },
        ]
    );
}

// A finally that always returns is a warning and ends the try statement
#[test]
fn abrupt_finally_warns_and_ends_flow() {
    let b = builder();
    let body = b.block(vec![
        b.try_stmt(
            vec![],
            b.block(vec![void_call(&b, "work")]),
            vec![],
            Some(b.block(vec![b.return_value(Some(b.int(0)))])),
        ),
        void_call(&b, "after"),
    ]);
    let mut m = b.method("m", Type::Int, body);
    let problems = analyze(&mut m);
    assert_eq!(
        kinds(&problems),
        vec![ProblemKind::FinallyDoesNotCompleteNormally, ProblemKind::UnreachableCode]
    );
    assert_eq!(problems.errors().count(), 1);
}

// The first statement after an unreachable case group is still reachable
#[test]
fn case_labels_restore_reachability() {
    let b = builder();
    let body = b.block(vec![b.switch(
        int_call(&b, "sel"),
        vec![
            b.case(b.int(1)),
            b.return_value(None),
            b.case(b.int(2)),
            void_call(&b, "two"),
        ],
    )]);
    let mut m = b.method("m", Type::Void, body);
    assert_clean(&analyze(&mut m));
    let StmtKind::Switch(s) = &m.body.stmts[0].kind else { unreachable!() };
    assert!(s.body[3].reachable);
}

#[test]
fn return_checks() {
    let b = builder();
    let body = b.block(vec![b.if_then(bool_call(&b, "c"), b.return_value(Some(b.int(1)))), b.return_value(None)]);
    let mut m = b.method("m", Type::Void, body);
    assert_eq!(kinds(&analyze(&mut m)), vec![ProblemKind::VoidMethodReturnsValue]);

    let b = builder();
    let body = b.block(vec![b.return_value(None)]);
    let mut m = b.method("init", Type::Void, body);
    m.kind = MethodKind::Initializer;
    assert_eq!(kinds(&analyze(&mut m)), vec![ProblemKind::ReturnInInitializer]);
}

// switch (sel()) { default: a(); default: b(); }
#[test]
fn duplicate_default_does_not_stop_analysis() {
    let b = builder();
    let y = b.local("y", Type::Int);
    let body = b.block(vec![
        b.switch(
            int_call(&b, "sel"),
            vec![b.default_case(), void_call(&b, "a"), b.default_case(), void_call(&b, "b")],
        ),
        b.declare(y, None),
        b.return_value(Some(b.load(y))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![ProblemKind::DuplicateDefault, ProblemKind::UninitializedLocal { name: "y".into() }]
    );
}

#[test]
fn case_label_must_be_constant() {
    let b = builder();
    let x = b.param("x", Type::Int);
    let y = b.local("y", Type::Int);
    let body = b.block(vec![
        b.switch(int_call(&b, "sel"), vec![b.case(b.load(x)), void_call(&b, "a")]),
        b.declare(y, None),
        b.return_value(Some(b.load(y))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![ProblemKind::NonConstantCaseLabel, ProblemKind::UninitializedLocal { name: "y".into() }]
    );
}

// switch on a byte with case 200
#[test]
fn case_label_out_of_selector_range() {
    let b = builder();
    let y = b.local("y", Type::Int);
    let body = b.block(vec![
        b.switch(
            b.call(static_call("sel", Type::Byte), vec![]),
            vec![b.case(b.int(100)), void_call(&b, "a"), b.case(b.int(200)), void_call(&b, "b")],
        ),
        b.declare(y, None),
        b.return_value(Some(b.load(y))),
    ]);
    let mut m = b.method("m", Type::Int, body);
    assert_eq!(
        kinds(&analyze(&mut m)),
        vec![
            ProblemKind::CaseTypeMismatch { expected: "byte".into() },
            ProblemKind::UninitializedLocal { name: "y".into() },
        ]
    );
}
