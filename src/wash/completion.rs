//! Structural "can complete normally" check
//!
//! Needed before a `try` is analyzed: whether its finally block can return
//! decides whether jumps crossing the `try` ever reach their targets, so the
//! answer has to exist before the body (and its jumps) are visited.

use crate::ast::{Block, Stmt, StmtKind};
use rustc_hash::FxHashSet;

pub fn block_can_complete_normally(block: &Block) -> bool {
    stmts_complete(&block.stmts)
}

fn stmts_complete(stmts: &[Stmt]) -> bool {
    stmts.iter().all(stmt_can_complete_normally)
}

pub fn stmt_can_complete_normally(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Throw(_) | StmtKind::Break(_) | StmtKind::Continue(_) => false,
        StmtKind::Block(block) => block_can_complete_normally(block),
        StmtKind::If(s) => match &s.else_branch {
            Some(else_branch) => {
                stmt_can_complete_normally(&s.then_branch) || stmt_can_complete_normally(else_branch)
            }
            None => true,
        },
        StmtKind::While(w) => w.condition.constant_bool() != Some(true) || exits(&w.body, None),
        StmtKind::For(f) => {
            let forever = match &f.condition {
                None => true,
                Some(cond) => cond.constant_bool() == Some(true),
            };
            !forever || exits(&f.body, None)
        }
        StmtKind::DoWhile(d) => {
            let body_done = stmt_can_complete_normally(&d.body) || continues(&d.body);
            (body_done && d.condition.constant_bool() != Some(true)) || exits(&d.body, None)
        }
        StmtKind::Labeled(l) => stmt_can_complete_normally(&l.body) || exits(&l.body, Some(&l.label)),
        StmtKind::Switch(s) => {
            let has_default = s.body.iter().any(|st| matches!(st.kind, StmtKind::Case(None)));
            let last_completes = s
                .body
                .iter()
                .rposition(|st| matches!(st.kind, StmtKind::Case(_)))
                .map_or(true, |i| stmts_complete(&s.body[i + 1..]));
            !has_default || last_completes || s.body.iter().any(|st| exits(st, None))
        }
        StmtKind::Try(t) => {
            let finally_ok = t
                .finally_block
                .as_ref()
                .map_or(true, block_can_complete_normally);
            let body_or_catch = block_can_complete_normally(&t.body)
                || t.catches.iter().any(|c| block_can_complete_normally(&c.body));
            finally_ok && body_or_catch
        }
        StmtKind::Synchronized(s) => block_can_complete_normally(&s.body),
        _ => true,
    }
}

/// Some `break` inside `stmt` leaves it: unlabeled breaks not captured by a
/// nested loop or switch, or breaks to `label`.
fn exits(stmt: &Stmt, label: Option<&str>) -> bool {
    let mut inner = FxHashSet::default();
    breaks_out(stmt, label, &mut inner, false)
}

fn breaks_out<'a>(stmt: &'a Stmt, label: Option<&str>, inner: &mut FxHashSet<&'a str>, nested: bool) -> bool {
    match &stmt.kind {
        StmtKind::Break(b) => match (&b.label, label) {
            (Some(l), Some(target)) => l == target && !inner.contains(l.as_str()),
            (Some(_), None) => false,
            (None, Some(_)) => false,
            (None, None) => !nested,
        },
        StmtKind::Block(block) => block.stmts.iter().any(|s| breaks_out(s, label, inner, nested)),
        StmtKind::If(s) => {
            breaks_out(&s.then_branch, label, inner, nested)
                || s.else_branch
                    .as_ref()
                    .map_or(false, |e| breaks_out(e, label, inner, nested))
        }
        StmtKind::Labeled(l) => {
            let shadowed = inner.insert(l.label.as_str());
            let found = breaks_out(&l.body, label, inner, nested);
            if shadowed {
                inner.remove(l.label.as_str());
            }
            found
        }
        StmtKind::While(w) => breaks_out(&w.body, label, inner, true),
        StmtKind::DoWhile(d) => breaks_out(&d.body, label, inner, true),
        StmtKind::For(f) => breaks_out(&f.body, label, inner, true),
        StmtKind::ForEach(f) => breaks_out(&f.body, label, inner, true),
        StmtKind::Switch(s) => s.body.iter().any(|st| breaks_out(st, label, inner, true)),
        StmtKind::Try(t) => {
            t.body.stmts.iter().any(|s| breaks_out(s, label, inner, nested))
                || t.catches
                    .iter()
                    .any(|c| c.body.stmts.iter().any(|s| breaks_out(s, label, inner, nested)))
                || t.finally_block
                    .as_ref()
                    .map_or(false, |f| f.stmts.iter().any(|s| breaks_out(s, label, inner, nested)))
        }
        StmtKind::Synchronized(s) => s.body.stmts.iter().any(|st| breaks_out(st, label, inner, nested)),
        _ => false,
    }
}

/// An unlabeled `continue` of the enclosing loop appears in `stmt`
fn continues(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Continue(c) => c.label.is_none(),
        StmtKind::Block(block) => block.stmts.iter().any(continues),
        StmtKind::If(s) => continues(&s.then_branch) || s.else_branch.as_deref().map_or(false, continues),
        StmtKind::Labeled(l) => continues(&l.body),
        StmtKind::Switch(s) => s.body.iter().any(continues),
        StmtKind::Try(t) => {
            t.body.stmts.iter().any(continues)
                || t.catches.iter().any(|c| c.body.stmts.iter().any(continues))
        }
        StmtKind::Synchronized(s) => s.body.stmts.iter().any(continues),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;

    #[test]
    fn jumps_do_not_complete() {
        let b = AstBuilder::new("T");
        assert!(!block_can_complete_normally(&b.block(vec![b.return_value(None)])));
        assert!(!block_can_complete_normally(&b.block(vec![b.break_to(None)])));
        assert!(block_can_complete_normally(&b.block(vec![b.empty()])));
    }

    #[test]
    fn infinite_loop_completes_only_through_break() {
        let b = AstBuilder::new("T");
        let forever = b.while_loop(b.boolean(true), b.block_stmt(vec![b.empty()]));
        assert!(!stmt_can_complete_normally(&forever));

        let with_break = b.while_loop(b.boolean(true), b.block_stmt(vec![b.break_to(None)]));
        assert!(stmt_can_complete_normally(&with_break));

        let nested = b.while_loop(
            b.boolean(true),
            b.while_loop(b.boolean(true), b.break_to(None)),
        );
        assert!(!stmt_can_complete_normally(&nested));
    }

    #[test]
    fn labeled_block_completes_through_its_break() {
        let b = AstBuilder::new("T");
        let stmt = b.labeled("done", b.block_stmt(vec![b.break_to(Some("done")), b.return_value(None)]));
        assert!(stmt_can_complete_normally(&stmt));
    }
}
