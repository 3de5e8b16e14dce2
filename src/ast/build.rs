//! Programmatic tree construction
//!
//! The parser and binding resolver are external; drivers and tests that need a
//! resolved tree build one with [`AstBuilder`]. The builder hands out fresh node
//! ids and one source line per node, and folds the constant expressions the
//! resolver would fold (int arithmetic, comparisons and boolean logic).

use super::*;
use crate::common::Type;
use crate::consts::Constant;
use std::cell::{Cell, RefCell};

pub struct AstBuilder {
    owner: String,
    next_id: Cell<u32>,
    line: Cell<usize>,
    locals: RefCell<Vec<LocalVar>>,
    params: RefCell<Vec<LocalId>>,
}

impl AstBuilder {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            next_id: Cell::new(0),
            line: Cell::new(0),
            locals: RefCell::new(Vec::new()),
            params: RefCell::new(Vec::new()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn next_span(&self) -> Span {
        let line = self.line.get() + 1;
        self.line.set(line);
        Span::line(line)
    }

    fn next_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    // ========================================================================
    // LOCALS
    // ========================================================================

    fn add_local(&self, name: &str, ty: Type, is_final: bool) -> LocalId {
        let mut locals = self.locals.borrow_mut();
        locals.push(LocalVar {
            name: name.to_string(),
            ty,
            is_final,
        });
        LocalId((locals.len() - 1) as u32)
    }

    pub fn local(&self, name: &str, ty: Type) -> LocalId {
        self.add_local(name, ty, false)
    }

    pub fn final_local(&self, name: &str, ty: Type) -> LocalId {
        self.add_local(name, ty, true)
    }

    pub fn param(&self, name: &str, ty: Type) -> LocalId {
        let id = self.add_local(name, ty, false);
        self.params.borrow_mut().push(id);
        id
    }

    fn local_type(&self, local: LocalId) -> Type {
        self.locals
            .borrow()
            .get(local.index())
            .map(|l| l.ty.clone())
            .unwrap_or(Type::Int)
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    pub fn expr(&self, kind: ExprKind, ty: Type, constant: Option<Constant>) -> Expr {
        Expr {
            kind,
            ty,
            constant,
            conversion: Conversion::None,
            span: Span::line(self.line.get() + 1),
        }
    }

    pub fn literal(&self, value: Constant) -> Expr {
        let ty = match &value {
            Constant::Int(_) => Type::Int,
            Constant::Long(_) => Type::Long,
            Constant::Float(_) => Type::Float,
            Constant::Double(_) => Type::Double,
            Constant::Boolean(_) => Type::Boolean,
            Constant::Char(_) => Type::Char,
            Constant::String(_) => Type::string(),
        };
        self.expr(ExprKind::Literal(value.clone()), ty, Some(value))
    }

    pub fn int(&self, value: i32) -> Expr {
        self.literal(Constant::Int(value))
    }

    pub fn long(&self, value: i64) -> Expr {
        self.literal(Constant::Long(value))
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.literal(Constant::Boolean(value))
    }

    pub fn character(&self, value: char) -> Expr {
        self.literal(Constant::Char(value as u16))
    }

    pub fn string(&self, value: &str) -> Expr {
        self.literal(Constant::String(value.to_string()))
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Null, Type::Null, None)
    }

    pub fn this(&self) -> Expr {
        self.expr(ExprKind::This, Type::Class(self.owner.clone()), None)
    }

    pub fn load(&self, local: LocalId) -> Expr {
        self.expr(ExprKind::Local(local), self.local_type(local), None)
    }

    pub fn assign(&self, target: LocalId, value: Expr) -> Expr {
        let ty = self.local_type(target);
        self.expr(
            ExprKind::Assign {
                target,
                value: Box::new(value),
            },
            ty,
            None,
        )
    }

    pub fn increment(&self, local: LocalId, delta: i16) -> Expr {
        self.expr(ExprKind::Increment { local, delta }, Type::Int, None)
    }

    pub fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let constant = match (&lhs.constant, &rhs.constant) {
            (Some(Constant::Int(a)), Some(Constant::Int(b))) => fold_int(op, *a, *b).map(Constant::Int),
            _ => None,
        };
        let ty = lhs.ty.clone();
        self.expr(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            constant,
        )
    }

    pub fn compare(&self, op: CompareOp, lhs: Expr, rhs: Expr) -> Expr {
        let constant = match (
            lhs.constant.as_ref().and_then(Constant::as_int),
            rhs.constant.as_ref().and_then(Constant::as_int),
        ) {
            (Some(a), Some(b)) => Some(Constant::Boolean(match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Lt => a < b,
                CompareOp::Ge => a >= b,
                CompareOp::Gt => a > b,
                CompareOp::Le => a <= b,
            })),
            _ => None,
        };
        self.expr(
            ExprKind::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Type::Boolean,
            constant,
        )
    }

    pub fn and(&self, lhs: Expr, rhs: Expr) -> Expr {
        let constant = match (lhs.constant_bool(), rhs.constant_bool()) {
            (Some(a), Some(b)) => Some(Constant::Boolean(a && b)),
            _ => None,
        };
        self.expr(ExprKind::And(Box::new(lhs), Box::new(rhs)), Type::Boolean, constant)
    }

    pub fn or(&self, lhs: Expr, rhs: Expr) -> Expr {
        let constant = match (lhs.constant_bool(), rhs.constant_bool()) {
            (Some(a), Some(b)) => Some(Constant::Boolean(a || b)),
            _ => None,
        };
        self.expr(ExprKind::Or(Box::new(lhs), Box::new(rhs)), Type::Boolean, constant)
    }

    pub fn not(&self, operand: Expr) -> Expr {
        let constant = operand.constant_bool().map(|b| Constant::Boolean(!b));
        self.expr(ExprKind::Not(Box::new(operand)), Type::Boolean, constant)
    }

    /// Static call
    pub fn call(&self, method: MethodRef, args: Vec<Expr>) -> Expr {
        let ty = method.ret.clone();
        self.expr(
            ExprKind::Invoke {
                method,
                receiver: None,
                args,
            },
            ty,
            None,
        )
    }

    pub fn call_on(&self, method: MethodRef, receiver: Expr, args: Vec<Expr>) -> Expr {
        let ty = method.ret.clone();
        self.expr(
            ExprKind::Invoke {
                method,
                receiver: Some(Box::new(receiver)),
                args,
            },
            ty,
            None,
        )
    }

    pub fn new_object(&self, ctor: MethodRef, args: Vec<Expr>) -> Expr {
        let ty = Type::Class(ctor.owner.clone());
        self.expr(ExprKind::New { ctor, args }, ty, None)
    }

    pub fn get_field(&self, field: FieldRef, receiver: Option<Expr>) -> Expr {
        let ty = field.ty.clone();
        self.expr(
            ExprKind::FieldGet {
                field,
                receiver: receiver.map(Box::new),
            },
            ty,
            None,
        )
    }

    pub fn set_field(&self, field: FieldRef, receiver: Option<Expr>, value: Expr) -> Expr {
        let ty = field.ty.clone();
        self.expr(
            ExprKind::FieldSet {
                field,
                receiver: receiver.map(Box::new),
                value: Box::new(value),
            },
            ty,
            None,
        )
    }

    /// Attach the conversion the resolver would have decided on
    pub fn convert(&self, mut expr: Expr, conversion: Conversion) -> Expr {
        expr.conversion = conversion;
        expr
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    pub fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt::new(self.next_id(), self.next_span(), kind)
    }

    pub fn block(&self, stmts: Vec<Stmt>) -> Block {
        Block {
            stmts,
            span: self.next_span(),
        }
    }

    pub fn block_stmt(&self, stmts: Vec<Stmt>) -> Stmt {
        let block = self.block(stmts);
        self.stmt(StmtKind::Block(block))
    }

    pub fn declare(&self, local: LocalId, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::LocalDecl(LocalDeclStmt { local, init }))
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn if_then(&self, condition: Expr, then_branch: Stmt) -> Stmt {
        self.stmt(StmtKind::If(IfStmt {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: None,
        }))
    }

    pub fn if_else(&self, condition: Expr, then_branch: Stmt, else_branch: Stmt) -> Stmt {
        self.stmt(StmtKind::If(IfStmt {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        }))
    }

    pub fn while_loop(&self, condition: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While(WhileStmt {
            condition,
            body: Box::new(body),
        }))
    }

    pub fn do_while(&self, body: Stmt, condition: Expr) -> Stmt {
        self.stmt(StmtKind::DoWhile(DoWhileStmt {
            body: Box::new(body),
            condition,
        }))
    }

    pub fn for_loop(
        &self,
        init: Vec<Stmt>,
        condition: Option<Expr>,
        update: Vec<Expr>,
        body: Stmt,
    ) -> Stmt {
        self.stmt(StmtKind::For(ForStmt {
            init,
            condition,
            update,
            body: Box::new(body),
        }))
    }

    pub fn for_each(&self, var: LocalId, iterable: Expr, kind: ForEachKind, body: Stmt) -> Stmt {
        self.stmt(StmtKind::ForEach(ForEachStmt {
            var,
            iterable,
            kind,
            body: Box::new(body),
        }))
    }

    pub fn labeled(&self, label: &str, body: Stmt) -> Stmt {
        self.stmt(StmtKind::Labeled(LabeledStmt {
            label: label.to_string(),
            body: Box::new(body),
        }))
    }

    pub fn break_to(&self, label: Option<&str>) -> Stmt {
        self.stmt(StmtKind::Break(BranchStmt {
            label: label.map(str::to_string),
            info: BranchInfo::default(),
        }))
    }

    pub fn continue_to(&self, label: Option<&str>) -> Stmt {
        self.stmt(StmtKind::Continue(BranchStmt {
            label: label.map(str::to_string),
            info: BranchInfo::default(),
        }))
    }

    pub fn return_value(&self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(ReturnStmt {
            value,
            info: ReturnInfo::default(),
        }))
    }

    pub fn throw(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Throw(ThrowStmt { expr }))
    }

    pub fn try_stmt(
        &self,
        resources: Vec<TryResource>,
        body: Block,
        catches: Vec<CatchClause>,
        finally_block: Option<Block>,
    ) -> Stmt {
        self.stmt(StmtKind::Try(TryStmt {
            resources,
            body,
            catches,
            finally_block,
            info: TryInfo::default(),
        }))
    }

    pub fn catch(&self, param: LocalId, class: &str, body: Block) -> CatchClause {
        CatchClause {
            param,
            class: class.to_string(),
            body,
            span: self.next_span(),
        }
    }

    pub fn synchronized(&self, lock: Expr, body: Block) -> Stmt {
        self.stmt(StmtKind::Synchronized(SynchronizedStmt { lock, body }))
    }

    pub fn switch(&self, selector: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Switch(SwitchStmt { selector, body }))
    }

    pub fn case(&self, value: Expr) -> Stmt {
        self.stmt(StmtKind::Case(Some(value)))
    }

    pub fn default_case(&self) -> Stmt {
        self.stmt(StmtKind::Case(None))
    }

    pub fn assert(&self, condition: Expr, message: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Assert(AssertStmt { condition, message }))
    }

    pub fn empty(&self) -> Stmt {
        self.stmt(StmtKind::Empty)
    }

    // ========================================================================
    // DECLARATIONS
    // ========================================================================

    /// Instance method; takes every local and parameter declared so far
    pub fn method(&self, name: &str, return_type: Type, body: Block) -> MethodDecl {
        MethodDecl {
            owner: self.owner.clone(),
            name: name.to_string(),
            kind: MethodKind::Method,
            is_static: false,
            return_type,
            params: self.params.take(),
            throws: Vec::new(),
            locals: self.locals.take(),
            body,
            span: self.next_span(),
        }
    }

    pub fn type_decl(&self, methods: Vec<MethodDecl>) -> TypeDecl {
        TypeDecl {
            name: self.owner.clone(),
            methods,
            span: self.next_span(),
        }
    }
}

fn fold_int(op: BinaryOp, a: i32, b: i32) -> Option<i32> {
    Some(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => a.checked_div(b)?,
        BinaryOp::Rem => a.checked_rem(b)?,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl(b as u32),
        BinaryOp::Shr => a.wrapping_shr(b as u32),
        BinaryOp::Ushr => ((a as u32).wrapping_shr(b as u32)) as i32,
    })
}
