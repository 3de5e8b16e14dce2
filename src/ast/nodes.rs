use super::Span;
use crate::common::Type;
use crate::consts::Constant;
use smallvec::SmallVec;

/// Stable identity of a statement within its method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

/// Index of a local variable in [`MethodDecl::locals`]; also its flow bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

impl LocalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// DECLARATIONS
// ============================================================================

#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Internal name (`pkg/Name`)
    pub name: String,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
    /// Instance or static initializer block (`<clinit>` when static)
    Initializer,
}

#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: String,
    pub ty: Type,
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    /// Internal name of the declaring class
    pub owner: String,
    pub name: String,
    pub kind: MethodKind,
    pub is_static: bool,
    pub return_type: Type,
    /// Parameters in declaration order, definitely assigned on entry
    pub params: Vec<LocalId>,
    /// Checked exceptions named in the `throws` clause
    pub throws: Vec<String>,
    /// Every local of the method, parameters included
    pub locals: Vec<LocalVar>,
    pub body: Block,
    pub span: Span,
}

impl MethodDecl {
    pub fn descriptor(&self) -> String {
        let mut desc = String::from("(");
        for param in &self.params {
            desc.push_str(&self.locals[param.index()].ty.descriptor());
        }
        desc.push(')');
        desc.push_str(&self.return_type.descriptor());
        desc
    }

    pub fn local(&self, id: LocalId) -> &LocalVar {
        &self.locals[id.index()]
    }

    /// `owner.name` for diagnostics and traces
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner.replace('/', "."), self.name)
    }
}

// ============================================================================
// STATEMENTS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Locals declared directly in this block; they go out of scope at its end
    pub fn declared_locals(&self) -> impl Iterator<Item = LocalId> + '_ {
        self.stmts.iter().filter_map(|s| match &s.kind {
            StmtKind::LocalDecl(decl) => Some(decl.local),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    /// Cleared by flow analysis when the statement can never execute
    pub reachable: bool,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(id: NodeId, span: Span, kind: StmtKind) -> Self {
        Self {
            id,
            span,
            reachable: true,
            kind,
        }
    }

    /// The statement under any chain of labels
    pub fn concrete(&self) -> &Stmt {
        match &self.kind {
            StmtKind::Labeled(l) => l.body.concrete(),
            _ => self,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::While(_) | StmtKind::DoWhile(_) | StmtKind::For(_) | StmtKind::ForEach(_)
        )
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Block),
    LocalDecl(LocalDeclStmt),
    Expr(Expr),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    ForEach(ForEachStmt),
    Labeled(LabeledStmt),
    Break(BranchStmt),
    Continue(BranchStmt),
    Return(ReturnStmt),
    Throw(ThrowStmt),
    Try(TryStmt),
    Synchronized(SynchronizedStmt),
    Switch(SwitchStmt),
    /// `case value:`; `None` is `default:`
    Case(Option<Expr>),
    Assert(AssertStmt),
    Empty,
}

#[derive(Debug, Clone)]
pub struct LocalDeclStmt {
    pub local: LocalId,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub condition: Expr,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub init: Vec<Stmt>,
    /// Absent condition loops forever
    pub condition: Option<Expr>,
    pub update: Vec<Expr>,
    pub body: Box<Stmt>,
}

impl ForStmt {
    pub fn init_locals(&self) -> impl Iterator<Item = LocalId> + '_ {
        self.init.iter().filter_map(|s| match &s.kind {
            StmtKind::LocalDecl(decl) => Some(decl.local),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ForEachStmt {
    pub var: LocalId,
    pub iterable: Expr,
    pub kind: ForEachKind,
    pub body: Box<Stmt>,
}

/// How a `for (T x : e)` loop walks its source
#[derive(Debug, Clone)]
pub enum ForEachKind {
    /// Index loop over an array of the given element type
    Array { element: Type },
    /// Iterator protocol; methods supplied by the resolver
    Iterable {
        iterator: MethodRef,
        has_next: MethodRef,
        next: MethodRef,
        /// Cast applied to `next()` before the variable store
        element_cast: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct LabeledStmt {
    pub label: String,
    pub body: Box<Stmt>,
}

/// `break` or `continue`
#[derive(Debug, Clone)]
pub struct BranchStmt {
    pub label: Option<String>,
    pub info: BranchInfo,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub info: ReturnInfo,
}

#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub resources: Vec<TryResource>,
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally_block: Option<Block>,
    pub info: TryInfo,
}

impl TryStmt {
    /// Finally present with at least one statement
    pub fn has_finally(&self) -> bool {
        self.finally_block.as_ref().map_or(false, |b| !b.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct TryResource {
    pub local: LocalId,
    pub init: Expr,
    /// `close()` of the resource's static type
    pub close: MethodRef,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: LocalId,
    /// Internal name of the caught class
    pub class: String,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SynchronizedStmt {
    pub lock: Expr,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub selector: Expr,
    /// Flat switch block: `Case` statements interleaved with the rest
    pub body: Vec<Stmt>,
}

impl SwitchStmt {
    pub fn declared_locals(&self) -> impl Iterator<Item = LocalId> + '_ {
        self.body.iter().filter_map(|s| match &s.kind {
            StmtKind::LocalDecl(decl) => Some(decl.local),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AssertStmt {
    pub condition: Expr,
    pub message: Option<Expr>,
}

// ============================================================================
// FLOW ANNOTATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupKind {
    /// Finally block (and resource closing) of a `try`
    Finally,
    /// Monitor exit of a `synchronized`
    MonitorExit,
}

/// One cleanup block a jump has to run on its way out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupRegion {
    /// The `try` or `synchronized` statement owning the cleanup
    pub owner: NodeId,
    pub kind: CleanupKind,
    /// False when the cleanup itself never completes normally
    pub can_return: bool,
}

/// Cleanup regions of a jump, innermost first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupChain {
    pub regions: SmallVec<[CleanupRegion; 2]>,
    /// The last region cannot return, so the jump never reaches its target
    pub escapes: bool,
}

impl CleanupChain {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn has_finally(&self) -> bool {
        self.regions.iter().any(|r| r.kind == CleanupKind::Finally)
    }

    pub fn has_monitor(&self) -> bool {
        self.regions.iter().any(|r| r.kind == CleanupKind::MonitorExit)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchInfo {
    /// Statement whose break or continue label the jump lands on
    pub target: Option<NodeId>,
    pub chain: CleanupChain,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnInfo {
    pub chain: CleanupChain,
    /// Value must be stashed in a local while finally code runs
    pub save_value_needed: bool,
    pub guarded_by_monitor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryInfo {
    pub finally_completes: bool,
}

impl Default for TryInfo {
    fn default() -> Self {
        Self {
            finally_completes: true,
        }
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub constant: Option<Constant>,
    pub conversion: Conversion,
    pub span: Span,
}

impl Expr {
    pub fn constant_bool(&self) -> Option<bool> {
        self.constant.as_ref().and_then(Constant::as_bool)
    }

    /// Type of the value after the implicit conversion
    pub fn result_type(&self) -> Type {
        match &self.conversion {
            Conversion::None => self.ty.clone(),
            Conversion::Primitive { to } => to.clone(),
            Conversion::Boxing(m) | Conversion::Unboxing(m) => m.ret.clone(),
            Conversion::Checkcast(class) => Type::Class(class.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Constant),
    Null,
    This,
    Local(LocalId),
    Assign {
        target: LocalId,
        value: Box<Expr>,
    },
    /// `x += delta` on an int local; value is the updated local
    Increment {
        local: LocalId,
        delta: i16,
    },
    FieldGet {
        field: FieldRef,
        receiver: Option<Box<Expr>>,
    },
    FieldSet {
        field: FieldRef,
        receiver: Option<Box<Expr>>,
        value: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Invoke {
        method: MethodRef,
        receiver: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    New {
        ctor: MethodRef,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Ushr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl CompareOp {
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
        }
    }
}

/// Implicit conversion decided by the binding resolver
#[derive(Debug, Clone, Default)]
pub enum Conversion {
    #[default]
    None,
    /// Widening or narrowing between primitive types
    Primitive { to: Type },
    /// `valueOf` call
    Boxing(MethodRef),
    /// `xxxValue` call
    Unboxing(MethodRef),
    Checkcast(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Static,
    Virtual,
    Special,
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: InvokeKind,
    /// Argument slots, receiver excluded
    pub arg_slots: u16,
    pub ret: Type,
    /// Checked and unchecked exceptions declared by the callee
    pub thrown: Vec<String>,
}

impl MethodRef {
    pub fn new(
        kind: InvokeKind,
        owner: impl Into<String>,
        name: impl Into<String>,
        params: &[Type],
        ret: Type,
    ) -> Self {
        let mut descriptor = String::from("(");
        for p in params {
            descriptor.push_str(&p.descriptor());
        }
        descriptor.push(')');
        descriptor.push_str(&ret.descriptor());
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor,
            kind,
            arg_slots: params.iter().map(Type::width).sum(),
            ret,
            thrown: Vec::new(),
        }
    }

    pub fn throwing(mut self, class: impl Into<String>) -> Self {
        self.thrown.push(class.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
    pub is_final: bool,
}
