//! Problem reporting - the single diagnostics sink of the analysis pass
//!
//! Problems are fire-and-forget: the pass that detects one reports it and keeps
//! going with whatever flow facts it already has.

use crate::ast::Span;
use std::fmt;

/// Problem severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Every language-level problem the core can detect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKind {
    /// `break label` / `continue label` with no enclosing statement of that label
    UndefinedLabel { label: String },
    /// `continue label` where the label does not name a loop
    InvalidContinueTarget { label: String },
    /// Unlabeled `break` outside any loop or switch
    BreakOutsideSwitchOrLoop,
    /// Unlabeled `continue` outside any loop
    ContinueOutsideLoop,
    UnreachableCode,
    UninitializedLocal { name: String },
    FinalLocalAlreadyAssigned { name: String },
    FinalLocalAssignedInLoop { name: String },
    FinalFieldAssignment { name: String },
    MissingReturn,
    VoidMethodReturnsValue,
    MissingReturnValue,
    ReturnInInitializer,
    DuplicateCase { value: String },
    DuplicateDefault,
    NonConstantCaseLabel,
    CaseTypeMismatch { expected: String },
    UnhandledException { class: String },
    UnreachableCatchBlock { class: String },
    CatchAlreadyCaught { class: String },
    FinallyDoesNotCompleteNormally,
}

impl ProblemKind {
    pub fn severity(&self) -> Severity {
        match self {
            ProblemKind::FinallyDoesNotCompleteNormally => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Arguments rendered into the message, in message order
    pub fn arguments(&self) -> Vec<String> {
        match self {
            ProblemKind::UndefinedLabel { label }
            | ProblemKind::InvalidContinueTarget { label } => vec![label.clone()],
            ProblemKind::UninitializedLocal { name }
            | ProblemKind::FinalLocalAlreadyAssigned { name }
            | ProblemKind::FinalLocalAssignedInLoop { name }
            | ProblemKind::FinalFieldAssignment { name } => vec![name.clone()],
            ProblemKind::DuplicateCase { value } => vec![value.clone()],
            ProblemKind::CaseTypeMismatch { expected } => vec![expected.clone()],
            ProblemKind::UnhandledException { class }
            | ProblemKind::UnreachableCatchBlock { class }
            | ProblemKind::CatchAlreadyCaught { class } => vec![class.clone()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemKind::UndefinedLabel { label } => write!(f, "undefined label: {}", label),
            ProblemKind::InvalidContinueTarget { label } => {
                write!(f, "continue cannot be used outside of a loop: {}", label)
            }
            ProblemKind::BreakOutsideSwitchOrLoop => {
                write!(f, "break cannot be used outside of a loop or a switch")
            }
            ProblemKind::ContinueOutsideLoop => {
                write!(f, "continue cannot be used outside of a loop")
            }
            ProblemKind::UnreachableCode => write!(f, "unreachable code"),
            ProblemKind::UninitializedLocal { name } => {
                write!(f, "the local variable {} may not have been initialized", name)
            }
            ProblemKind::FinalLocalAlreadyAssigned { name } => {
                write!(f, "the final local variable {} may already have been assigned", name)
            }
            ProblemKind::FinalLocalAssignedInLoop { name } => {
                write!(f, "the final local variable {} may be assigned in a loop", name)
            }
            ProblemKind::FinalFieldAssignment { name } => {
                write!(f, "the final field {} cannot be assigned", name)
            }
            ProblemKind::MissingReturn => write!(f, "this method must return a result"),
            ProblemKind::VoidMethodReturnsValue => {
                write!(f, "void methods cannot return a value")
            }
            ProblemKind::MissingReturnValue => write!(f, "this method must return a value"),
            ProblemKind::ReturnInInitializer => {
                write!(f, "cannot return from within an initializer")
            }
            ProblemKind::DuplicateCase { value } => write!(f, "duplicate case {}", value),
            ProblemKind::DuplicateDefault => write!(f, "duplicate default case"),
            ProblemKind::NonConstantCaseLabel => {
                write!(f, "case expressions must be constant expressions")
            }
            ProblemKind::CaseTypeMismatch { expected } => {
                write!(f, "case constant is not assignable to {}", expected)
            }
            ProblemKind::UnhandledException { class } => {
                write!(f, "unhandled exception type {}", class)
            }
            ProblemKind::UnreachableCatchBlock { class } => write!(
                f,
                "unreachable catch block for {}: it is never thrown from the try statement body",
                class
            ),
            ProblemKind::CatchAlreadyCaught { class } => write!(
                f,
                "unreachable catch block for {}: it is already handled by a previous catch",
                class
            ),
            ProblemKind::FinallyDoesNotCompleteNormally => {
                write!(f, "finally block does not complete normally")
            }
        }
    }
}

/// A reported problem
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub severity: Severity,
    pub span: Span,
    pub arguments: Vec<String>,
    pub message: String,
}

impl Problem {
    pub fn new(kind: ProblemKind, span: Span) -> Self {
        Self {
            severity: kind.severity(),
            arguments: kind.arguments(),
            message: kind.to_string(),
            kind,
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };
        write!(
            f,
            "{} at line {}, column {}: {}",
            level, self.span.start.line, self.span.start.column, self.message
        )
    }
}

/// Diagnostics sink. Implementations must not block.
pub trait ProblemReporter {
    fn report(&mut self, problem: Problem);
}

/// Reporter that keeps every problem in memory
#[derive(Debug, Default)]
pub struct ProblemCollector {
    pub problems: Vec<Problem>,
}

impl ProblemCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| p.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| !p.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Number of problems matching a predicate on the kind
    pub fn count(&self, pred: impl Fn(&ProblemKind) -> bool) -> usize {
        self.problems.iter().filter(|p| pred(&p.kind)).count()
    }
}

impl ProblemReporter for ProblemCollector {
    fn report(&mut self, problem: Problem) {
        self.problems.push(problem);
    }
}
