use thiserror::Error;

/// Result type for flowgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Internal error types for the analysis and emission passes.
///
/// Language-level problems (unreachable code, unassigned locals, ...) are never
/// carried by this type; they go to the [`ProblemReporter`](crate::common::problem::ProblemReporter)
/// and the pass keeps going. An `Error` always means the current method or type
/// cannot be emitted as written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Internal compiler error: {message}")]
    Internal { message: String },

    #[error("Unresolved {kind} target reached code generation")]
    UnresolvedTarget { kind: &'static str },

    #[error("Stack depth mismatch at label {label}: expected {expected}, found {found}")]
    StackDepthMismatch {
        label: usize,
        expected: u16,
        found: u16,
    },

    #[error("Branch offset {offset} does not fit in 16 bits")]
    BranchOffsetOverflow { offset: i64 },

    #[error("Code of method {method} is too large ({size} bytes)")]
    CodeTooLarge { method: String, size: usize },

    #[error("Too many constants in constant pool")]
    PoolOverflow,
}

/// How far an [`Error`] unwinds before compilation of the unit resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortScope {
    /// Replace the current method by a problem method.
    Method,
    /// Replace the whole type by a problem type.
    Type,
}

impl Error {
    /// Create an internal inconsistency error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a code-too-large error for the named method
    pub fn code_too_large(method: impl Into<String>, size: usize) -> Self {
        Self::CodeTooLarge {
            method: method.into(),
            size,
        }
    }

    /// Boundary at which this error is caught and isolated.
    pub fn abort_scope(&self) -> AbortScope {
        match self {
            Error::PoolOverflow => AbortScope::Type,
            _ => AbortScope::Method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_overflow_aborts_the_type() {
        assert_eq!(Error::PoolOverflow.abort_scope(), AbortScope::Type);
        assert_eq!(Error::internal("x").abort_scope(), AbortScope::Method);
        assert_eq!(
            Error::code_too_large("m", 70_000).abort_scope(),
            AbortScope::Method
        );
    }

    #[test]
    fn messages_name_the_failure() {
        let err = Error::StackDepthMismatch {
            label: 3,
            expected: 1,
            found: 0,
        };
        assert!(err.to_string().contains("label 3"));
    }
}
