//! Runtime faults.
//!
//! `EvalErrorKind` is the structured category hosts match on; factory
//! functions (`name_not_found()`, `unsupported()`, ...) are the public way to
//! build errors and fill both `kind` and `message`.
//!
//! Early return and loop break are not errors and never travel through this
//! type.

use std::fmt;

use warden_sandbox::SandboxError;

use crate::Value;

/// Result of evaluating anything that yields a value.
pub type EvalResult = Result<Value, EvalError>;

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    // Access
    NameNotFound {
        name: String,
    },
    ClassNotAllowed {
        name: String,
    },
    MemberNotAllowed {
        owner: String,
        member: String,
    },

    // Type
    TypeMismatch {
        expected: String,
        got: String,
    },
    NoSuchMethod {
        method: String,
        type_name: String,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    // Containers
    Unsupported {
        operation: String,
    },
    IndexOutOfRange {
        index: i64,
        len: usize,
    },

    // Arithmetic
    DivisionByZero,
    IntegerOverflow {
        operation: String,
    },

    // Liveness
    ExecutionCancelled,
    DeadlineExceeded,
    MemoryLimitExceeded {
        used: i64,
        limit: i64,
    },
    IterationLimitExceeded {
        limit: u64,
    },

    Custom {
        message: String,
    },
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameNotFound { name } => write!(f, "unresolvable name: {name}"),
            Self::ClassNotAllowed { name } => write!(f, "class not allowed: {name}"),
            Self::MemberNotAllowed { owner, member } => {
                write!(f, "member `{member}` of `{owner}` is not allowed")
            }
            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, found {got}")
            }
            Self::NoSuchMethod { method, type_name } => {
                write!(f, "no method `{method}` on {type_name}")
            }
            Self::ArityMismatch {
                name,
                expected,
                got,
            } => write!(f, "`{name}` expects {expected} arguments, got {got}"),
            Self::Unsupported { operation } => {
                write!(f, "unsupported operation on read-only view: {operation}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::DivisionByZero => f.write_str("division by zero"),
            Self::IntegerOverflow { operation } => write!(f, "integer overflow in {operation}"),
            Self::ExecutionCancelled => f.write_str("execution cancelled"),
            Self::DeadlineExceeded => f.write_str("execution deadline exceeded"),
            Self::MemoryLimitExceeded { used, limit } => {
                write!(f, "memory limit exceeded: {used} of {limit}")
            }
            Self::IterationLimitExceeded { limit } => {
                write!(f, "iteration limit of {limit} exceeded")
            }
            Self::Custom { message } => f.write_str(message),
        }
    }
}

/// Evaluation error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Human-readable message; equals `kind.to_string()` for factory-made
    /// errors.
    pub message: String,
}

impl EvalError {
    /// Error with a free-form message (`Custom` kind).
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        EvalError {
            kind: EvalErrorKind::Custom {
                message: message.clone(),
            },
            message,
        }
    }

    pub fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        EvalError { kind, message }
    }

    /// Liveness faults stop the whole evaluation and are never recovered
    /// from inside a program.
    pub fn is_liveness(&self) -> bool {
        matches!(
            self.kind,
            EvalErrorKind::ExecutionCancelled
                | EvalErrorKind::DeadlineExceeded
                | EvalErrorKind::MemoryLimitExceeded { .. }
                | EvalErrorKind::IterationLimitExceeded { .. }
        )
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<SandboxError> for EvalError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::ClassNotAllowed { name } | SandboxError::InvalidName { name } => {
                class_not_allowed(&name)
            }
            SandboxError::MemberNotAllowed { owner, member } => {
                EvalError::from_kind(EvalErrorKind::MemberNotAllowed { owner, member })
            }
        }
    }
}

// Access

#[cold]
pub fn name_not_found(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NameNotFound {
        name: name.to_string(),
    })
}

#[cold]
pub fn class_not_allowed(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ClassNotAllowed {
        name: name.to_string(),
    })
}

// Type

#[cold]
pub fn type_mismatch(expected: &str, got: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    })
}

#[cold]
pub fn no_such_method(method: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoSuchMethod {
        method: method.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn wrong_arg_count(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        name: name.to_string(),
        expected,
        got,
    })
}

// Containers

/// Mutation attempted through a read-only view.
#[cold]
pub fn unsupported(operation: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Unsupported {
        operation: operation.to_string(),
    })
}

#[cold]
pub fn index_out_of_range(index: i64, len: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfRange { index, len })
}

// Arithmetic

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

#[cold]
pub fn integer_overflow(operation: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IntegerOverflow {
        operation: operation.to_string(),
    })
}

// Liveness

#[cold]
pub fn execution_cancelled() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ExecutionCancelled)
}

#[cold]
pub fn deadline_exceeded() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DeadlineExceeded)
}

#[cold]
pub fn memory_limit_exceeded(used: i64, limit: i64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MemoryLimitExceeded { used, limit })
}

#[cold]
pub fn iteration_limit_exceeded(limit: u64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IterationLimitExceeded { limit })
}
