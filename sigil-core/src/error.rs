//! Error types for expression construction and backend dispatch.
//!
//! Two layers exist on purpose. [`BackendError`] is the typed refusal a
//! backend returns when it cannot handle an input; the dispatch loops in
//! [`crate::engine::Engine`] catch it and fall through to the next backend.
//! [`SigilError`] is everything surfaced to callers: construction failures,
//! unsatisfiable constraint sets, solver timeouts, and the "every backend
//! refused" terminal case.

use thiserror::Error;

/// A backend's typed refusal to handle an input or operation.
///
/// This is expected control flow inside the dispatch chain and is only
/// surfaced to callers once every backend in the chain has refused.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend does not implement the requested operation or cannot
    /// work with the given operands.
    #[error("backend cannot handle this input: {0}")]
    Unsupported(&'static str),
    /// The backend was handed a value of a type it does not model at all.
    #[error("unexpected input type: {0}")]
    UnexpectedType(String),
}

/// Result alias for backend capability calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors surfaced by expression construction and solving.
#[derive(Debug, Error)]
pub enum SigilError {
    /// Operand bit-widths are inconsistent or cannot be determined.
    #[error("size inference failed: {0}")]
    SizeInference(String),
    /// An operand has the wrong sort for the operation.
    #[error("type error: {0}")]
    Type(String),
    /// The operation itself is malformed (bad arity, bad arguments).
    #[error("invalid operation: {0}")]
    Operation(String),
    /// A contract violation on an expression, e.g. splitting a tree that
    /// was not abstracted with the requested split boundary.
    #[error("expression error: {0}")]
    Expression(String),
    /// Every backend in the dispatch chain refused the input.
    #[error("no backend can handle this: {0}")]
    NoBackend(String),
    /// The constraint set admits no solution. This is an expected outcome
    /// of model extraction, distinct from any backend failure.
    #[error("constraints are unsatisfiable")]
    Unsat,
    /// The solver gave up without an answer, e.g. on timeout. Distinct
    /// from unsatisfiability.
    #[error("solver returned unknown: {0}")]
    Unknown(String),
    /// A backend refusal that propagated out of a non-dispatch context.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, SigilError>;

impl SigilError {
    /// True if this error is the unsatisfiable-constraints signal.
    #[must_use]
    pub fn is_unsat(&self) -> bool {
        matches!(self, SigilError::Unsat)
    }

    /// True if this error is the unknown/timeout signal.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, SigilError::Unknown(_))
    }
}
