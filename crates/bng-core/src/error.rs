//! Unified error types for the BNG engine.
//!
//! Domain-specific error types (solver, metric import) live next to their
//! algorithms; they convert into [`BngError`] for uniform handling at API
//! boundaries. All errors are returned as values, never by unwinding.

use thiserror::Error;

/// Unified error type for BNG operations.
#[derive(Error, Debug)]
pub enum BngError {
    /// Reference tables missing, empty, or internally inconsistent.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Parsing/deserialization errors.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Allocation solver errors.
    #[error("Solver error: {0}")]
    Solver(String),

    /// Input validation errors outside the reference tables.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors (for wrapping external errors).
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using BngError.
pub type BngResult<T> = Result<T, BngError>;

impl From<anyhow::Error> for BngError {
    fn from(err: anyhow::Error) -> Self {
        BngError::Other(err.to_string())
    }
}

impl From<String> for BngError {
    fn from(s: String) -> Self {
        BngError::Other(s)
    }
}

impl From<&str> for BngError {
    fn from(s: &str) -> Self {
        BngError::Other(s.to_string())
    }
}

/// Reference-table validation failure. Carries every problem found, not just
/// the first, so a collaborator can render the full list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid reference tables: {}", problems.join("; "))]
pub struct ConfigError {
    pub problems: Vec<String>,
}

impl ConfigError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    pub fn single(problem: impl Into<String>) -> Self {
        Self { problems: vec![problem.into()] }
    }
}
