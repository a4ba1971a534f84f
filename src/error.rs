use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Unsupported,
    Io,
    Internal,
}

/// Structural or I/O failure. These abort a batch; sequence-level
/// optimization failures are reported through `OptimizationError` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomesticationError {
    pub code: ErrorCode,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, DomesticationError>;

impl DomesticationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unsupported, message)
    }
}

impl fmt::Display for DomesticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for DomesticationError {}

impl From<std::io::Error> for DomesticationError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, err.to_string())
    }
}

impl From<csv::Error> for DomesticationError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) => Self::new(ErrorCode::Io, err.to_string()),
            _ => Self::new(ErrorCode::InvalidInput, err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomesticationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::InvalidInput, err.to_string())
    }
}

impl From<zip::result::ZipError> for DomesticationError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::new(ErrorCode::Io, format!("Archive error: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationErrorKind {
    /// No candidate edit reduces the constraint breaches any further
    Unsatisfiable,
    /// Every position of a breach is frozen by the problem
    NoMutationSpace,
    BudgetExhausted,
}

/// Raised by an optimization engine. The driver downgrades it into a failed
/// domestication result and keeps the message verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationError {
    pub kind: OptimizationErrorKind,
    pub message: String,
}

impl OptimizationError {
    pub fn new(kind: OptimizationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for OptimizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for OptimizationError {}
