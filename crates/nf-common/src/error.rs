//! Error types for NetFlow State Discovery.
//!
//! Structured error handling with stable error codes for machine parsing and
//! category classification for grouping. Numerical degeneracy (zero-variance
//! dimensions, zero-occupancy states) is deliberately *not* represented here:
//! the engine absorbs those internally instead of failing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for NetFlow State Discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller-supplied input violated a precondition.
    Input,
    /// Model lifecycle or persistence errors.
    Model,
    /// Training pipeline and worker errors.
    Training,
    /// Flow store boundary errors.
    Store,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Training => write!(f, "training"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for NetFlow State Discovery.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-19)
    #[error("empty feature matrix")]
    EmptyMatrix,

    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("not enough flows for discovery: {got} usable rows (minimum {min})")]
    NotEnoughFlows { got: usize, min: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    // Model errors (20-29)
    #[error("model not fitted")]
    NotFitted,

    #[error("scaler not fitted")]
    ScalerNotFitted,

    #[error("unsupported model params version: {0}")]
    ParamsVersion(u32),

    #[error("invalid model params: {0}")]
    InvalidParams(String),

    // Training errors (30-39)
    #[error("training failed: {0}")]
    Training(String),

    // Store errors (40-49)
    #[error("flow store error: {0}")]
    Store(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Codes are grouped by category:
    /// - 10-19: Input errors
    /// - 20-29: Model errors
    /// - 30-39: Training errors
    /// - 40-49: Store errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::EmptyMatrix => 10,
            Error::DimensionMismatch { .. } => 11,
            Error::NotEnoughFlows { .. } => 12,
            Error::Config(_) => 13,
            Error::NotFitted => 20,
            Error::ScalerNotFitted => 21,
            Error::ParamsVersion(_) => 22,
            Error::InvalidParams(_) => 23,
            Error::Training(_) => 30,
            Error::Store(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::EmptyMatrix
            | Error::DimensionMismatch { .. }
            | Error::NotEnoughFlows { .. }
            | Error::Config(_) => ErrorCategory::Input,

            Error::NotFitted
            | Error::ScalerNotFitted
            | Error::ParamsVersion(_)
            | Error::InvalidParams(_) => ErrorCategory::Model,

            Error::Training(_) => ErrorCategory::Training,

            Error::Store(_) => ErrorCategory::Store,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }
}
