//! Error types for rusty-indicator

use thiserror::Error;

/// Main error type for indicator construction, evaluation and access
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Index out of range: {index} (size {size})")]
    OutOfRange { index: i64, size: usize },

    #[error("Result set out of range: {channel} (result count {count})")]
    ChannelOutOfRange { channel: usize, count: usize },

    #[error("Parameter not found: {0}")]
    ParamNotFound(String),

    #[error("Parameter type mismatch for '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown formula: {0}")]
    UnknownFormula(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl IndicatorError {
    /// Whether the error is an out-of-range access (positional or result set)
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            IndicatorError::OutOfRange { .. } | IndicatorError::ChannelOutOfRange { .. }
        )
    }
}

/// Result type alias for rusty-indicator operations
pub type Result<T> = std::result::Result<T, IndicatorError>;
