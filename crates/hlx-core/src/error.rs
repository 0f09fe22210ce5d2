//! Error types for hlx-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A numeric value cannot be represented on the wire without loss.
    /// Never silently rounded: the caller must fix the input.
    #[error("precision loss encoding {value} ({context})")]
    Precision { value: f64, context: &'static str },

    /// No asset-index mapping exists for the symbol.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Malformed order-type variant.
    #[error("invalid order type: {0}")]
    InvalidOrderType(String),

    /// Client order id is not `0x` + 32 hex characters.
    #[error("invalid cloid: {0}")]
    InvalidCloid(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
