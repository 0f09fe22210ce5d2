//! Error types for the signing pipeline.

use hlx_core::CoreError;
use thiserror::Error;

/// Signing pipeline errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Key material is unusable. Fatal: there is no local retry.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(#[from] alloy::signers::Error),

    #[error("action serialization failed: {0}")]
    Serialization(String),

    /// Codec failures propagate unchanged.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for signing operations.
pub type SigningResult<T> = std::result::Result<T, SigningError>;
