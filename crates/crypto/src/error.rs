//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur while drawing randomness.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The operating system could not supply entropy. Callers must abort
    /// the operation that needed it; there is no fallback source.
    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),
}
