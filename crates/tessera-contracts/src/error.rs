//! Error types for the Tessera audit trail.
//!
//! Every fallible operation returns `TesseraResult<T>`.  Chain integrity
//! problems are not part of this enum: a broken chain is a
//! finding reported by the verifier as a `VerificationOutcome`, not an error.

use thiserror::Error;

/// The unified error type for the Tessera crates.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Input to `log_event` (or a report query) is malformed or incomplete.
    ///
    /// Nothing was appended; the caller must correct the input and retry.
    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A value could not be brought into canonical form.
    ///
    /// Raised before any hash is computed.  Treated as a validation failure.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The append could not be durably committed.
    ///
    /// The chain tail and the correlation index are unchanged, so retrying
    /// the whole `log_event` call is always safe.
    #[error("storage write failed: {reason}")]
    StorageWrite { reason: String },

    /// Committed events could not be read back from the store.
    #[error("storage read failed: {reason}")]
    StorageRead { reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl TesseraError {
    /// Shorthand for a `Validation` error on `field`.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageWrite { .. })
    }

    /// True for input problems the caller has to fix before retrying.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Serialization { .. })
    }
}

/// Convenience alias used throughout the Tessera crates.
pub type TesseraResult<T> = Result<T, TesseraError>;
