//! Errors raised by the capabilities the tracker consumes.
//!
//! None of these escape [`crate::track`]: every one is folded into a
//! [`crate::Failure`] before the tracker resolves.

use thiserror::Error;

/// Failure reported by a signing capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The account holder declined to sign.
    #[error("signing rejected: {0}")]
    Rejected(String),

    /// No signer is reachable for the requested account.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by a chain client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Signing(#[from] SignerError),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
