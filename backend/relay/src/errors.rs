//! Application-wide error types.

use thiserror::Error;
use tx_tracker::ChainError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("SCALE decode error: {0}")]
    Codec(#[from] codec::Error),

    #[error("Event decode error: {0}")]
    Events(String),

    #[error("Invalid address {0}")]
    Address(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl From<RelayError> for ChainError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Rpc { code, message } => ChainError::Rpc { code, message },
            RelayError::Json(e) => ChainError::Decode(e.to_string()),
            RelayError::Hex(e) => ChainError::Decode(e.to_string()),
            RelayError::Codec(e) => ChainError::Decode(e.to_string()),
            RelayError::Events(msg) => ChainError::Decode(msg),
            RelayError::Protocol(msg) | RelayError::Address(msg) => ChainError::Decode(msg),
            other => ChainError::Transport(other.to_string()),
        }
    }
}
