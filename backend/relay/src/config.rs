//! Application configuration loaded from environment variables.

use std::time::Duration;

use tx_tracker::{Network, NotificationMessages};

use crate::errors::{RelayError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC HTTP endpoint of the node (e.g. https://rpc.polkadot.io)
    pub rpc_http_url: String,
    /// JSON-RPC WebSocket endpoint, used for extrinsic subscriptions
    pub rpc_ws_url: String,
    /// Relay chain the staking UI talks to
    pub network: Network,
    /// Port for the REST API server
    pub api_port: u16,
    /// Upper bound on how long one submission is tracked
    pub submission_timeout_secs: u64,
    /// Notification texts, picked by `NOTIFY_LOCALE`
    pub messages: NotificationMessages,
    /// How long finished submissions and their notifications stay queryable
    pub retention_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let locale = env_var("NOTIFY_LOCALE").unwrap_or_else(|_| "hu".to_string());

        Ok(Config {
            rpc_http_url: env_var("RPC_HTTP_URL")
                .unwrap_or_else(|_| "https://rpc.polkadot.io".to_string()),
            rpc_ws_url: env_var("RPC_WS_URL")
                .unwrap_or_else(|_| "wss://rpc.polkadot.io".to_string()),
            network: env_var("NETWORK")
                .unwrap_or_else(|_| "polkadot".to_string())
                .parse()
                .map_err(|e: String| RelayError::Config(format!("Invalid NETWORK: {e}")))?,
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| RelayError::Config("Invalid API_PORT".to_string()))?,
            submission_timeout_secs: env_var("SUBMISSION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .map_err(|_| RelayError::Config("Invalid SUBMISSION_TIMEOUT_SECS".to_string()))?,
            messages: NotificationMessages::for_locale(&locale).ok_or_else(|| {
                RelayError::Config(format!("Unsupported NOTIFY_LOCALE: {locale}"))
            })?,
            retention_secs: env_var("RETENTION_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| RelayError::Config("Invalid RETENTION_SECS".to_string()))?,
        })
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| RelayError::Config(format!("Missing env var: {key}")))
}
