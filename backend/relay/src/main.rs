//! Staking transaction relay: entry point.
//!
//! Accepts wallet-signed extrinsics over REST, submits them to a Substrate
//! node and tracks each one to finality in a background task. Progress is
//! published on an in-memory notification board the front-end polls. The
//! staking calculators (reward estimate, conviction) and the account stake
//! view are served alongside.

mod api;
mod board;
mod config;
mod errors;
mod events;
mod rpc;
mod staking;
mod submissions;

#[cfg(test)]
mod test_rpc;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tx_tracker::ChainClient;

use board::NotificationBoard;
use config::Config;
use rpc::RpcClient;
use submissions::{RelayState, SubmissionStore};

/// How often finished submissions are checked against the retention period.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

    info!(url = %config.rpc_http_url, "Fetching runtime metadata");
    let rpc = Arc::new(
        RpcClient::connect(client, config.rpc_http_url.clone(), config.rpc_ws_url.clone())
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?,
    );
    let chain: Arc<dyn ChainClient> = rpc.clone();

    // ─── Node readiness ───────────────────────────────────
    let node = chain.clone();
    tokio::spawn(async move {
        if let Err(e) = node.wait_ready().await {
            warn!("Readiness check failed: {e}");
        }
    });

    // ─── REST API ─────────────────────────────────────────
    let state = Arc::new(RelayState {
        chain,
        staking: rpc,
        board: NotificationBoard::new(),
        submissions: SubmissionStore::new(),
        messages: config.messages.clone(),
        network: config.network,
        submission_timeout: config.submission_timeout(),
        retention: config.retention(),
    });

    // ─── Retention ────────────────────────────────────────
    submissions::spawn_pruner(state.clone(), PRUNE_INTERVAL);

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/submissions", post(api::post_submission))
        .route("/submissions/:id", get(api::get_submission))
        .route("/notifications/:id", get(api::get_notification))
        .route("/rewards/estimate", get(api::rewards_estimate))
        .route("/conviction", get(api::conviction))
        .route("/accounts/:address/stake", get(api::account_stake))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!(network = %config.network, "API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
