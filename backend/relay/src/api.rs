//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tx_tracker::{Conviction, RewardEstimate, RewardEstimator, SignedExtrinsic, TxHash, DEFAULT_APY};

use crate::board::Notification;
use crate::staking::AccountId;
use crate::submissions::{self, RelayState, SubmissionRecord};

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// `0x`-prefixed signed extrinsic from the wallet extension.
    pub extrinsic: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub id: u64,
    pub tx_hash: TxHash,
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    #[serde(flatten)]
    pub record: SubmissionRecord,
    pub notification: Option<Notification>,
}

#[derive(Debug, Deserialize)]
pub struct RewardsQuery {
    pub amount: f64,
    #[serde(default)]
    pub compounding: bool,
    pub apy: Option<f64>,
    /// Token price in fiat; adds a priced estimate when present.
    pub price: Option<f64>,
}

#[derive(Serialize)]
pub struct RewardsResponse {
    pub token: &'static str,
    pub amount: f64,
    pub apy: f64,
    pub compounding: bool,
    pub tokens: RewardEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiat: Option<RewardEstimate>,
}

#[derive(Debug, Deserialize)]
pub struct ConvictionQuery {
    pub amount: f64,
    /// Slider position `0..=6`; the network default when absent.
    pub level: Option<u8>,
}

#[derive(Serialize)]
pub struct ConvictionResponse {
    pub network: String,
    pub token: &'static str,
    pub level: u8,
    pub label: String,
    pub multiplier: f64,
    pub lock_days: u32,
    pub effective_votes: f64,
}

#[derive(Serialize)]
pub struct StakeResponse {
    /// The queried account, in the network's address format.
    pub address: String,
    pub network: String,
    /// Validators the account nominates directly.
    pub nominators: Vec<String>,
    /// Nomination pool the account belongs to.
    pub pool: Option<u32>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!(ErrorResponse {
            error: message.into()
        })),
    )
        .into_response()
}

/// 400 unless `value` is a finite number `>= 0`.
fn non_negative(name: &str, value: f64) -> Result<f64, Response> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(error(
            StatusCode::BAD_REQUEST,
            format!("{name} must be a non-negative number"),
        ))
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /submissions`
///
/// Accepts a wallet-signed extrinsic and starts tracking it.
pub async fn post_submission(
    State(state): State<Arc<RelayState>>,
    Json(body): Json<SubmitRequest>,
) -> Response {
    let extrinsic = match SignedExtrinsic::from_hex(&body.extrinsic) {
        Ok(ext) if !ext.is_empty() => ext,
        Ok(_) => return error(StatusCode::BAD_REQUEST, "extrinsic is empty"),
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid extrinsic hex: {e}")),
    };

    let (id, tx_hash) = submissions::submit(&state, extrinsic, body.address);
    (
        StatusCode::ACCEPTED,
        Json(json!(SubmitResponse { id, tx_hash })),
    )
        .into_response()
}

/// `GET /submissions/:id`
pub async fn get_submission(
    State(state): State<Arc<RelayState>>,
    Path(id): Path<u64>,
) -> Response {
    match state.submissions.get(id) {
        Some(record) => {
            let notification = record.notification.and_then(|h| state.board.get(h.0));
            (
                StatusCode::OK,
                Json(json!(SubmissionResponse {
                    record,
                    notification
                })),
            )
                .into_response()
        }
        None => error(StatusCode::NOT_FOUND, format!("unknown submission {id}")),
    }
}

/// `GET /notifications/:id`
pub async fn get_notification(
    State(state): State<Arc<RelayState>>,
    Path(id): Path<u64>,
) -> Response {
    match state.board.get(id) {
        Some(notification) => (StatusCode::OK, Json(json!(notification))).into_response(),
        None => error(StatusCode::NOT_FOUND, format!("unknown notification {id}")),
    }
}

/// `GET /rewards/estimate?amount=&compounding=&apy=&price=`
pub async fn rewards_estimate(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<RewardsQuery>,
) -> Response {
    let checked = non_negative("amount", query.amount).and_then(|amount| {
        let apy = non_negative("apy", query.apy.unwrap_or(DEFAULT_APY))?;
        let price = query.price.map(|p| non_negative("price", p)).transpose()?;
        Ok((amount, apy, price))
    });
    let (amount, apy, price) = match checked {
        Ok(values) => values,
        Err(response) => return response,
    };

    let tokens = RewardEstimator::new(apy, query.compounding).estimate(amount);
    let response = RewardsResponse {
        token: state.network.token_symbol(),
        amount,
        apy,
        compounding: query.compounding,
        tokens,
        fiat: price.map(|price| tokens.priced(price)),
    };
    (StatusCode::OK, Json(json!(response))).into_response()
}

/// `GET /conviction?amount=&level=`
pub async fn conviction(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<ConvictionQuery>,
) -> Response {
    let amount = match non_negative("amount", query.amount) {
        Ok(amount) => amount,
        Err(response) => return response,
    };
    let network = state.network;
    let level = match query.level {
        None => network.default_conviction(),
        Some(index) => match Conviction::from_index(index) {
            Some(level) => level,
            None => {
                return error(
                    StatusCode::BAD_REQUEST,
                    format!("invalid conviction level {index}, expected 0-6"),
                )
            }
        },
    };

    let votes = level.effective_votes(network.to_planck(amount));
    let response = ConvictionResponse {
        network: network.to_string(),
        token: network.token_symbol(),
        level: level.index(),
        label: level.label(),
        multiplier: level.multiplier(),
        lock_days: level.lock_days(),
        effective_votes: network.from_planck(votes),
    };
    (StatusCode::OK, Json(json!(response))).into_response()
}

/// `GET /accounts/:address/stake`
///
/// Validators the account nominates and the pool it is a member of.
pub async fn account_stake(
    State(state): State<Arc<RelayState>>,
    Path(address): Path<String>,
) -> Response {
    let account = match AccountId::parse(&address) {
        Ok(account) => account,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.staking.account_stake(&account).await {
        Ok(stake) => {
            let prefix = state.network.ss58_prefix();
            let response = StakeResponse {
                address: account.to_ss58(prefix),
                network: state.network.to_string(),
                nominators: stake.nominators.iter().map(|a| a.to_ss58(prefix)).collect(),
                pool: stake.pool,
            };
            (StatusCode::OK, Json(json!(response))).into_response()
        }
        Err(e) => {
            tracing::error!(%address, "Stake query failed: {e}");
            error(StatusCode::BAD_GATEWAY, format!("stake query failed: {e}"))
        }
    }
}
