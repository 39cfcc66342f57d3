//! Substrate JSON-RPC client: the relay's [`ChainClient`].
//!
//! Plain requests (`system_health`, `chain_getHeader`, storage reads) go over
//! HTTP; the extrinsic subscription needs a WebSocket.
//!
//! At `inBlock` and `finalized` the block is inspected: the extrinsic's index
//! is found in the block body and `System.Events` at that block is decoded
//! with the runtime metadata, so every inclusion event carries the
//! extrinsic's events and, if it failed, its dispatch error.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied when the node is unreachable, rate-limits
//!   us or answers with a soft RPC error, up to [`MAX_BACKOFF`].
//! * The readiness check and the metadata fetch retry until the node
//!   answers; header, block and storage queries give up after
//!   [`QUERY_ATTEMPTS`] attempts.
//! * The subscription is not retried: a dropped socket ends the stream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use tx_tracker::{
    BlockHash, ChainClient, ChainError, Header, LifecycleEvent, LifecycleStatus, LifecycleStream,
    MetadataRegistry, SignedExtrinsic, Signer, TxHash,
};

use crate::errors::{RelayError, Result};
use crate::events::{self, EventDecoder, ExtrinsicOutcome, RuntimeMetadata};
use crate::staking::{
    decode_nominations, decode_pool_id, nominators_key, pool_member_key, storage_prefix,
    AccountId, AccountStake, StakingReader,
};

pub const MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
pub const QUERY_ATTEMPTS: u32 = 5;

const REQUEST_ID: u64 = 1;
const SUBMIT_AND_WATCH: &str = "author_submitAndWatchExtrinsic";
const EXTRINSIC_UPDATE: &str = "author_extrinsicUpdate";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─────────────────────────────────────────────────────────
// JSON-RPC message shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl From<RpcError> for RelayError {
    fn from(err: RpcError) -> Self {
        RelayError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

/// Server push on an open subscription.
#[derive(Debug, Deserialize)]
struct RpcNotification {
    method: String,
    params: NotificationParams,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    subscription: Value,
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    peers: u64,
    is_syncing: bool,
}

/// `chain_getBlock` reply, body only.
#[derive(Debug, Deserialize)]
struct SignedBlock {
    block: BlockBody,
}

#[derive(Debug, Deserialize)]
struct BlockBody {
    extrinsics: Vec<String>,
}

// ─────────────────────────────────────────────────────────
// HTTP transport
// ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct HttpRpc {
    client: Client,
    url: String,
    initial_backoff: Duration,
}

impl HttpRpc {
    /// POST one JSON-RPC request, retrying soft failures.
    ///
    /// `max_attempts = None` retries forever. A `null` result is returned
    /// as [`Value::Null`].
    async fn call(&self, method: &str, params: Value, max_attempts: Option<u32>) -> Result<Value> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let response = self
                .client
                .post(&self.url)
                .json(&rpc_request(method, params.clone()))
                .send()
                .await;

            let failure = match response {
                Err(e) => RelayError::Http(e),
                Ok(resp) => {
                    // Covers 429 along with gateway errors in front of the node.
                    let status_error = resp.error_for_status_ref().err();
                    match status_error {
                        Some(e) => RelayError::Http(e),
                        None => {
                            let body: RpcResponse = resp.json().await?;
                            match body.error {
                                Some(err) if is_hard_error(err.code) => {
                                    return Err(err.into());
                                }
                                Some(err) => err.into(),
                                None => return Ok(body.result.unwrap_or(Value::Null)),
                            }
                        }
                    }
                }
            };

            if max_attempts.is_some_and(|max| attempt >= max) {
                return Err(failure);
            }
            warn!("{method} failed (will retry in {backoff:?}): {failure}");
            tokio::time::sleep(backoff).await;
            backoff = next_backoff(backoff);
        }
    }

    /// Raw storage value under `key`, at `block` or the best block.
    async fn storage(&self, key: &[u8], block: Option<&BlockHash>) -> Result<Option<Vec<u8>>> {
        let key = format!("0x{}", hex::encode(key));
        let params = match block {
            Some(block) => json!([key, block.to_string()]),
            None => json!([key]),
        };
        match self.call("state_getStorage", params, Some(QUERY_ATTEMPTS)).await? {
            Value::Null => Ok(None),
            Value::String(raw) => Ok(Some(decode_hex(&raw)?)),
            other => Err(RelayError::Protocol(format!(
                "unexpected storage value: {other}"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Block inspection
// ─────────────────────────────────────────────────────────

/// Reads what one extrinsic did in a block.
struct BlockInspector<R> {
    http: HttpRpc,
    runtime: Arc<R>,
}

impl<R: EventDecoder> BlockInspector<R> {
    async fn outcome(&self, block: &BlockHash, tx_hash: &TxHash) -> Result<ExtrinsicOutcome> {
        let reply = self
            .http
            .call("chain_getBlock", json!([block.to_string()]), Some(QUERY_ATTEMPTS))
            .await?;
        if reply.is_null() {
            return Err(RelayError::Protocol(format!("block {block} not found")));
        }
        let signed: SignedBlock = serde_json::from_value(reply)?;
        let index = extrinsic_index(&signed.block.extrinsics, tx_hash)?.ok_or_else(|| {
            RelayError::Protocol(format!("extrinsic {tx_hash} not found in block {block}"))
        })?;

        let records = match self
            .http
            .storage(&storage_prefix("System", "Events"), Some(block))
            .await?
        {
            Some(raw) => self.runtime.decode_events(raw)?,
            None => Vec::new(),
        };
        let outcome = events::extrinsic_outcome(&records, index)?;
        debug!(
            %block,
            index,
            events = outcome.events.len(),
            failed = outcome.dispatch_error.is_some(),
            "Inspected extrinsic"
        );
        Ok(outcome)
    }
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

pub struct RpcClient<R = RuntimeMetadata> {
    http: HttpRpc,
    ws_url: String,
    runtime: Arc<R>,
}

impl RpcClient<RuntimeMetadata> {
    /// Build a client around the runtime metadata the node serves. Waits
    /// until the node answers.
    pub async fn connect(client: Client, http_url: String, ws_url: String) -> Result<Self> {
        let http = HttpRpc {
            client,
            url: http_url,
            initial_backoff: INITIAL_BACKOFF,
        };
        let raw = match http.call("state_getMetadata", json!([]), None).await? {
            Value::String(raw) => decode_hex(&raw)?,
            other => {
                return Err(RelayError::Protocol(format!(
                    "unexpected metadata reply: {other}"
                )))
            }
        };
        let runtime = RuntimeMetadata::from_bytes(&raw)?;
        info!(bytes = raw.len(), "Loaded runtime metadata");

        Ok(RpcClient {
            http,
            ws_url,
            runtime: Arc::new(runtime),
        })
    }
}

impl<R> RpcClient<R> {
    pub fn new(client: Client, http_url: String, ws_url: String, runtime: R) -> Self {
        RpcClient {
            http: HttpRpc {
                client,
                url: http_url,
                initial_backoff: INITIAL_BACKOFF,
            },
            ws_url,
            runtime: Arc::new(runtime),
        }
    }

    /// Delay before the first retry; it doubles up to [`MAX_BACKOFF`].
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.http.initial_backoff = initial;
        self
    }

    fn inspector(&self) -> BlockInspector<R> {
        BlockInspector {
            http: self.http.clone(),
            runtime: self.runtime.clone(),
        }
    }

    /// Open a socket and start watching `extrinsic`. Returns the socket
    /// together with the subscription id the node assigned.
    async fn subscribe(&self, extrinsic: &SignedExtrinsic) -> Result<(Socket, Value)> {
        let (mut socket, _) = connect_async(self.ws_url.as_str()).await?;
        let request = rpc_request(SUBMIT_AND_WATCH, json!([extrinsic.to_hex()]));
        socket.send(Message::text(request.to_string())).await?;

        while let Some(msg) = socket.next().await {
            let Message::Text(text) = msg? else {
                continue;
            };
            let reply: RpcResponse = serde_json::from_str(text.as_str())?;
            if reply.id != Some(json!(REQUEST_ID)) {
                continue;
            }
            if let Some(err) = reply.error {
                return Err(err.into());
            }
            return match reply.result {
                Some(subscription) if !subscription.is_null() => Ok((socket, subscription)),
                _ => Err(RelayError::Protocol(format!(
                    "{SUBMIT_AND_WATCH} returned no subscription id"
                ))),
            };
        }

        Err(RelayError::Protocol(
            "socket closed before the subscription was confirmed".to_string(),
        ))
    }
}

#[async_trait]
impl<R> ChainClient for RpcClient<R>
where
    R: EventDecoder + MetadataRegistry + 'static,
{
    async fn wait_ready(&self) -> tx_tracker::Result<()> {
        let value = self.http.call("system_health", json!([]), None).await?;
        match serde_json::from_value::<Health>(value) {
            Ok(health) => info!(
                peers = health.peers,
                syncing = health.is_syncing,
                "Node ready"
            ),
            Err(e) => debug!("Unrecognised system_health reply: {e}"),
        }
        Ok(())
    }

    async fn block_header(&self, block: &BlockHash) -> tx_tracker::Result<Header> {
        let value = self
            .http
            .call("chain_getHeader", json!([block.to_string()]), Some(QUERY_ATTEMPTS))
            .await?;
        if value.is_null() {
            return Err(ChainError::NotFound(format!("block {block}")));
        }
        serde_json::from_value(value).map_err(|e| ChainError::Decode(e.to_string()))
    }

    async fn sign_and_watch(
        &self,
        extrinsic: &SignedExtrinsic,
        signer: &dyn Signer,
        address: &str,
    ) -> tx_tracker::Result<LifecycleStream> {
        let signed = SignedExtrinsic::new(signer.sign(address, extrinsic.as_bytes()).await?);
        let tx_hash = signed.hash();

        let (socket, subscription) = self.subscribe(&signed).await?;
        info!(%tx_hash, %subscription, "Watching extrinsic");

        Ok(lifecycle_stream(socket, subscription, tx_hash, self.inspector()))
    }

    fn registry(&self) -> &dyn MetadataRegistry {
        self.runtime.as_ref()
    }
}

#[async_trait]
impl<R: Send + Sync + 'static> StakingReader for RpcClient<R> {
    async fn account_stake(&self, account: &AccountId) -> Result<AccountStake> {
        let nominators = match self.http.storage(&nominators_key(account), None).await? {
            Some(raw) => decode_nominations(&raw)?,
            None => Vec::new(),
        };
        let pool = match self.http.storage(&pool_member_key(account), None).await? {
            Some(raw) => Some(decode_pool_id(&raw)?),
            None => None,
        };
        Ok(AccountStake { nominators, pool })
    }
}

/// Turn the subscription's pushes into lifecycle events, inspecting the
/// block at each inclusion. The stream ends when the socket closes or after
/// the first error.
fn lifecycle_stream<R>(
    socket: Socket,
    subscription: Value,
    tx_hash: TxHash,
    inspector: BlockInspector<R>,
) -> LifecycleStream
where
    R: EventDecoder + 'static,
{
    futures::stream::unfold(Some((socket, inspector)), move |state| {
        let subscription = subscription.clone();
        async move {
            let (mut socket, inspector) = state?;
            let status = loop {
                match socket.next().await? {
                    Ok(Message::Text(text)) => match parse_update(text.as_str(), &subscription) {
                        Some(Ok(status)) => break status,
                        Some(Err(e)) => return Some((Err(ChainError::from(e)), None)),
                        None => continue,
                    },
                    Ok(Message::Close(_)) => return None,
                    Ok(_) => continue,
                    Err(e) => return Some((Err(ChainError::from(RelayError::from(e))), None)),
                }
            };

            let block = included_in(&status);
            let mut event = LifecycleEvent::new(status).with_tx_hash(tx_hash);
            if let Some(block) = block {
                match inspector.outcome(&block, &tx_hash).await {
                    Ok(outcome) => {
                        event = event.with_events(outcome.events);
                        if let Some(dispatch_error) = outcome.dispatch_error {
                            event = event.with_dispatch_error(dispatch_error);
                        }
                    }
                    Err(e) => return Some((Err(ChainError::from(e)), None)),
                }
            }
            Some((Ok(event), Some((socket, inspector))))
        }
    })
    .boxed()
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

fn rpc_request(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": REQUEST_ID,
        "method": method,
        "params": params,
    })
}

/// Invalid request / method not found: retrying cannot help.
fn is_hard_error(code: i64) -> bool {
    code == -32600 || code == -32601
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(raw.trim_start_matches("0x"))?)
}

/// Block a status reports the extrinsic in.
fn included_in(status: &LifecycleStatus) -> Option<BlockHash> {
    match status {
        LifecycleStatus::InBlock(block) | LifecycleStatus::Finalized(block) => Some(*block),
        _ => None,
    }
}

/// Position of the extrinsic hashing to `tx_hash` in a block body.
fn extrinsic_index(extrinsics: &[String], tx_hash: &TxHash) -> Result<Option<u32>> {
    for (index, raw) in extrinsics.iter().enumerate() {
        if SignedExtrinsic::from_hex(raw)?.hash() == *tx_hash {
            return Ok(Some(index as u32));
        }
    }
    Ok(None)
}

/// Status carried by an `author_extrinsicUpdate` push for `subscription`.
/// `None` for anything else arriving on the socket.
fn parse_update(text: &str, subscription: &Value) -> Option<Result<LifecycleStatus>> {
    let notification: RpcNotification = serde_json::from_str(text).ok()?;
    if notification.method != EXTRINSIC_UPDATE || &notification.params.subscription != subscription
    {
        return None;
    }
    Some(serde_json::from_value(notification.params.result).map_err(RelayError::from))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
