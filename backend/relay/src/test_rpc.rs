//! `RpcClient` against a local node: JSON-RPC over an axum router, the
//! extrinsic subscription over a tungstenite socket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use codec::Encode;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tx_tracker::testutils::{hash, RecordingSink};
use tx_tracker::{
    track, ChainClient, ChainError, FailureKind, LifecycleStatus, LifecycleStream,
    MetadataRegistry, ModuleError, ModuleErrorDetails, Phase, PreSigned, SignedExtrinsic, Signer,
    StaticRegistry, SubmissionRequest, SubmissionResult,
};

use crate::errors::{RelayError, Result};
use crate::events::{EventDecoder, EventRecord};
use crate::rpc::{RpcClient, QUERY_ATTEMPTS};
use crate::staking::{nominators_key, pool_member_key, storage_prefix, AccountId, StakingReader};

const SUB: &str = "sub-1";
const UNUSED_SOCKET: &str = "ws://127.0.0.1:1";
/// Raw `System.Events` value the node serves; [`CannedRuntime`] expects it.
const EVENTS_BLOB: &[u8] = &[0xde, 0xad, 0xbe, 0xef];

// ─────────────────────────────────────────────────────────
// JSON-RPC node
// ─────────────────────────────────────────────────────────

#[derive(Clone)]
enum Reply {
    Result(Value),
    Error(i64),
    Status(StatusCode),
}

#[derive(Default)]
struct MockNode {
    replies: Mutex<HashMap<String, Vec<Reply>>>,
    storage: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockNode {
    /// Answer `method` with `replies` in order, repeating the last one.
    fn on(self, method: &str, replies: Vec<Reply>) -> Self {
        self.replies.lock().insert(method.to_string(), replies);
        self
    }

    fn with_storage(self, key: &[u8], value: Value) -> Self {
        self.storage
            .lock()
            .insert(format!("0x{}", hex::encode(key)), value);
        self
    }

    /// Params of every call to `method`.
    fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

async fn answer(State(node): State<Arc<MockNode>>, Json(request): Json<Value>) -> Response {
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    let seen = {
        let mut calls = node.calls.lock();
        calls.push((method.clone(), params.clone()));
        calls.iter().filter(|(m, _)| *m == method).count()
    };

    let reply = if method == "state_getStorage" {
        let key = params[0].as_str().unwrap_or_default();
        Reply::Result(node.storage.lock().get(key).cloned().unwrap_or(Value::Null))
    } else {
        match node.replies.lock().get(&method) {
            Some(replies) if !replies.is_empty() => replies[(seen - 1).min(replies.len() - 1)].clone(),
            _ => Reply::Error(-32601),
        }
    };

    match reply {
        Reply::Result(result) => Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result })).into_response(),
        Reply::Error(code) => Json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": code, "message": "node says no" },
        }))
        .into_response(),
        Reply::Status(status) => status.into_response(),
    }
}

async fn serve_http(node: MockNode) -> (Arc<MockNode>, String) {
    let node = Arc::new(node);
    let app = Router::new().route("/", post(answer)).with_state(node.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await });
    (node, url)
}

// ─────────────────────────────────────────────────────────
// Subscription socket
// ─────────────────────────────────────────────────────────

enum Push {
    Frame(Value),
    /// Closing handshake, then hang up.
    Close,
}

fn confirm(subscription: &str) -> Push {
    Push::Frame(json!({ "jsonrpc": "2.0", "id": 1, "result": subscription }))
}

fn update(subscription: &str, status: Value) -> Push {
    Push::Frame(json!({
        "jsonrpc": "2.0",
        "method": "author_extrinsicUpdate",
        "params": { "subscription": subscription, "result": status },
    }))
}

/// Accept one socket, read the submission, then play `pushes`. Without a
/// trailing [`Push::Close`] the connection is dropped mid-stream.
async fn serve_ws(pushes: Vec<Push>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _submission = socket.next().await;
        for push in pushes {
            match push {
                Push::Frame(frame) => {
                    let _ = socket.send(Message::text(frame.to_string())).await;
                }
                Push::Close => {
                    let _ = socket.close(None).await;
                    while let Some(Ok(_)) = socket.next().await {}
                    return;
                }
            }
        }
    });
    url
}

// ─────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────

struct CannedRuntime {
    records: Vec<EventRecord>,
    registry: StaticRegistry,
}

impl CannedRuntime {
    fn new(records: Vec<EventRecord>) -> Self {
        CannedRuntime {
            records,
            registry: StaticRegistry::new().with(
                5,
                3,
                ModuleErrorDetails {
                    section: "balances".to_string(),
                    name: "InsufficientBalance".to_string(),
                    docs: vec!["Balance too low".to_string(), "to send value.".to_string()],
                },
            ),
        }
    }
}

impl EventDecoder for CannedRuntime {
    fn decode_events(&self, bytes: Vec<u8>) -> Result<Vec<EventRecord>> {
        if bytes != EVENTS_BLOB {
            return Err(RelayError::Events(format!("unexpected events value {bytes:?}")));
        }
        Ok(self.records.clone())
    }
}

impl MetadataRegistry for CannedRuntime {
    fn find_meta_error(&self, error: &ModuleError) -> Option<ModuleErrorDetails> {
        self.registry.find_meta_error(error)
    }
}

fn record(extrinsic: u32, pallet: &str, variant: &str, field_bytes: Vec<u8>) -> EventRecord {
    EventRecord {
        extrinsic: Some(extrinsic),
        pallet: pallet.to_string(),
        variant: variant.to_string(),
        fields: json!(null),
        field_bytes,
    }
}

/// Our extrinsic sits at index 1 and fails with balances error 3.
fn failed_records() -> Vec<EventRecord> {
    vec![
        record(0, "System", "ExtrinsicSuccess", vec![]),
        record(1, "Balances", "Withdraw", vec![]),
        record(1, "System", "ExtrinsicFailed", vec![3, 5, 3, 0, 0, 0, 0, 0]),
    ]
}

fn succeeded_records() -> Vec<EventRecord> {
    vec![
        record(0, "System", "ExtrinsicSuccess", vec![]),
        record(1, "Staking", "Bonded", vec![]),
        record(1, "System", "ExtrinsicSuccess", vec![]),
    ]
}

// ─────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────

fn ours() -> SignedExtrinsic {
    SignedExtrinsic::new(vec![0x2d, 0x02, 0x84, 0x01, 0x07])
}

fn header_json(number: u64) -> Value {
    json!({
        "parentHash": format!("0x{}", "11".repeat(32)),
        "number": format!("0x{number:x}"),
        "stateRoot": format!("0x{}", "22".repeat(32)),
        "extrinsicsRoot": format!("0x{}", "33".repeat(32)),
        "digest": { "logs": [] },
    })
}

fn hex_value(bytes: &[u8]) -> Value {
    json!(format!("0x{}", hex::encode(bytes)))
}

/// A node whose block holds a timestamp set followed by `extrinsics`.
fn node_with_block(extrinsics: &[SignedExtrinsic]) -> MockNode {
    let mut body = vec!["0x280402000b".to_string()];
    body.extend(extrinsics.iter().map(SignedExtrinsic::to_hex));
    MockNode::default()
        .on(
            "system_health",
            vec![Reply::Result(json!({ "peers": 8, "isSyncing": false, "shouldHavePeers": true }))],
        )
        .on("chain_getHeader", vec![Reply::Result(header_json(436))])
        .on(
            "chain_getBlock",
            vec![Reply::Result(json!({
                "block": { "header": header_json(436), "extrinsics": body },
                "justifications": null,
            }))],
        )
        .with_storage(&storage_prefix("System", "Events"), hex_value(EVENTS_BLOB))
}

fn client(http_url: String, ws_url: String, runtime: CannedRuntime) -> RpcClient<CannedRuntime> {
    RpcClient::new(reqwest::Client::new(), http_url, ws_url, runtime)
        .with_backoff(Duration::from_millis(5))
}

fn finalizing_pushes() -> Vec<Push> {
    let block = hash(2);
    vec![
        confirm(SUB),
        update(SUB, json!("ready")),
        update(SUB, json!({ "inBlock": block })),
        update(SUB, json!({ "finalized": block })),
        Push::Close,
    ]
}

async fn submit(chain: &RpcClient<CannedRuntime>, sink: &RecordingSink) -> SubmissionResult {
    track(
        Some(chain as &dyn ChainClient),
        Some(&PreSigned as &dyn Signer),
        sink,
        SubmissionRequest::new(ours(), "alice"),
    )
    .await
}

async fn watch(pushes: Vec<Push>) -> tx_tracker::Result<LifecycleStream> {
    let (_node, http_url) = serve_http(MockNode::default()).await;
    let chain = client(http_url, serve_ws(pushes).await, CannedRuntime::new(vec![]));
    chain.sign_and_watch(&ours(), &PreSigned, "alice").await
}

// ─────────────────────────────────────────────────────────
// Block events
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_dispatch_resolves_to_error() {
    let (node, http_url) = serve_http(node_with_block(&[ours()])).await;
    let ws_url = serve_ws(finalizing_pushes()).await;
    let chain = client(http_url, ws_url, CannedRuntime::new(failed_records()));
    let sink = RecordingSink::new();

    let result = submit(&chain, &sink).await;
    let SubmissionResult::Failure(failure) = result else {
        panic!("expected failure, got {result:?}");
    };
    assert_eq!(failure.kind, FailureKind::Dispatched);
    assert_eq!(failure.message, "Balance too low to send value.");
    assert_eq!(
        sink.phases(sink.handles()[0]),
        vec![Phase::Signing, Phase::Entering, Phase::Finalizing, Phase::Error]
    );

    // Inspected at inclusion and again at finality.
    let blocks = node.calls("chain_getBlock");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0][0], hash(2).to_string());
    let storage = node.calls("state_getStorage");
    assert_eq!(storage[0][0], hex_value(&storage_prefix("System", "Events")));
    assert_eq!(storage[0][1], hash(2).to_string());
}

#[tokio::test]
async fn test_successful_dispatch_carries_its_events() {
    let (_node, http_url) = serve_http(node_with_block(&[ours()])).await;
    let ws_url = serve_ws(finalizing_pushes()).await;
    let chain = client(http_url, ws_url, CannedRuntime::new(succeeded_records()));
    let sink = RecordingSink::new();

    let result = submit(&chain, &sink).await;
    let SubmissionResult::Success(receipt) = result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(receipt.tx_hash, ours().hash());
    assert_eq!(receipt.finalized_block, hash(2));
    assert_eq!(receipt.block_header.map(|h| h.number), Some(436));
    let names: Vec<_> = receipt
        .events
        .iter()
        .map(|e| format!("{}.{}", e.section, e.method))
        .collect();
    assert_eq!(names, vec!["staking.Bonded", "system.ExtrinsicSuccess"]);
}

#[tokio::test]
async fn test_extrinsic_missing_from_block() {
    let someone_else = SignedExtrinsic::new(vec![0x2d, 0x09]);
    let (_node, http_url) = serve_http(node_with_block(&[someone_else])).await;
    let ws_url = serve_ws(finalizing_pushes()).await;
    let chain = client(http_url, ws_url, CannedRuntime::new(succeeded_records()));
    let sink = RecordingSink::new();

    let result = submit(&chain, &sink).await;
    let SubmissionResult::Failure(failure) = result else {
        panic!("expected failure, got {result:?}");
    };
    assert_eq!(failure.kind, FailureKind::SubmissionThrew);
    assert!(failure.message.contains("not found in block"), "{}", failure.message);
}

// ─────────────────────────────────────────────────────────
// HTTP retries
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rate_limits_and_soft_errors_are_retried() {
    let node = MockNode::default().on(
        "system_health",
        vec![
            Reply::Status(StatusCode::TOO_MANY_REQUESTS),
            Reply::Error(-32603),
            Reply::Result(json!({ "peers": 1, "isSyncing": false })),
        ],
    );
    let (node, http_url) = serve_http(node).await;
    let chain = client(http_url, UNUSED_SOCKET.to_string(), CannedRuntime::new(vec![]));

    chain.wait_ready().await.unwrap();
    assert_eq!(node.calls("system_health").len(), 3);
}

#[tokio::test]
async fn test_hard_errors_are_not_retried() {
    for code in [-32600, -32601] {
        let node = MockNode::default().on("system_health", vec![Reply::Error(code)]);
        let (node, http_url) = serve_http(node).await;
        let chain = client(http_url, UNUSED_SOCKET.to_string(), CannedRuntime::new(vec![]));

        let err = chain.wait_ready().await.unwrap_err();
        assert!(matches!(err, ChainError::Rpc { code: c, .. } if c == code), "{err:?}");
        assert_eq!(node.calls("system_health").len(), 1);
    }
}

#[tokio::test]
async fn test_header_fetch_gives_up() {
    let node = MockNode::default().on(
        "chain_getHeader",
        vec![Reply::Status(StatusCode::SERVICE_UNAVAILABLE)],
    );
    let (node, http_url) = serve_http(node).await;
    let chain = client(http_url, UNUSED_SOCKET.to_string(), CannedRuntime::new(vec![]));

    let err = chain.block_header(&hash(3)).await.unwrap_err();
    assert!(matches!(err, ChainError::Transport(_)), "{err:?}");
    assert_eq!(node.calls("chain_getHeader").len(), QUERY_ATTEMPTS as usize);
}

#[tokio::test]
async fn test_unknown_block_header() {
    let node = MockNode::default().on("chain_getHeader", vec![Reply::Result(Value::Null)]);
    let (_node, http_url) = serve_http(node).await;
    let chain = client(http_url, UNUSED_SOCKET.to_string(), CannedRuntime::new(vec![]));

    let err = chain.block_header(&hash(3)).await.unwrap_err();
    assert!(matches!(err, ChainError::NotFound(_)), "{err:?}");
}

// ─────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_subscription_rejected() {
    let rejection = Push::Frame(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": 1010, "message": "Invalid Transaction" },
    }));
    let Err(err) = watch(vec![rejection]).await else {
        panic!("subscription should be rejected");
    };
    assert_eq!(
        err,
        ChainError::Rpc {
            code: 1010,
            message: "Invalid Transaction".to_string()
        }
    );
}

#[tokio::test]
async fn test_socket_closed_before_confirmation() {
    let Err(err) = watch(vec![Push::Close]).await else {
        panic!("subscription should fail");
    };
    assert!(
        matches!(&err, ChainError::Decode(msg) if msg.contains("socket closed before the subscription was confirmed")),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_stream_ends_on_close() {
    let stream = watch(vec![
        confirm(SUB),
        update("sub-2", json!("ready")),
        update(SUB, json!("ready")),
        Push::Close,
    ])
    .await
    .map_err(|e| e.to_string())
    .unwrap();

    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 1);
    let event = events[0].as_ref().unwrap();
    assert_eq!(event.status, LifecycleStatus::Ready);
    assert_eq!(event.tx_hash, Some(ours().hash()));
}

#[tokio::test]
async fn test_stream_fails_on_socket_error() {
    let stream = watch(vec![confirm(SUB), update(SUB, json!("ready"))])
        .await
        .map_err(|e| e.to_string())
        .unwrap();

    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    assert!(matches!(events[1], Err(ChainError::Transport(_))), "{:?}", events[1]);
}

// ─────────────────────────────────────────────────────────
// Account stake
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_account_stake_reads_both_pallets() {
    let account = AccountId([1; 32]);
    let validator = AccountId([9; 32]);
    let nominations = (vec![validator.0], 1200u32, false).encode();
    let member = (17u32, 5_000u128, 0u128, Vec::<(u32, u128)>::new()).encode();
    let node = MockNode::default()
        .with_storage(&nominators_key(&account), hex_value(&nominations))
        .with_storage(&pool_member_key(&account), hex_value(&member));
    let (node, http_url) = serve_http(node).await;
    let chain = client(http_url, UNUSED_SOCKET.to_string(), CannedRuntime::new(vec![]));

    let stake = chain.account_stake(&account).await.unwrap();
    assert_eq!(stake.nominators, vec![validator]);
    assert_eq!(stake.pool, Some(17));

    // Read at the best block.
    for params in node.calls("state_getStorage") {
        assert_eq!(params.as_array().map(Vec::len), Some(1));
    }
}

#[tokio::test]
async fn test_account_without_stake() {
    let (_node, http_url) = serve_http(MockNode::default()).await;
    let chain = client(http_url, UNUSED_SOCKET.to_string(), CannedRuntime::new(vec![]));

    let stake = chain.account_stake(&AccountId([1; 32])).await.unwrap();
    assert!(stake.nominators.is_empty());
    assert_eq!(stake.pool, None);
}

#[tokio::test]
async fn test_malformed_storage_value() {
    let account = AccountId([1; 32]);
    let node = MockNode::default().with_storage(&nominators_key(&account), json!("0xzz"));
    let (_node, http_url) = serve_http(node).await;
    let chain = client(http_url, UNUSED_SOCKET.to_string(), CannedRuntime::new(vec![]));

    let err = chain.account_stake(&account).await.unwrap_err();
    assert!(matches!(err, RelayError::Hex(_)), "{err:?}");
    assert!(matches!(ChainError::from(err), ChainError::Decode(_)));
}
