//! Test doubles for the tracker's capabilities.
//!
//! Enabled for this crate's own tests and, through the `testutils` feature,
//! for dependants that want to drive [`crate::track`] without a node.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::dispatch::{MetadataRegistry, StaticRegistry};
use crate::errors::{ChainError, Result, SignerError};
use crate::notify::{NotificationHandle, NotificationSink, Phase};
use crate::status::LifecycleEvent;
use crate::tracker::{ChainClient, LifecycleStream, Signer};
use crate::types::{BlockHash, Header, SignedExtrinsic, H256};

/// What the chain does once the extrinsic is signed.
pub enum Script {
    /// Emit these items, then end the stream.
    Events(Vec<Result<LifecycleEvent>>),
    /// Forward whatever the test pushes into the channel.
    Channel(UnboundedReceiver<Result<LifecycleEvent>>),
    /// Raise instead of returning a stream.
    Fail(ChainError),
}

/// Chain client replaying a prepared script.
pub struct ScriptedChain {
    registry: StaticRegistry,
    headers: HashMap<BlockHash, Header>,
    not_ready: Option<ChainError>,
    script: Mutex<Option<Script>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedChain {
    pub fn new(script: Script) -> Self {
        ScriptedChain {
            registry: StaticRegistry::new(),
            headers: HashMap::new(),
            not_ready: None,
            script: Mutex::new(Some(script)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn emitting(events: Vec<LifecycleEvent>) -> Self {
        Self::new(Script::Events(events.into_iter().map(Ok).collect()))
    }

    pub fn with_registry(mut self, registry: StaticRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_header(mut self, block: BlockHash, header: Header) -> Self {
        self.headers.insert(block, header);
        self
    }

    pub fn not_ready(mut self, err: ChainError) -> Self {
        self.not_ready = Some(err);
        self
    }

    /// Capability calls in the order they happened.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn wait_ready(&self) -> Result<()> {
        self.record("wait_ready");
        match &self.not_ready {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn block_header(&self, block: &BlockHash) -> Result<Header> {
        self.record("block_header");
        self.headers
            .get(block)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("header for {block}")))
    }

    async fn sign_and_watch(
        &self,
        extrinsic: &SignedExtrinsic,
        signer: &dyn Signer,
        address: &str,
    ) -> Result<LifecycleStream> {
        self.record("sign_and_watch");
        signer.sign(address, extrinsic.as_bytes()).await?;

        let script = self
            .script
            .lock()
            .take()
            .ok_or_else(|| ChainError::Transport("script already consumed".to_string()))?;
        match script {
            Script::Events(items) => Ok(futures::stream::iter(items).boxed()),
            Script::Channel(rx) => Ok(rx.boxed()),
            Script::Fail(err) => Err(err),
        }
    }

    fn registry(&self) -> &dyn MetadataRegistry {
        &self.registry
    }
}

/// Signer that always refuses, like a user closing the wallet popup.
pub struct RejectingSigner;

#[async_trait]
impl Signer for RejectingSigner {
    async fn sign(&self, _address: &str, _payload: &[u8]) -> std::result::Result<Vec<u8>, SignerError> {
        Err(SignerError::Rejected("Cancelled".to_string()))
    }
}

/// One call made on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub handle: NotificationHandle,
    pub phase: Phase,
    pub message: String,
}

/// Sink that remembers every call.
#[derive(Default)]
pub struct RecordingSink {
    next: AtomicU64,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Distinct handles in creation order.
    pub fn handles(&self) -> Vec<NotificationHandle> {
        let mut seen = Vec::new();
        for n in self.notices.lock().iter() {
            if !seen.contains(&n.handle) {
                seen.push(n.handle);
            }
        }
        seen
    }

    pub fn phases(&self, handle: NotificationHandle) -> Vec<Phase> {
        self.notices
            .lock()
            .iter()
            .filter(|n| n.handle == handle)
            .map(|n| n.phase)
            .collect()
    }

    pub fn last_message(&self, handle: NotificationHandle) -> Option<String> {
        self.notices
            .lock()
            .iter()
            .rev()
            .find(|n| n.handle == handle)
            .map(|n| n.message.clone())
    }

    fn push(&self, handle: NotificationHandle, phase: Phase, message: &str) {
        self.notices.lock().push(Notice {
            handle,
            phase,
            message: message.to_string(),
        });
    }
}

impl NotificationSink for RecordingSink {
    fn create(&self, _title: &str, message: &str, phase: Phase) -> NotificationHandle {
        let handle = NotificationHandle(self.next.fetch_add(1, Ordering::Relaxed));
        self.push(handle, phase, message);
        handle
    }

    fn update(&self, handle: NotificationHandle, message: &str, phase: Phase) {
        self.push(handle, phase, message);
    }

    fn resolve_success(&self, handle: NotificationHandle, message: &str) {
        self.push(handle, Phase::Success, message);
    }

    fn resolve_error(&self, handle: NotificationHandle, message: &str) {
        self.push(handle, Phase::Error, message);
    }
}

pub fn hash(byte: u8) -> H256 {
    H256([byte; 32])
}

pub fn header(number: u64) -> Header {
    Header {
        parent_hash: hash(0),
        number,
        state_root: hash(0xee),
        extrinsics_root: hash(0xef),
    }
}
