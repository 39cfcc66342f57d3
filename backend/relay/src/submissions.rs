//! Submission registry and the per-submission tracking task.
//!
//! Every accepted extrinsic gets a record and its own Tokio task running
//! [`track`] under the configured timeout. The record is the only thing the
//! task writes besides the notification.
//!
//! Finished records and resolved notifications are kept for the retention
//! period, then dropped by a periodic prune.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tx_tracker::{
    track, ChainClient, Network, NotificationHandle, NotificationMessages, NotificationSink, Phase,
    PreSigned, Signer, SignedExtrinsic, SubmissionRequest, SubmissionResult, TxHash,
};

use crate::board::NotificationBoard;
use crate::staking::StakingReader;

/// Shown when the relay gives up on a submission.
pub const TIMEOUT_MESSAGE: &str = "transaction status unknown: tracking timed out";

/// Shared state behind the REST API.
pub struct RelayState {
    pub chain: Arc<dyn ChainClient>,
    pub staking: Arc<dyn StakingReader>,
    pub board: NotificationBoard,
    pub submissions: SubmissionStore,
    pub messages: NotificationMessages,
    pub network: Network,
    pub submission_timeout: Duration,
    /// How long finished submissions stay queryable.
    pub retention: Duration,
}

impl RelayState {
    /// Forget submissions and notifications that finished more than
    /// `retention` ago. Returns `(submissions, notifications)` removed.
    pub fn prune(&self) -> (usize, usize) {
        let cutoff = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        match cutoff {
            Some(cutoff) => (self.submissions.prune(cutoff), self.board.prune(cutoff)),
            None => (0, 0),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Pending,
    Resolved,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub id: u64,
    pub address: String,
    pub tx_hash: TxHash,
    pub submitted_at: DateTime<Utc>,
    pub state: SubmissionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SubmissionResult>,
    #[serde(skip)]
    pub notification: Option<NotificationHandle>,
}

#[derive(Default)]
pub struct SubmissionStore {
    next_id: AtomicU64,
    records: RwLock<HashMap<u64, SubmissionRecord>>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address: &str, tx_hash: TxHash) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.records.write().insert(
            id,
            SubmissionRecord {
                id,
                address: address.to_string(),
                tx_hash,
                submitted_at: Utc::now(),
                state: SubmissionState::Pending,
                finished_at: None,
                result: None,
                notification: None,
            },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<SubmissionRecord> {
        self.records.read().get(&id).cloned()
    }

    pub fn notification(&self, id: u64) -> Option<NotificationHandle> {
        self.records.read().get(&id).and_then(|r| r.notification)
    }

    fn attach_notification(&self, id: u64, handle: NotificationHandle) {
        if let Some(record) = self.records.write().get_mut(&id) {
            record.notification = Some(handle);
        }
    }

    fn finish(&self, id: u64, state: SubmissionState, result: Option<SubmissionResult>) {
        if let Some(record) = self.records.write().get_mut(&id) {
            record.state = state;
            record.finished_at = Some(Utc::now());
            record.result = result;
        }
    }

    /// Drop finished records that ended at or before `cutoff`.
    fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| r.finished_at.map_or(true, |at| at > cutoff));
        before - records.len()
    }
}

// ─────────────────────────────────────────────────────────
// Tracking
// ─────────────────────────────────────────────────────────

/// Board view scoped to one submission: remembers which notification the
/// tracker created for it.
struct SubmissionSink<'a> {
    board: &'a NotificationBoard,
    submissions: &'a SubmissionStore,
    id: u64,
}

impl NotificationSink for SubmissionSink<'_> {
    fn create(&self, title: &str, message: &str, phase: Phase) -> NotificationHandle {
        let handle = self.board.create(title, message, phase);
        self.submissions.attach_notification(self.id, handle);
        handle
    }

    fn update(&self, handle: NotificationHandle, message: &str, phase: Phase) {
        self.board.update(handle, message, phase);
    }

    fn resolve_success(&self, handle: NotificationHandle, message: &str) {
        self.board.resolve_success(handle, message);
    }

    fn resolve_error(&self, handle: NotificationHandle, message: &str) {
        self.board.resolve_error(handle, message);
    }
}

/// Register a submission and start tracking it in the background.
/// Returns the submission id and the extrinsic hash.
pub fn submit(state: &Arc<RelayState>, extrinsic: SignedExtrinsic, address: String) -> (u64, TxHash) {
    let tx_hash = extrinsic.hash();
    let id = state.submissions.insert(&address, tx_hash);
    info!(id, %tx_hash, "Accepted submission");

    let request = SubmissionRequest::new(extrinsic, address).with_messages(state.messages.clone());
    tokio::spawn(run(state.clone(), id, request));
    (id, tx_hash)
}

/// Track one submission to completion or timeout.
pub async fn run(state: Arc<RelayState>, id: u64, request: SubmissionRequest) {
    let sink = SubmissionSink {
        board: &state.board,
        submissions: &state.submissions,
        id,
    };
    let tracked = track(
        Some(state.chain.as_ref()),
        Some(&PreSigned as &dyn Signer),
        &sink,
        request,
    );

    match tokio::time::timeout(state.submission_timeout, tracked).await {
        Ok(result) => {
            info!(id, success = result.is_success(), "Submission resolved");
            state
                .submissions
                .finish(id, SubmissionState::Resolved, Some(result));
        }
        Err(_) => {
            warn!(id, "Submission timed out after {:?}", state.submission_timeout);
            if let Some(handle) = state.submissions.notification(id) {
                state.board.fail_open(handle, TIMEOUT_MESSAGE);
            }
            state.submissions.finish(id, SubmissionState::TimedOut, None);
        }
    }
}

/// Prune finished work every `every`, for the life of the relay.
pub fn spawn_pruner(state: Arc<RelayState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let (submissions, notifications) = state.prune();
            if submissions + notifications > 0 {
                debug!(submissions, notifications, "Pruned finished submissions");
            }
        }
    })
}
