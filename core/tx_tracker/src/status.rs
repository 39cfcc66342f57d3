//! Lifecycle statuses reported by the chain for a watched extrinsic.
//!
//! [`LifecycleStatus`] deserializes directly from the JSON the transaction
//! pool sends on `author_extrinsicUpdate`: unit statuses are bare strings
//! (`"ready"`), the rest are single-key objects (`{"inBlock": "0x…"}`).

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchOutcome;
use crate::types::{BlockHash, ChainEvent, TxHash};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleStatus {
    /// Waiting on an earlier nonce.
    Future,
    Ready,
    /// Gossiped to the listed peers.
    Broadcast(Vec<String>),
    InBlock(BlockHash),
    /// The inclusion block left the best chain.
    Retracted(BlockHash),
    FinalityTimeout(BlockHash),
    Finalized(BlockHash),
    /// Replaced by another extrinsic with the same nonce.
    Usurped(TxHash),
    Dropped,
    Invalid,
}

impl LifecycleStatus {
    /// Position in the `Ready → InBlock → Finalized` progression.
    /// `None` for statuses that carry no progress or end the stream.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Ready => Some(1),
            Self::InBlock(_) => Some(2),
            Self::Finalized(_) => Some(3),
            _ => None,
        }
    }

    /// Description for statuses that end the subscription without success.
    pub fn negative_terminal(&self) -> Option<String> {
        match self {
            Self::Dropped => Some("transaction was dropped from the pool".to_string()),
            Self::Invalid => Some("transaction is invalid".to_string()),
            Self::Usurped(by) => Some(format!("transaction was usurped by {by}")),
            Self::FinalityTimeout(block) => {
                Some(format!("finality timed out for block {block}"))
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Future => "future",
            Self::Ready => "ready",
            Self::Broadcast(_) => "broadcast",
            Self::InBlock(_) => "inBlock",
            Self::Retracted(_) => "retracted",
            Self::FinalityTimeout(_) => "finalityTimeout",
            Self::Finalized(_) => "finalized",
            Self::Usurped(_) => "usurped",
            Self::Dropped => "dropped",
            Self::Invalid => "invalid",
        }
    }
}

/// One update from the chain client's subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub status: LifecycleStatus,
    pub events: Vec<ChainEvent>,
    pub dispatch_error: Option<DispatchOutcome>,
    pub tx_hash: Option<TxHash>,
}

impl LifecycleEvent {
    pub fn new(status: LifecycleStatus) -> Self {
        LifecycleEvent {
            status,
            events: Vec::new(),
            dispatch_error: None,
            tx_hash: None,
        }
    }

    pub fn with_events(mut self, events: Vec<ChainEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_dispatch_error(mut self, outcome: DispatchOutcome) -> Self {
        self.dispatch_error = Some(outcome);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: TxHash) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

impl From<LifecycleStatus> for LifecycleEvent {
    fn from(status: LifecycleStatus) -> Self {
        LifecycleEvent::new(status)
    }
}
