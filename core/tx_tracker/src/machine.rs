//! # Submission state machine
//!
//! Each in-flight submission is exactly one [`TrackerState`]. The only way
//! to move between states is a transition function that consumes the
//! current state and returns the next one, so everything accumulated along
//! the way (transaction hash, inclusion block, header, event snapshot)
//! travels inside the state values.
//!
//! ```text
//! Idle ──► AwaitingSignature ──► Entering ──► InBlock ──► Succeeded
//!               │                   │           │  ▲
//!               │                   │           └──┘ re-inclusion
//!               └───────────────────┴───────────┴───► Failed
//! ```
//!
//! `Finalized` is not a resting state: the `finalized` status is inspected
//! on arrival and resolves straight into `Succeeded` or `Failed`.
//!
//! Statuses that skip a phase, and anything arriving after a terminal
//! state, are rejected with [`IllegalTransition`]. Stale statuses (a lower
//! phase than the current one) and statuses without progress (`future`,
//! `broadcast`, `retracted`) leave the state as it is.

use thiserror::Error;

use crate::dispatch::{describe, MetadataRegistry};
use crate::notify::Phase;
use crate::status::{LifecycleEvent, LifecycleStatus};
use crate::types::{BlockHash, ChainEvent, Failure, FailureKind, Header, Receipt, TxHash};

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    Idle,
    AwaitingSignature {
        tx_hash: TxHash,
    },
    Entering {
        tx_hash: TxHash,
    },
    InBlock {
        tx_hash: TxHash,
        block: BlockHash,
        /// Filled in once the driver has fetched it.
        header: Option<Header>,
        events: Vec<ChainEvent>,
    },
    Succeeded(Receipt),
    Failed(Failure),
}

/// A status that cannot follow the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status} received while {state}")]
pub struct IllegalTransition {
    pub state: &'static str,
    pub status: &'static str,
}

impl From<IllegalTransition> for Failure {
    fn from(err: IllegalTransition) -> Self {
        Failure::new(FailureKind::OutOfOrder, err.to_string())
    }
}

impl TrackerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingSignature { .. } => "awaiting_signature",
            Self::Entering { .. } => "entering",
            Self::InBlock { .. } => "in_block",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    /// Notification phase shown while in this state.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Idle => None,
            Self::AwaitingSignature { .. } => Some(Phase::Signing),
            Self::Entering { .. } => Some(Phase::Entering),
            Self::InBlock { .. } => Some(Phase::Finalizing),
            Self::Succeeded(_) => Some(Phase::Success),
            Self::Failed(_) => Some(Phase::Error),
        }
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::AwaitingSignature { tx_hash }
            | Self::Entering { tx_hash }
            | Self::InBlock { tx_hash, .. } => Some(*tx_hash),
            Self::Succeeded(receipt) => Some(receipt.tx_hash),
            Self::Idle | Self::Failed(_) => None,
        }
    }

    /// Block whose header still has to be fetched.
    pub fn pending_header(&self) -> Option<BlockHash> {
        match self {
            Self::InBlock {
                block,
                header: None,
                ..
            } => Some(*block),
            _ => None,
        }
    }

    /// `Idle → AwaitingSignature`.
    pub fn submit(self, tx_hash: TxHash) -> Result<Self, IllegalTransition> {
        match self {
            Self::Idle => Ok(Self::AwaitingSignature { tx_hash }),
            other => Err(IllegalTransition {
                state: other.name(),
                status: "submit",
            }),
        }
    }

    /// Store the header fetched for the current inclusion block.
    pub fn with_header(self, fetched: Header) -> Self {
        match self {
            Self::InBlock {
                tx_hash,
                block,
                events,
                ..
            } => Self::InBlock {
                tx_hash,
                block,
                header: Some(fetched),
                events,
            },
            other => other,
        }
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(self, failure: Failure) -> Self {
        if self.is_terminal() {
            self
        } else {
            Self::Failed(failure)
        }
    }

    /// Apply one lifecycle event.
    pub fn advance(
        self,
        event: LifecycleEvent,
        registry: &dyn MetadataRegistry,
    ) -> Result<Self, IllegalTransition> {
        let illegal = IllegalTransition {
            state: self.name(),
            status: event.status.name(),
        };

        let current_rank = match &self {
            Self::AwaitingSignature { .. } => 0,
            Self::Entering { .. } => 1,
            Self::InBlock { .. } => 2,
            Self::Idle | Self::Succeeded(_) | Self::Failed(_) => return Err(illegal),
        };
        let state = match event.tx_hash {
            Some(reported) => self.retag(reported),
            None => self,
        };

        if let Some(description) = event.status.negative_terminal() {
            return Ok(Self::Failed(Failure::new(
                FailureKind::NegativeTerminal,
                description,
            )));
        }

        let Some(rank) = event.status.rank() else {
            return Ok(state);
        };
        if rank < current_rank {
            return Ok(state);
        }
        if rank > current_rank + 1 {
            return Err(illegal);
        }

        let same_block = matches!(
            (&state, &event.status),
            (Self::InBlock { block: current, .. }, LifecycleStatus::InBlock(block)) if current == block
        );
        if same_block {
            return Ok(state);
        }

        match (state, event.status) {
            (
                Self::AwaitingSignature { tx_hash } | Self::Entering { tx_hash },
                LifecycleStatus::Ready,
            ) => Ok(Self::Entering { tx_hash }),
            (
                Self::Entering { tx_hash } | Self::InBlock { tx_hash, .. },
                LifecycleStatus::InBlock(block),
            ) => Ok(Self::InBlock {
                tx_hash,
                block,
                header: None,
                events: event.events,
            }),
            (
                Self::InBlock {
                    tx_hash,
                    header,
                    events: snapshot,
                    ..
                },
                LifecycleStatus::Finalized(finalized_block),
            ) => match event.dispatch_error {
                Some(outcome) => Ok(Self::Failed(Failure::new(
                    FailureKind::Dispatched,
                    describe(&outcome, registry),
                ))),
                None => {
                    let events = if event.events.is_empty() {
                        snapshot
                    } else {
                        event.events
                    };
                    Ok(Self::Succeeded(Receipt {
                        tx_hash,
                        finalized_block,
                        block_header: header,
                        events,
                    }))
                }
            },
            _ => Err(illegal),
        }
    }

    fn retag(self, reported: TxHash) -> Self {
        match self {
            Self::AwaitingSignature { .. } => Self::AwaitingSignature { tx_hash: reported },
            Self::Entering { .. } => Self::Entering { tx_hash: reported },
            Self::InBlock {
                block,
                header,
                events,
                ..
            } => Self::InBlock {
                tx_hash: reported,
                block,
                header,
                events,
            },
            other => other,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
