//! # tx_tracker
//!
//! Tracks a signed Substrate extrinsic from the moment it is handed to the
//! signer until the chain finalizes it (or the attempt fails), driving a
//! single user-facing notification along the way.
//!
//! | Phase      | Chain status that enters it | Notification            |
//! |------------|-----------------------------|-------------------------|
//! | Signing    | (submission starts)         | `1/3` waiting signature |
//! | Entering   | `ready`                     | `2/3` entering a block  |
//! | Finalizing | `inBlock`                   | `3/3` finalizing        |
//! | Success    | `finalized`, no error       | success                 |
//! | Error      | anything that fails         | decoded error message   |
//!
//! The tracker itself never touches the network. It consumes three
//! capabilities: a [`ChainClient`], a [`Signer`] and a [`NotificationSink`].
//!
//! The crate also carries the staking arithmetic shared by the UI and the
//! relay: [`Network`] token units, [`Conviction`] lock periods and
//! [`RewardEstimator`].

mod conviction;
mod dispatch;
mod errors;
mod machine;
mod network;
mod notify;
mod rewards;
mod status;
mod tracker;
mod types;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;


pub use conviction::{Conviction, LOCK_PERIOD_DAYS};
pub use dispatch::{
    describe, DispatchOutcome, MetadataRegistry, ModuleError, ModuleErrorDetails, StaticRegistry,
    UNKNOWN_ERROR,
};
pub use errors::{ChainError, Result, SignerError};
pub use machine::{IllegalTransition, TrackerState};
pub use network::Network;
pub use notify::{NotificationHandle, NotificationMessages, NotificationSink, Phase};
pub use rewards::{RewardEstimate, RewardEstimator, COMPOUNDS_PER_DAY, DEFAULT_APY};
pub use status::{LifecycleEvent, LifecycleStatus};
pub use tracker::{
    track, ChainClient, LifecycleStream, PreSigned, Signer, MISSING_PRECONDITIONS,
};
pub use types::{
    BlockHash, ChainEvent, Failure, FailureKind, Header, Receipt, SignedExtrinsic,
    SubmissionRequest, SubmissionResult, TxHash, H256,
};
