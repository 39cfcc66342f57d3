//! The submission driver.
//!
//! [`track`] owns one submission from start to finish: it checks the
//! preconditions, hands the extrinsic to the chain client, feeds every
//! lifecycle event through [`TrackerState::advance`], keeps the notification
//! in step with the state and resolves to one [`SubmissionResult`].
//!
//! The notification is raised once the node is ready: a node that never
//! becomes ready fails the submission without one.
//!
//! The driver is purely reactive. Its only suspension points are the
//! readiness wait, each lifecycle event and the header fetch at inclusion.
//! If the subscription ends without a terminal status, `track` never
//! resolves; callers bound it with their own timeout.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::dispatch::MetadataRegistry;
use crate::errors::{ChainError, Result, SignerError};
use crate::machine::TrackerState;
use crate::notify::{NotificationHandle, NotificationMessages, NotificationSink, Phase};
use crate::status::LifecycleEvent;
use crate::types::{
    BlockHash, Failure, FailureKind, Header, SignedExtrinsic, SubmissionRequest, SubmissionResult,
};

/// Message for the precondition failure.
pub const MISSING_PRECONDITIONS: &str = "missing API, signer, or address";

/// Lifecycle updates for one watched extrinsic.
pub type LifecycleStream = BoxStream<'static, Result<LifecycleEvent>>;

/// Connection to a Substrate node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Resolves once the client can submit extrinsics.
    async fn wait_ready(&self) -> Result<()>;

    async fn block_header(&self, block: &BlockHash) -> Result<Header>;

    /// Sign `extrinsic` for `address` through `signer`, submit it and
    /// subscribe to its lifecycle.
    async fn sign_and_watch(
        &self,
        extrinsic: &SignedExtrinsic,
        signer: &dyn Signer,
        address: &str,
    ) -> Result<LifecycleStream>;

    fn registry(&self) -> &dyn MetadataRegistry;
}

/// `sign(payload) -> signature`.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, address: &str, payload: &[u8]) -> std::result::Result<Vec<u8>, SignerError>;
}

/// Signer for payloads a wallet extension has already signed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreSigned;

#[async_trait]
impl Signer for PreSigned {
    async fn sign(&self, _address: &str, payload: &[u8]) -> std::result::Result<Vec<u8>, SignerError> {
        Ok(payload.to_vec())
    }
}

/// Track one submission to its terminal result.
pub async fn track(
    chain: Option<&dyn ChainClient>,
    signer: Option<&dyn Signer>,
    sink: &dyn NotificationSink,
    request: SubmissionRequest,
) -> SubmissionResult {
    let (chain, signer) = match (chain, signer) {
        (Some(chain), Some(signer)) if !request.address.trim().is_empty() => (chain, signer),
        _ => {
            warn!("Refusing submission: {MISSING_PRECONDITIONS}");
            return SubmissionResult::Failure(Failure::new(
                FailureKind::PreconditionMissing,
                MISSING_PRECONDITIONS,
            ));
        }
    };

    let tx_hash = request.extrinsic.hash();
    if let Err(e) = chain.wait_ready().await {
        error!(%tx_hash, "Node not ready: {e}");
        return SubmissionResult::Failure(threw(e));
    }

    let messages = request.messages.clone().unwrap_or_default();
    info!(%tx_hash, address = %request.address, "Submitting extrinsic");

    let mut driver = Driver {
        chain,
        signer,
        sink,
        handle: sink.create(&messages.title, &messages.signing, Phase::Signing),
        messages: &messages,
        shown: Phase::Signing,
    };

    let terminal = match driver
        .run(&request, TrackerState::AwaitingSignature { tx_hash })
        .await
    {
        Some(state) => state,
        None => {
            warn!(%tx_hash, "Lifecycle stream ended before a terminal status");
            futures::future::pending::<TrackerState>().await
        }
    };

    driver.resolve(terminal)
}

/// Per-submission context: capabilities plus the notification it owns.
struct Driver<'a> {
    chain: &'a dyn ChainClient,
    signer: &'a dyn Signer,
    sink: &'a dyn NotificationSink,
    handle: NotificationHandle,
    messages: &'a NotificationMessages,
    shown: Phase,
}

impl Driver<'_> {
    /// Drive `state` until it is terminal. `None` when the stream runs dry first.
    async fn run(
        &mut self,
        request: &SubmissionRequest,
        mut state: TrackerState,
    ) -> Option<TrackerState> {
        let mut stream = match self
            .chain
            .sign_and_watch(&request.extrinsic, self.signer, &request.address)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                error!("Sign and submit failed: {e}");
                return Some(state.fail(threw(e)));
            }
        };

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    error!("Lifecycle stream error: {e}");
                    return Some(state.fail(threw(e)));
                }
            };
            debug!(
                state = state.name(),
                status = event.status.name(),
                "Transaction status"
            );

            state = match state.advance(event, self.chain.registry()) {
                Ok(next) => next,
                Err(illegal) => {
                    warn!("Illegal lifecycle transition: {illegal}");
                    TrackerState::Failed(illegal.into())
                }
            };

            if let Some(block) = state.pending_header() {
                state = match self.chain.block_header(&block).await {
                    Ok(header) => {
                        debug!(%block, number = header.number, "Included in block");
                        state.with_header(header)
                    }
                    Err(e) => state.fail(threw(e)),
                };
            }

            if state.is_terminal() {
                return Some(state);
            }
            self.show(&state);
        }

        None
    }

    /// Update the notification when the phase changed.
    fn show(&mut self, state: &TrackerState) {
        if let Some(phase) = state.phase() {
            if phase != self.shown {
                self.sink
                    .update(self.handle, self.messages.for_phase(phase), phase);
                self.shown = phase;
            }
        }
    }

    fn resolve(self, state: TrackerState) -> SubmissionResult {
        match state {
            TrackerState::Succeeded(receipt) => {
                info!(
                    tx_hash = %receipt.tx_hash,
                    block = %receipt.finalized_block,
                    "Transaction finalized"
                );
                self.sink.resolve_success(self.handle, &self.messages.success);
                SubmissionResult::Success(receipt)
            }
            TrackerState::Failed(failure) => {
                error!(
                    kind = failure.kind.as_str(),
                    "{}: {}", self.messages.error, failure.message
                );
                self.sink.resolve_error(self.handle, &failure.message);
                SubmissionResult::Failure(failure)
            }
            other => {
                // `run` only hands back terminal states.
                let failure = Failure::new(
                    FailureKind::OutOfOrder,
                    format!("tracker stopped while {}", other.name()),
                );
                self.sink.resolve_error(self.handle, &failure.message);
                SubmissionResult::Failure(failure)
            }
        }
    }
}

fn threw(err: ChainError) -> Failure {
    Failure::new(FailureKind::SubmissionThrew, err.to_string())
}
