//! User-facing progress notifications.
//!
//! One notification exists per submission. The tracker creates it when the
//! extrinsic is handed to the signer, replaces its content in place as the
//! lifecycle advances, and ends it in exactly one terminal state.

use serde::{Deserialize, Serialize};

/// Visual phase of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Signing,
    Entering,
    Finalizing,
    Success,
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Success | Phase::Error)
    }
}

/// Opaque reference to a notification owned by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationHandle(pub u64);

/// Text shown for each phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessages {
    pub title: String,
    pub signing: String,
    pub entering: String,
    pub finalizing: String,
    pub success: String,
    pub error: String,
}

impl Default for NotificationMessages {
    fn default() -> Self {
        NotificationMessages {
            title: "Processing transaction".to_string(),
            signing: "1/3 Waiting for signature".to_string(),
            entering: "2/3 Waiting for the transaction to be included in a block".to_string(),
            finalizing: "3/3 Waiting for block finalization".to_string(),
            success: "Transaction successful".to_string(),
            error: "Oh no!".to_string(),
        }
    }
}

impl NotificationMessages {
    /// Texts of the Polkadot Hungary staking UI.
    pub fn hungarian() -> Self {
        NotificationMessages {
            title: "Tranzakció feldolgozása".to_string(),
            signing: "1/3 Aláírásra vár".to_string(),
            entering: "2/3 Várj amíg a tranzakciót felveszi egy blokk".to_string(),
            finalizing: "3/3 Blokk végelesítésre vár".to_string(),
            success: "Sikeres tranzakció".to_string(),
            error: "Óh jaj!".to_string(),
        }
    }

    /// Pick a preset by locale tag (`hu`, `en`).
    pub fn for_locale(locale: &str) -> Option<Self> {
        match locale.trim().to_ascii_lowercase().as_str() {
            "hu" | "hu-hu" => Some(Self::hungarian()),
            "en" | "en-us" | "en-gb" => Some(Self::default()),
            _ => None,
        }
    }

    pub fn for_phase(&self, phase: Phase) -> &str {
        match phase {
            Phase::Signing => &self.signing,
            Phase::Entering => &self.entering,
            Phase::Finalizing => &self.finalizing,
            Phase::Success => &self.success,
            Phase::Error => &self.error,
        }
    }
}

/// Presentation-layer capability the tracker drives.
///
/// Implementations own the visual element; the tracker only holds the
/// handle. Sinks must not fail the submission: delivery problems are theirs
/// to log.
pub trait NotificationSink: Send + Sync {
    fn create(&self, title: &str, message: &str, phase: Phase) -> NotificationHandle;

    fn update(&self, handle: NotificationHandle, message: &str, phase: Phase);

    fn resolve_success(&self, handle: NotificationHandle, message: &str);

    fn resolve_error(&self, handle: NotificationHandle, message: &str);
}
