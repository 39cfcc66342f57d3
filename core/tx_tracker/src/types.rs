//! # Types
//!
//! Values flowing into and out of the tracker.
//!
//! - [`SubmissionRequest`]: immutable input, one per submission attempt.
//! - [`SubmissionResult`]: the single terminal value; either a [`Receipt`]
//!   or a [`Failure`].
//!
//! Hashes are carried as [`H256`] and serialized the way Substrate's
//! JSON-RPC prints them: `0x`-prefixed lowercase hex.

use std::fmt;
use std::str::FromStr;

use blake2::{digest::consts::U32, Blake2b, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::notify::NotificationMessages;

type Blake2b256 = Blake2b<U32>;

// ─────────────────────────────────────────────────────────
// Hashes
// ─────────────────────────────────────────────────────────

/// A 32-byte hash (block hash, extrinsic hash, state root, …).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct H256(pub [u8; 32]);

pub type BlockHash = H256;
pub type TxHash = H256;

impl H256 {
    /// blake2b-256 of `data`, the hash Substrate uses for extrinsics.
    pub fn blake2_256(data: &[u8]) -> Self {
        let digest = Blake2b256::digest(data);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        H256(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for H256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(strip_0x(s), &mut out)?;
        Ok(H256(out))
    }
}

impl Serialize for H256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Block numbers arrive as hex quantities (`"0x1b4"`).
mod hex_quantity {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        u64::from_str_radix(super::strip_0x(&raw), 16).map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────
// Chain data
// ─────────────────────────────────────────────────────────

/// Block header as returned by `chain_getHeader`. The digest is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub parent_hash: BlockHash,
    #[serde(with = "hex_quantity")]
    pub number: u64,
    pub state_root: H256,
    pub extrinsics_root: H256,
}

/// An on-chain event attributed to the submitted extrinsic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A signed, SCALE-encoded extrinsic. Opaque to the tracker.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedExtrinsic(Vec<u8>);

impl SignedExtrinsic {
    pub fn new(bytes: Vec<u8>) -> Self {
        SignedExtrinsic(bytes)
    }

    /// Parse `0x`-prefixed (or bare) hex as produced by wallet extensions.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(strip_0x(s.trim())).map(SignedExtrinsic)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn hash(&self) -> TxHash {
        H256::blake2_256(&self.0)
    }
}

impl fmt::Debug for SignedExtrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedExtrinsic({} bytes, {})", self.0.len(), self.hash())
    }
}

// ─────────────────────────────────────────────────────────
// Tracker input / output
// ─────────────────────────────────────────────────────────

/// One submission attempt.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub extrinsic: SignedExtrinsic,
    pub address: String,
    /// Falls back to [`NotificationMessages::default`] when absent.
    pub messages: Option<NotificationMessages>,
}

impl SubmissionRequest {
    pub fn new(extrinsic: SignedExtrinsic, address: impl Into<String>) -> Self {
        SubmissionRequest {
            extrinsic,
            address: address.into(),
            messages: None,
        }
    }

    pub fn with_messages(mut self, messages: NotificationMessages) -> Self {
        self.messages = Some(messages);
        self
    }
}

/// Proof that a submission was finalized without a dispatch error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub finalized_block: BlockHash,
    /// Header of the block the extrinsic was included in.
    pub block_header: Option<Header>,
    pub events: Vec<ChainEvent>,
}

/// Why a submission did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Chain client, signer or address was missing; nothing was submitted.
    PreconditionMissing,
    /// Signing, readiness, the subscription or a header fetch raised an error.
    SubmissionThrew,
    /// Finalized, but execution failed on-chain.
    Dispatched,
    /// Dropped, invalid, usurped or finality timeout.
    NegativeTerminal,
    /// The chain reported a status that skips a lifecycle phase.
    OutOfOrder,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreconditionMissing => "precondition_missing",
            Self::SubmissionThrew => "submission_threw",
            Self::Dispatched => "dispatched",
            Self::NegativeTerminal => "negative_terminal",
            Self::OutOfOrder => "out_of_order",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Failure {
            kind,
            message: message.into(),
        }
    }
}

/// Terminal value of one [`crate::track`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    Success(Receipt),
    Failure(Failure),
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SubmissionResult::Success(_) => None,
            SubmissionResult::Failure(f) => Some(f.kind),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
