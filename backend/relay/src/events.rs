//! Block events of one extrinsic.
//!
//! `System.Events` is read raw from storage and decoded against the runtime
//! metadata. The records emitted while applying our extrinsic become the
//! receipt's events; a `System.ExtrinsicFailed` among them carries the
//! dispatch error.

use codec::Decode;
use serde_json::{json, Value};
use subxt::events::{Events, Phase};
use subxt::{Metadata, PolkadotConfig};
use tx_tracker::{ChainEvent, DispatchOutcome, MetadataRegistry, ModuleError, ModuleErrorDetails};

use crate::errors::{RelayError, Result};

/// One record from `System.Events`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Index of the extrinsic that emitted the event; `None` during block
    /// initialization and finalization.
    pub extrinsic: Option<u32>,
    pub pallet: String,
    pub variant: String,
    pub fields: Value,
    /// SCALE-encoded fields, for typed decoding.
    pub field_bytes: Vec<u8>,
}

/// What an extrinsic left behind in its block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrinsicOutcome {
    pub events: Vec<ChainEvent>,
    pub dispatch_error: Option<DispatchOutcome>,
}

/// Decodes the raw value of `System.Events`.
pub trait EventDecoder: Send + Sync {
    fn decode_events(&self, bytes: Vec<u8>) -> Result<Vec<EventRecord>>;
}

// ─────────────────────────────────────────────────────────
// Runtime metadata
// ─────────────────────────────────────────────────────────

/// Metadata of the runtime the node runs, as served by `state_getMetadata`.
/// Decodes events and names pallet errors.
pub struct RuntimeMetadata {
    metadata: Metadata,
}

impl RuntimeMetadata {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let metadata = Metadata::decode(&mut &bytes[..])?;
        Ok(RuntimeMetadata { metadata })
    }
}

impl EventDecoder for RuntimeMetadata {
    fn decode_events(&self, bytes: Vec<u8>) -> Result<Vec<EventRecord>> {
        let events = Events::<PolkadotConfig>::decode_from(bytes, self.metadata.clone());
        events
            .iter()
            .map(|event| {
                let event = event.map_err(|e| RelayError::Events(e.to_string()))?;
                let extrinsic = match event.phase() {
                    Phase::ApplyExtrinsic(index) => Some(index),
                    _ => None,
                };
                let field_bytes = event.field_bytes().to_vec();
                let fields = match event.field_values() {
                    Ok(values) => json!(values.to_string()),
                    Err(_) => json!(format!("0x{}", hex::encode(&field_bytes))),
                };
                Ok(EventRecord {
                    extrinsic,
                    pallet: event.pallet_name().to_string(),
                    variant: event.variant_name().to_string(),
                    fields,
                    field_bytes,
                })
            })
            .collect()
    }
}

impl MetadataRegistry for RuntimeMetadata {
    fn find_meta_error(&self, error: &ModuleError) -> Option<ModuleErrorDetails> {
        let pallet = self.metadata.pallet_by_index(error.index)?;
        let variant = pallet.error_variant_by_index(error.error)?;
        Some(ModuleErrorDetails {
            section: section_name(pallet.name()),
            name: variant.name.clone(),
            docs: variant.docs.clone(),
        })
    }
}

// ─────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────

/// Events of the extrinsic at `index`, plus its dispatch error if it failed.
pub fn extrinsic_outcome(records: &[EventRecord], index: u32) -> Result<ExtrinsicOutcome> {
    let mut outcome = ExtrinsicOutcome::default();
    for record in records.iter().filter(|r| r.extrinsic == Some(index)) {
        if record.pallet == "System" && record.variant == "ExtrinsicFailed" {
            outcome.dispatch_error = Some(decode_dispatch_error(&record.field_bytes)?);
        }
        outcome.events.push(ChainEvent {
            section: section_name(&record.pallet),
            method: record.variant.clone(),
            data: record.fields.clone(),
        });
    }
    Ok(outcome)
}

/// `sp_runtime::DispatchError` as laid out on the wire. Only the variant
/// tags and the module error are needed; inner enums stay raw.
#[derive(Debug, Decode)]
enum RawDispatchError {
    Other,
    CannotLookup,
    BadOrigin,
    Module { index: u8, error: [u8; 4] },
    ConsumerRemaining,
    NoProviders,
    TooManyConsumers,
    Token(u8),
    Arithmetic(u8),
    Transactional(u8),
    Exhausted,
    Corruption,
    Unavailable,
    RootNotAllowed,
    Trie(u8),
}

const TOKEN_ERRORS: &[&str] = &[
    "FundsUnavailable",
    "OnlyProvider",
    "BelowMinimum",
    "CannotCreate",
    "UnknownAsset",
    "Frozen",
    "Unsupported",
    "CannotCreateHold",
    "NotExpendable",
    "Blocked",
];
const ARITHMETIC_ERRORS: &[&str] = &["Underflow", "Overflow", "DivisionByZero"];
const TRANSACTIONAL_ERRORS: &[&str] = &["LimitReached", "NoLayer"];

/// Decode the `dispatch_error` leading an `ExtrinsicFailed` event's fields.
pub fn decode_dispatch_error(field_bytes: &[u8]) -> Result<DispatchOutcome> {
    let raw = RawDispatchError::decode(&mut &field_bytes[..])?;
    let description = match raw {
        RawDispatchError::Module { index, error } => {
            return Ok(DispatchOutcome::module(index, error[0]))
        }
        RawDispatchError::Token(i) => nested("Token", TOKEN_ERRORS, i),
        RawDispatchError::Arithmetic(i) => nested("Arithmetic", ARITHMETIC_ERRORS, i),
        RawDispatchError::Transactional(i) => nested("Transactional", TRANSACTIONAL_ERRORS, i),
        RawDispatchError::Trie(i) => format!("Trie({i})"),
        other => format!("{other:?}"),
    };
    Ok(DispatchOutcome::other(description))
}

fn nested(outer: &str, names: &[&str], index: u8) -> String {
    match names.get(usize::from(index)) {
        Some(name) => format!("{outer}({name})"),
        None => format!("{outer}({index})"),
    }
}

/// `NominationPools` → `nominationPools`, the way wallets name sections.
fn section_name(pallet: &str) -> String {
    let mut chars = pallet.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
