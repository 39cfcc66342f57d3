//! Dispatch-error decoding.
//!
//! The chain layer hands over a dispatch error exactly once, as a closed
//! [`DispatchOutcome`]. Module errors are resolved against the chain's
//! metadata through a [`MetadataRegistry`]; anything else is reported by its
//! own description.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Message used when a module error cannot be resolved.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Error raised by a specific pallet: `index` is the pallet index in the
/// runtime, `error` the variant index within that pallet's error enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleError {
    pub index: u8,
    pub error: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Module(ModuleError),
    /// `BadOrigin`, `CannotLookup`, token/arithmetic errors, …
    Other { description: String },
}

impl DispatchOutcome {
    pub fn module(index: u8, error: u8) -> Self {
        DispatchOutcome::Module(ModuleError { index, error })
    }

    pub fn other(description: impl Into<String>) -> Self {
        DispatchOutcome::Other {
            description: description.into(),
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(m) => write!(f, "Module {{ index: {}, error: {} }}", m.index, m.error),
            Self::Other { description } => f.write_str(description),
        }
    }
}

/// Human-readable metadata for one pallet error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleErrorDetails {
    /// Pallet name, e.g. `balances`.
    pub section: String,
    /// Variant name, e.g. `InsufficientBalance`.
    pub name: String,
    pub docs: Vec<String>,
}

/// Lookup of pallet errors in the chain's metadata.
pub trait MetadataRegistry: Send + Sync {
    fn find_meta_error(&self, error: &ModuleError) -> Option<ModuleErrorDetails>;
}

/// Turn a dispatch error into the message shown to the user.
pub fn describe(outcome: &DispatchOutcome, registry: &dyn MetadataRegistry) -> String {
    match outcome {
        DispatchOutcome::Module(module) => match registry.find_meta_error(module) {
            Some(details) if !details.docs.is_empty() => {
                tracing::debug!(
                    section = %details.section,
                    name = %details.name,
                    "Resolved module error {}:{}",
                    module.index,
                    module.error
                );
                details.docs.join(" ")
            }
            _ => {
                tracing::warn!(
                    "No metadata for module error {}:{}",
                    module.index,
                    module.error
                );
                UNKNOWN_ERROR.to_string()
            }
        },
        DispatchOutcome::Other { description } => description.clone(),
    }
}

// ─────────────────────────────────────────────────────────
// Static registry
// ─────────────────────────────────────────────────────────

/// One row of a module-error table as stored on disk.
#[derive(Debug, Clone, Deserialize)]
struct RegistryEntry {
    index: u8,
    error: u8,
    section: String,
    name: String,
    #[serde(default)]
    docs: Vec<String>,
}

/// Registry backed by a fixed table, typically exported from runtime
/// metadata ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    errors: HashMap<ModuleError, ModuleErrorDetails>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, index: u8, error: u8, details: ModuleErrorDetails) -> Self {
        self.insert(index, error, details);
        self
    }

    pub fn insert(&mut self, index: u8, error: u8, details: ModuleErrorDetails) {
        self.errors.insert(ModuleError { index, error }, details);
    }

    /// Parse a JSON array of `{index, error, section, name, docs}` rows.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let entries: Vec<RegistryEntry> = serde_json::from_str(raw)?;
        let mut registry = Self::new();
        for e in entries {
            registry.insert(
                e.index,
                e.error,
                ModuleErrorDetails {
                    section: e.section,
                    name: e.name,
                    docs: e.docs,
                },
            );
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl MetadataRegistry for StaticRegistry {
    fn find_meta_error(&self, error: &ModuleError) -> Option<ModuleErrorDetails> {
        self.errors.get(error).cloned()
    }
}
