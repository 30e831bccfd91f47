//! Heap tunables.
//!
//! Every limit the allocator, collector and property store consult lives here so
//! an embedder can adjust them per heap (or load them from JSON).

use crate::error::JsError;
use crate::prelude::*;
use serde::{Deserialize, Serialize};

/// Object count at which the hash index is materialized for a property part.
pub const DEFAULT_HASH_PROP_LIMIT: u32 = 32;

/// Configuration for one heap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Run mark-and-sweep periodically from the allocator.
    pub voluntary_gc: bool,
    /// Trigger reset after a pass: `(kept_objects + kept_strings) * mult / 256 + add`.
    pub gc_trigger_mult: u32,
    pub gc_trigger_add: u32,
    /// Trigger used when a voluntary pass was skipped because GC was not allowed.
    pub gc_trigger_skip: u32,
    /// Number of mark-and-sweep passes the allocator tries before giving up.
    pub alloc_retry_limit: u32,
    /// Attempts from `emergency_limit - 1` (zero based) run in emergency mode.
    pub emergency_limit: u32,
    /// Property parts with at least this many slots get a hash index.
    pub hash_prop_limit: u32,
    /// Array items are abandoned once `size > used * abandon_limit`.
    pub abandon_limit: u32,
    /// Maximum prototype chain walk before giving up.
    pub prototype_chain_sanity: u32,
    /// Hard cap on the entry count of a single property part.
    pub max_properties: u32,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            voluntary_gc: true,
            gc_trigger_mult: 12800,
            gc_trigger_add: 1024,
            gc_trigger_skip: 256,
            alloc_retry_limit: 5,
            emergency_limit: 3,
            hash_prop_limit: DEFAULT_HASH_PROP_LIMIT,
            abandon_limit: 2,
            prototype_chain_sanity: 10_000,
            max_properties: 0x7fff_ffff,
        }
    }
}

impl HeapConfig {
    /// Parse a (possibly partial) JSON configuration; missing fields keep defaults.
    pub fn from_json(text: &str) -> Result<Self, JsError> {
        serde_json::from_str(text)
            .map_err(|e| JsError::internal_error(format!("invalid heap config: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self)
            .map_err(|e| JsError::internal_error(format!("cannot serialize heap config: {}", e)))
    }

    /// Configuration for deterministic tests: no voluntary collection.
    pub fn without_voluntary_gc() -> Self {
        Self {
            voluntary_gc: false,
            ..Self::default()
        }
    }

    /// Trigger value for the next voluntary pass after a collection kept `kept` items.
    pub(crate) fn next_trigger(&self, kept: usize) -> i64 {
        let kept = i64::try_from(kept).unwrap_or(i64::MAX / 2);
        kept.saturating_mul(i64::from(self.gc_trigger_mult)) / 256
            + i64::from(self.gc_trigger_add)
    }
}
