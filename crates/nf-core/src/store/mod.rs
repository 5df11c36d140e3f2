//! Flow-store boundary.
//!
//! The engine never talks to storage directly; everything goes through
//! `FlowStore`. Implementations own row identity, sampling, the state
//! column, and per-state aggregation, so the engine stays storage-agnostic.

pub mod memory;

pub use memory::MemoryFlowStore;

use nf_common::{FlowId, FlowRecord, Result, StateSignature};
use std::collections::BTreeMap;

/// Storage-side operations the discovery pipeline needs.
pub trait FlowStore {
    /// Pull up to `sample_size` flow rows. Sampling must be deterministic
    /// for a given store state; the engine relies on repeatable runs.
    fn extract_flows(&self, sample_size: usize) -> Result<Vec<FlowRecord>>;

    /// Make sure the destination for state labels exists. Idempotent.
    fn ensure_state_column(&mut self) -> Result<()>;

    /// Persist one state label per flow. Rows absent from the map keep
    /// their previous label.
    fn write_state_assignments(&mut self, assignments: &BTreeMap<FlowId, usize>) -> Result<()>;

    /// Aggregate per-state signatures over the current assignments,
    /// ordered by state index.
    fn state_signatures(&self) -> Result<Vec<StateSignature>>;
}
