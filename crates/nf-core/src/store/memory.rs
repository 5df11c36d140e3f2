//! In-memory flow store.
//!
//! Backs tests and the CLI's JSONL ingestion path. Holds every record in a
//! Vec and aggregates signatures on demand; fine up to a few hundred
//! thousand flows, beyond that a real store belongs behind the trait.

use crate::store::FlowStore;
use nf_common::{Error, FlowId, FlowRecord, PortCategory, Result, StateSignature};
use std::collections::BTreeMap;
use std::io::BufRead;

#[derive(Debug, Default)]
pub struct MemoryFlowStore {
    records: Vec<FlowRecord>,
    assignments: BTreeMap<FlowId, usize>,
    state_column: bool,
}

impl MemoryFlowStore {
    pub fn new(records: Vec<FlowRecord>) -> Self {
        Self {
            records,
            assignments: BTreeMap::new(),
            state_column: false,
        }
    }

    /// Load one `FlowRecord` JSON object per line.
    pub fn from_jsonl(reader: impl BufRead) -> Result<Self> {
        let mut records = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: FlowRecord = serde_json::from_str(&line).map_err(|e| {
                Error::Store(format!("line {}: {e}", lineno + 1))
            })?;
            records.push(record);
        }
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current label of a flow, if assigned.
    pub fn state_of(&self, id: FlowId) -> Option<usize> {
        self.assignments.get(&id).copied()
    }
}

impl FlowStore for MemoryFlowStore {
    /// Deterministic stride sample over insertion order.
    fn extract_flows(&self, sample_size: usize) -> Result<Vec<FlowRecord>> {
        if sample_size == 0 {
            return Err(Error::Store("sample_size must be positive".into()));
        }
        if self.records.len() <= sample_size {
            return Ok(self.records.clone());
        }
        let stride = self.records.len().div_ceil(sample_size);
        Ok(self.records.iter().step_by(stride).cloned().collect())
    }

    fn ensure_state_column(&mut self) -> Result<()> {
        self.state_column = true;
        Ok(())
    }

    fn write_state_assignments(&mut self, assignments: &BTreeMap<FlowId, usize>) -> Result<()> {
        if !self.state_column {
            return Err(Error::Store("state column has not been created".into()));
        }
        for (id, state) in assignments {
            self.assignments.insert(*id, *state);
        }
        Ok(())
    }

    fn state_signatures(&self) -> Result<Vec<StateSignature>> {
        let mut grouped: BTreeMap<usize, Vec<&FlowRecord>> = BTreeMap::new();
        for record in &self.records {
            if let Some(state) = self.assignments.get(&record.id) {
                grouped.entry(*state).or_default().push(record);
            }
        }

        let mut signatures = Vec::with_capacity(grouped.len());
        for (state, flows) in grouped {
            let n = flows.len() as f64;
            let mean_bytes_in = flows.iter().map(|f| f.bytes_in as f64).sum::<f64>() / n;
            let mean_bytes_out = flows.iter().map(|f| f.bytes_out as f64).sum::<f64>() / n;
            let mean_duration_ms = flows.iter().map(|f| f.duration_ms).sum::<f64>() / n;
            let mean_packets_per_sec = flows
                .iter()
                .map(|f| {
                    let packets = (f.packets_in + f.packets_out) as f64;
                    packets / (f.duration_ms / 1000.0).max(1e-3)
                })
                .sum::<f64>()
                / n;

            let mut protocol_dist: BTreeMap<String, f64> = BTreeMap::new();
            let mut port_category_dist: BTreeMap<String, f64> = BTreeMap::new();
            for flow in &flows {
                *protocol_dist
                    .entry(flow.protocol.name().to_string())
                    .or_insert(0.0) += 1.0;
                *port_category_dist
                    .entry(PortCategory::from_port(flow.dst_port).name().to_string())
                    .or_insert(0.0) += 1.0;
            }
            for count in protocol_dist.values_mut() {
                *count /= n;
            }
            for count in port_category_dist.values_mut() {
                *count /= n;
            }

            signatures.push(StateSignature {
                state,
                flow_count: flows.len() as u64,
                mean_bytes_in,
                mean_bytes_out,
                byte_ratio: mean_bytes_in / (mean_bytes_in + mean_bytes_out + 1.0),
                mean_duration_ms,
                mean_packets_per_sec,
                protocol_dist,
                port_category_dist,
            });
        }
        Ok(signatures)
    }
}
