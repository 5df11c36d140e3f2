//! Feature extraction from raw flow records.
//!
//! Converts each `FlowRecord` into a fixed-length 16-dimension observation
//! vector. Extraction happens once at ingestion; everything downstream works
//! on validated fixed-arity rows, never on loosely typed records.

pub mod scaler;

use nf_common::{FlowId, FlowRecord, GroupId, PortCategory};

/// Observation vector dimensionality.
pub const FEATURE_DIM: usize = 16;

/// Stable names of the 16 features, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "log_bytes_in",
    "log_bytes_out",
    "log_packets_in",
    "log_packets_out",
    "log_duration",
    "log_mean_iat",
    "byte_ratio",
    "packets_per_sec",
    "proto_tcp",
    "proto_udp",
    "proto_icmp",
    "port_category",
    "established",
    "rejected",
    "log_bytes_per_packet",
    "log_gap",
];

/// Extract the 16-dimension observation vector from one flow.
pub fn extract_features(rec: &FlowRecord) -> [f64; FEATURE_DIM] {
    let total_bytes = (rec.bytes_in + rec.bytes_out) as f64;
    let total_packets = (rec.packets_in + rec.packets_out) as f64;
    let duration_s = (rec.duration_ms / 1000.0).max(1e-3);

    let byte_ratio = rec.bytes_in as f64 / (total_bytes + 1.0);
    let packets_per_sec = total_packets / duration_s;
    let bytes_per_packet = total_bytes / total_packets.max(1.0);

    [
        (rec.bytes_in as f64).ln_1p(),
        (rec.bytes_out as f64).ln_1p(),
        (rec.packets_in as f64).ln_1p(),
        (rec.packets_out as f64).ln_1p(),
        rec.duration_ms.max(0.0).ln_1p(),
        rec.mean_iat_ms.max(0.0).ln_1p(),
        byte_ratio,
        packets_per_sec,
        f64::from(rec.protocol == nf_common::Protocol::Tcp),
        f64::from(rec.protocol == nf_common::Protocol::Udp),
        f64::from(rec.protocol == nf_common::Protocol::Icmp),
        PortCategory::from_port(rec.dst_port).code(),
        f64::from(rec.established),
        f64::from(rec.rejected),
        bytes_per_packet.ln_1p(),
        rec.gap_ms.max(0.0).ln_1p(),
    ]
}

/// An ordered sequence of observation vectors, one per input flow, with the
/// row and group identifiers carried alongside in the same order.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub rows: Vec<Vec<f64>>,
    pub ids: Vec<FlowId>,
    pub groups: Vec<Option<GroupId>>,
}

impl FeatureMatrix {
    /// Build the matrix from raw records, preserving row order.
    pub fn from_records(records: &[FlowRecord]) -> Self {
        let mut rows = Vec::with_capacity(records.len());
        let mut ids = Vec::with_capacity(records.len());
        let mut groups = Vec::with_capacity(records.len());
        for rec in records {
            rows.push(extract_features(rec).to_vec());
            ids.push(rec.id);
            groups.push(rec.group.clone());
        }
        Self { rows, ids, groups }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
