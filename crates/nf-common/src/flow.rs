//! Flow identity, raw record, and per-state aggregate types.
//!
//! `FlowRecord` is the typed boundary between the flow store and the engine:
//! fields are validated once at ingestion, never accessed by string key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque row identifier, flows through from extraction to write-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FlowId {
    fn from(id: u64) -> Self {
        FlowId(id)
    }
}

/// Sequence grouping key, typically a destination address.
///
/// Rows sharing a group form one Markov chain; transition statistics are
/// never accumulated across a group boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport protocol of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

impl Protocol {
    /// Stable lowercase name used in distributions and output.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Other => "other",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Three-way destination-port classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortCategory {
    /// 0-1023.
    WellKnown,
    /// 1024-49151.
    Registered,
    /// 49152-65535.
    Ephemeral,
}

impl PortCategory {
    pub fn from_port(port: u16) -> Self {
        match port {
            0..=1023 => PortCategory::WellKnown,
            1024..=49151 => PortCategory::Registered,
            _ => PortCategory::Ephemeral,
        }
    }

    /// Ordinal code used as a feature value.
    pub fn code(&self) -> f64 {
        match self {
            PortCategory::WellKnown => 0.0,
            PortCategory::Registered => 1.0,
            PortCategory::Ephemeral => 2.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PortCategory::WellKnown => "well_known",
            PortCategory::Registered => "registered",
            PortCategory::Ephemeral => "ephemeral",
        }
    }
}

/// One raw network-flow row as pulled from the flow store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    pub id: FlowId,
    /// Sequence grouping key (e.g. destination address). Rows without a
    /// group are treated as one shared sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub duration_ms: f64,
    /// Mean inter-arrival time between packets within the flow.
    pub mean_iat_ms: f64,
    /// Gap since the previous flow to the same destination.
    pub gap_ms: f64,
    pub protocol: Protocol,
    pub dst_port: u16,
    /// Connection completed a handshake.
    pub established: bool,
    /// Connection was refused or reset.
    pub rejected: bool,
}

/// Per-state aggregate statistics computed by the flow store over the
/// just-written assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSignature {
    pub state: usize,
    pub flow_count: u64,
    pub mean_bytes_in: f64,
    pub mean_bytes_out: f64,
    /// Inbound share of total bytes, in [0, 1].
    pub byte_ratio: f64,
    pub mean_duration_ms: f64,
    pub mean_packets_per_sec: f64,
    /// Fraction of flows per protocol name.
    pub protocol_dist: BTreeMap<String, f64>,
    /// Fraction of flows per port category name.
    pub port_category_dist: BTreeMap<String, f64>,
}

/// A scored state signature: the engine's user-facing output shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateProfile {
    #[serde(flatten)]
    pub signature: StateSignature,
    /// Robust anomaly score in [0, 100], whole points.
    pub anomaly_score: f64,
    /// Up to 3 contributing metric names, largest contributor first.
    pub anomaly_factors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_category_boundaries() {
        assert_eq!(PortCategory::from_port(0), PortCategory::WellKnown);
        assert_eq!(PortCategory::from_port(443), PortCategory::WellKnown);
        assert_eq!(PortCategory::from_port(1024), PortCategory::Registered);
        assert_eq!(PortCategory::from_port(49151), PortCategory::Registered);
        assert_eq!(PortCategory::from_port(49152), PortCategory::Ephemeral);
        assert_eq!(PortCategory::from_port(65535), PortCategory::Ephemeral);
    }

    #[test]
    fn test_flow_record_json_round_trip() {
        let rec = FlowRecord {
            id: FlowId(7),
            group: Some(GroupId("10.0.0.5".into())),
            bytes_in: 1200,
            bytes_out: 340,
            packets_in: 10,
            packets_out: 6,
            duration_ms: 250.0,
            mean_iat_ms: 25.0,
            gap_ms: 1000.0,
            protocol: Protocol::Tcp,
            dst_port: 443,
            established: true,
            rejected: false,
        };
        let json = serde_json::to_string(&rec).unwrap();
        let back: FlowRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, rec.id);
        assert_eq!(back.group, rec.group);
        assert_eq!(back.protocol, Protocol::Tcp);
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(Protocol::Tcp.name(), "tcp");
        assert_eq!(Protocol::Other.to_string(), "other");
    }
}
