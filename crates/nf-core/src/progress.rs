//! Progress reporting for discovery runs.
//!
//! Lightweight structured updates for UI and agent consumers. Percentages
//! are non-decreasing over a run and reach 100 at completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pipeline phase of a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scale,
    SelectOrder,
    Fit,
    Decode,
    Score,
}

/// Structured progress update for callback consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    /// Overall run completion, 0-100.
    pub percent: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProgressUpdate {
    pub fn new(phase: Phase, percent: u8) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"error":"serialization_failed","percent":{}}}"#, self.percent)
        })
    }
}

/// Callback receiving progress updates on the caller's thread.
///
/// Sinks must be well-behaved: they run inline while the training channel
/// is drained, so a panicking sink propagates to the caller (the worker
/// itself is unaffected).
pub type ProgressSink = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_update_jsonl() {
        let update = ProgressUpdate::new(Phase::Fit, 42).with_detail("iteration 3");
        let json = update.to_jsonl();
        assert!(json.contains(r#""phase":"fit""#));
        assert!(json.contains(r#""percent":42"#));
        assert!(json.contains("iteration 3"));
    }

    #[test]
    fn test_percent_clamped() {
        let update = ProgressUpdate::new(Phase::Score, 250);
        assert_eq!(update.percent, 100);
    }
}
