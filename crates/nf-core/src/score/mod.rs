//! MAD-robust anomaly scoring of discovered states.
//!
//! Each state is compared against its peers on a small set of behavioral
//! metrics. Robust z-scores (median/MAD) keep one extreme state from
//! dragging the baseline toward itself, which a mean/stddev baseline would.
//! Scores land on a 0-100 scale with the metrics driving the score reported
//! as factors.

use nf_common::{StateProfile, StateSignature};
use nf_math::{median, robust_scale};

/// Metrics compared across states. Order fixes factor naming.
const METRICS: [&str; 4] = [
    "byte_ratio",
    "mean_duration_ms",
    "mean_packets_per_sec",
    "protocol_skew",
];

/// Z-score above which a metric is reported as an anomaly factor.
const FACTOR_THRESHOLD: f64 = 1.5;

/// Reported factors are capped at the top few; beyond that the list stops
/// being informative.
const MAX_FACTORS: usize = 3;

/// Scale floor for degenerate metrics where MAD collapses to zero.
const MIN_SCALE: f64 = 1e-9;

fn metric_values(sig: &StateSignature) -> [f64; 4] {
    // Protocol skew: how concentrated the state's traffic is on a single
    // protocol. 1.0 means pure, 1/n means uniform.
    let protocol_skew = sig
        .protocol_dist
        .values()
        .copied()
        .fold(0.0f64, f64::max);
    [
        sig.byte_ratio,
        sig.mean_duration_ms,
        sig.mean_packets_per_sec,
        protocol_skew,
    ]
}

/// Score every state against its peers.
///
/// With fewer than two states there is no peer group; every state scores
/// zero with no factors.
pub fn score_states(signatures: Vec<StateSignature>) -> Vec<StateProfile> {
    if signatures.len() < 2 {
        return signatures
            .into_iter()
            .map(|signature| StateProfile {
                signature,
                anomaly_score: 0.0,
                anomaly_factors: Vec::new(),
            })
            .collect();
    }

    let per_state: Vec<[f64; 4]> = signatures.iter().map(metric_values).collect();

    // Per-metric robust baselines across the peer group. Constant columns
    // are marked so they never contribute a z-score, floor or not.
    let mut baselines = [(0.0f64, MIN_SCALE, true); 4];
    for (m, baseline) in baselines.iter_mut().enumerate() {
        let column: Vec<f64> = per_state.iter().map(|v| v[m]).collect();
        let med = median(&column).unwrap_or(0.0);
        let scale = robust_scale(&column, med, MIN_SCALE).unwrap_or(MIN_SCALE);
        let constant = column.iter().all(|v| *v == column[0]);
        *baseline = (med, scale, constant);
    }

    signatures
        .into_iter()
        .zip(per_state)
        .map(|(signature, values)| {
            let mut z_scores = [0.0f64; 4];
            for (m, z) in z_scores.iter_mut().enumerate() {
                let (med, scale, constant) = baselines[m];
                if !constant {
                    *z = (values[m] - med).abs() / scale;
                }
            }

            let mean_z = z_scores.iter().sum::<f64>() / z_scores.len() as f64;
            let anomaly_score = (mean_z * 25.0).min(100.0).round();

            let mut flagged: Vec<(f64, &str)> = z_scores
                .iter()
                .zip(METRICS.iter())
                .filter(|(z, _)| **z >= FACTOR_THRESHOLD)
                .map(|(z, name)| (*z, *name))
                .collect();
            flagged.sort_by(|a, b| b.0.total_cmp(&a.0));
            flagged.truncate(MAX_FACTORS);

            StateProfile {
                signature,
                anomaly_score,
                anomaly_factors: flagged.into_iter().map(|(_, name)| name.to_string()).collect(),
            }
        })
        .collect()
}
