//! BIC model-order selection.
//!
//! Sweeps a candidate state-count range with cheap fits (small iteration
//! cap, loose tolerance) and keeps the lowest BIC. The sweep stops early
//! after `bic_patience` consecutive non-improving candidates; that is a
//! cost/quality tradeoff for interactive use, not a correctness requirement.
//! Subsampling uses deterministic striding so the seeded K-means++ PRNG
//! stays the pipeline's only randomness source.

use crate::config::EngineConfig;
use crate::model::hmm::{FitOptions, GaussianHmm};
use nf_common::{Error, Result};

/// One evaluated candidate.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CandidateScore {
    pub n_states: usize,
    pub bic: f64,
    pub log_likelihood: f64,
}

/// Result of a sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// Best (lowest-BIC) state count found.
    pub n_states: usize,
    pub bic: f64,
    pub candidates: Vec<CandidateScore>,
}

/// Deterministic stride subsample, capped at `cap` rows.
fn stride_subsample(rows: &[Vec<f64>], cap: usize) -> Vec<Vec<f64>> {
    let stride = rows.len().div_ceil(cap);
    rows.iter().step_by(stride).cloned().collect()
}

/// Pick a state count for the data by sweeping BIC over candidate counts.
pub fn select_order(rows: &[Vec<f64>], config: &EngineConfig) -> Result<SweepOutcome> {
    if rows.is_empty() {
        return Err(Error::EmptyMatrix);
    }
    let dim = rows[0].len();

    let sample: Vec<Vec<f64>>;
    let data = if rows.len() > config.sweep_subsample_threshold {
        sample = stride_subsample(rows, config.sweep_subsample_cap);
        &sample[..]
    } else {
        rows
    };
    let sequences = vec![data.to_vec()];

    let opts = FitOptions {
        max_iterations: config.sweep_max_iterations,
        tolerance: config.sweep_tolerance,
    };

    let mut best: Option<(usize, f64)> = None;
    let mut candidates = Vec::new();
    let mut non_improving = 0usize;

    for k in config.sweep_min_states..=config.sweep_max_states {
        if k > data.len() {
            break;
        }
        let mut model = GaussianHmm::new(k, dim, config)?;
        let summary = model.fit(&sequences, &opts)?;
        let bic = model.bic(summary.log_likelihood, data.len())?;
        tracing::debug!(k, bic, log_likelihood = summary.log_likelihood, "sweep candidate");
        candidates.push(CandidateScore {
            n_states: k,
            bic,
            log_likelihood: summary.log_likelihood,
        });

        match best {
            Some((_, best_bic)) if bic >= best_bic => {
                non_improving += 1;
                if non_improving >= config.bic_patience {
                    break;
                }
            }
            _ => {
                best = Some((k, bic));
                non_improving = 0;
            }
        }
    }

    let (n_states, bic) = best.ok_or_else(|| {
        Error::Training("model-order sweep produced no candidates".into())
    })?;
    Ok(SweepOutcome {
        n_states,
        bic,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated Gaussian clusters, 20 points each.
    fn two_cluster_rows() -> Vec<Vec<f64>> {
        let mut rows = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f64 * 0.1;
            rows.push(vec![jitter, jitter * 0.5]);
        }
        for i in 0..20 {
            let jitter = (i % 5) as f64 * 0.1;
            rows.push(vec![10.0 + jitter, 10.0 - jitter * 0.5]);
        }
        rows
    }

    #[test]
    fn selects_two_states_for_two_clusters() {
        let outcome = select_order(&two_cluster_rows(), &EngineConfig::default()).unwrap();
        assert_eq!(outcome.n_states, 2);
    }

    #[test]
    fn early_stop_bounds_candidate_count() {
        let config = EngineConfig::default();
        let outcome = select_order(&two_cluster_rows(), &config).unwrap();
        // Best at 2, patience 2: the sweep must not run the full range.
        assert!(outcome.candidates.len() < config.sweep_max_states - config.sweep_min_states + 1);
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            select_order(&[], &EngineConfig::default()),
            Err(Error::EmptyMatrix)
        ));
    }

    #[test]
    fn stride_subsample_caps_rows() {
        let rows: Vec<Vec<f64>> = (0..25_000).map(|i| vec![i as f64]).collect();
        let sample = stride_subsample(&rows, 10_000);
        assert!(sample.len() <= 10_000);
        assert_eq!(sample[0], vec![0.0]);
    }

    #[test]
    fn candidates_never_exceed_sample_size() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let outcome = select_order(&rows, &EngineConfig::default()).unwrap();
        assert!(outcome.candidates.iter().all(|c| c.n_states <= 6));
    }
}
