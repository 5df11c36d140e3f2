//! Diagonal-covariance Gaussian Hidden Markov Model.
//!
//! Training is Baum-Welch (EM) with the forward and backward passes carried
//! out entirely in log-space via log-sum-exp; raw un-normalized
//! probabilities are never exponentiated. Decoding is log-space Viterbi with
//! deterministic first-maximum tie-breaking.
//!
//! Lifecycle: a model starts unfitted; decoding, BIC scoring, and
//! serialization all fail with `Error::NotFitted` until `fit` succeeds.

use crate::config::EngineConfig;
use crate::model::kmeans::kmeans_plus_plus;
use nf_common::{Error, Result};
use nf_math::{argmax, log_gaussian_diag, log_sum_exp};

/// Probability floor applied before taking logs, so serialization round
/// trips never produce -inf.
pub(crate) const PROB_FLOOR: f64 = 1e-12;

/// Occupancy below which a state is treated as unvisited in the M-step.
const OCCUPANCY_EPS: f64 = 1e-10;

/// Iteration cap and convergence tolerance for one fit call.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Absolute change in total log-likelihood below which EM stops,
    /// checked starting from the second iteration.
    pub tolerance: f64,
}

/// Outcome of a fit call.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct FitSummary {
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// K hidden states with diagonal Gaussian emissions over D features.
#[derive(Debug, Clone)]
pub struct GaussianHmm {
    n_states: usize,
    n_features: usize,
    variance_floor: f64,
    self_transition_prior: f64,
    kmeans_iterations: usize,
    seed: u64,
    pub(crate) means: Vec<Vec<f64>>,
    pub(crate) vars: Vec<Vec<f64>>,
    pub(crate) log_trans: Vec<Vec<f64>>,
    pub(crate) log_init: Vec<f64>,
    fitted: bool,
}

impl GaussianHmm {
    /// Create an unfitted model.
    pub fn new(n_states: usize, n_features: usize, config: &EngineConfig) -> Result<Self> {
        if n_states == 0 {
            return Err(Error::Config("n_states must be at least 1".into()));
        }
        if n_features == 0 {
            return Err(Error::Config("n_features must be at least 1".into()));
        }
        Ok(Self {
            n_states,
            n_features,
            variance_floor: config.variance_floor,
            self_transition_prior: config.self_transition_prior,
            kmeans_iterations: config.kmeans_iterations,
            seed: config.seed,
            means: Vec::new(),
            vars: Vec::new(),
            log_trans: Vec::new(),
            log_init: Vec::new(),
            fitted: false,
        })
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub(crate) fn mark_fitted(&mut self) {
        self.fitted = true;
    }

    fn check_sequences(&self, sequences: &[Vec<Vec<f64>>]) -> Result<usize> {
        let mut total = 0;
        for seq in sequences {
            for row in seq {
                if row.len() != self.n_features {
                    return Err(Error::DimensionMismatch {
                        expected: self.n_features,
                        got: row.len(),
                    });
                }
            }
            total += seq.len();
        }
        if total == 0 {
            return Err(Error::EmptyMatrix);
        }
        Ok(total)
    }

    /// "Sticky" transition matrix: high self-transition mass, the remainder
    /// split uniformly over the other states.
    fn initial_log_transitions(&self) -> Vec<Vec<f64>> {
        let k = self.n_states;
        if k == 1 {
            return vec![vec![0.0]];
        }
        let stay = self.self_transition_prior.ln();
        let leave = ((1.0 - self.self_transition_prior) / (k - 1) as f64).ln();
        (0..k)
            .map(|i| (0..k).map(|j| if i == j { stay } else { leave }).collect())
            .collect()
    }

    /// Log emission probabilities for every (time, state) pair of a sequence.
    fn emission_log_probs(&self, seq: &[Vec<f64>]) -> Vec<Vec<f64>> {
        seq.iter()
            .map(|row| {
                (0..self.n_states)
                    .map(|k| log_gaussian_diag(row, &self.means[k], &self.vars[k]))
                    .collect()
            })
            .collect()
    }

    /// Forward pass in log-space. Returns log-alpha and the sequence
    /// log-likelihood.
    fn forward(&self, log_b: &[Vec<f64>]) -> (Vec<Vec<f64>>, f64) {
        let t_len = log_b.len();
        let k = self.n_states;
        let mut log_alpha = vec![vec![0.0; k]; t_len];
        for j in 0..k {
            log_alpha[0][j] = self.log_init[j] + log_b[0][j];
        }
        let mut scratch = vec![0.0; k];
        for t in 1..t_len {
            for j in 0..k {
                for (i, s) in scratch.iter_mut().enumerate() {
                    *s = log_alpha[t - 1][i] + self.log_trans[i][j];
                }
                log_alpha[t][j] = log_sum_exp(&scratch) + log_b[t][j];
            }
        }
        let seq_ll = log_sum_exp(&log_alpha[t_len - 1]);
        (log_alpha, seq_ll)
    }

    /// Backward pass in log-space.
    fn backward(&self, log_b: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let t_len = log_b.len();
        let k = self.n_states;
        let mut log_beta = vec![vec![0.0; k]; t_len];
        let mut scratch = vec![0.0; k];
        for t in (0..t_len.saturating_sub(1)).rev() {
            for i in 0..k {
                for (j, s) in scratch.iter_mut().enumerate() {
                    *s = self.log_trans[i][j] + log_b[t + 1][j] + log_beta[t + 1][j];
                }
                log_beta[t][i] = log_sum_exp(&scratch);
            }
        }
        log_beta
    }

    /// Train with Baum-Welch over independent sequences.
    pub fn fit(&mut self, sequences: &[Vec<Vec<f64>>], opts: &FitOptions) -> Result<FitSummary> {
        self.fit_observed(sequences, opts, &mut |_, _| {})
    }

    /// Train, reporting `(iteration, max_iterations)` after each EM step.
    pub fn fit_observed(
        &mut self,
        sequences: &[Vec<Vec<f64>>],
        opts: &FitOptions,
        observer: &mut dyn FnMut(usize, usize),
    ) -> Result<FitSummary> {
        let total_obs = self.check_sequences(sequences)?;
        if total_obs < self.n_states {
            return Err(Error::Training(format!(
                "{} observations cannot support {} states",
                total_obs, self.n_states
            )));
        }

        // Initialization from pooled observations.
        let pooled: Vec<Vec<f64>> = sequences.iter().flatten().cloned().collect();
        let init = kmeans_plus_plus(
            &pooled,
            self.n_states,
            self.kmeans_iterations,
            self.variance_floor,
            self.seed,
        );
        self.means = init.means;
        self.vars = init.variances;
        self.log_init = vec![(1.0 / self.n_states as f64).ln(); self.n_states];
        self.log_trans = self.initial_log_transitions();

        let k = self.n_states;
        let dim = self.n_features;
        let active_seqs = sequences.iter().filter(|s| !s.is_empty()).count() as f64;

        let mut prev_ll: Option<f64> = None;
        let mut total_ll = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut converged = false;
        let mut scratch = vec![0.0; k * k];

        for iter in 0..opts.max_iterations {
            let mut init_acc = vec![0.0; k];
            let mut trans_acc = vec![vec![0.0; k]; k];
            let mut trans_denom = vec![0.0; k];
            let mut weight = vec![0.0; k];
            let mut weighted_x = vec![vec![0.0; dim]; k];
            let mut gammas: Vec<Vec<Vec<f64>>> = Vec::with_capacity(sequences.len());
            total_ll = 0.0;

            // E-step, per sequence.
            for seq in sequences {
                if seq.is_empty() {
                    gammas.push(Vec::new());
                    continue;
                }
                let log_b = self.emission_log_probs(seq);
                let (log_alpha, seq_ll) = self.forward(&log_b);
                let log_beta = self.backward(&log_b);
                total_ll += seq_ll;

                let t_len = seq.len();
                let mut gamma = vec![vec![0.0; k]; t_len];
                for t in 0..t_len {
                    let joint: Vec<f64> = (0..k)
                        .map(|j| log_alpha[t][j] + log_beta[t][j])
                        .collect();
                    let norm = log_sum_exp(&joint);
                    for j in 0..k {
                        gamma[t][j] = (joint[j] - norm).exp();
                    }
                }

                for j in 0..k {
                    init_acc[j] += gamma[0][j];
                }
                for (t, (g, row)) in gamma.iter().zip(seq.iter()).enumerate() {
                    for j in 0..k {
                        weight[j] += g[j];
                        for (wx, x) in weighted_x[j].iter_mut().zip(row.iter()) {
                            *wx += g[j] * x;
                        }
                        if t + 1 < t_len {
                            trans_denom[j] += g[j];
                        }
                    }
                }

                // Posterior transition occupancy, normalized with log-sum-exp.
                for t in 0..t_len.saturating_sub(1) {
                    for i in 0..k {
                        for j in 0..k {
                            scratch[i * k + j] = log_alpha[t][i]
                                + self.log_trans[i][j]
                                + log_b[t + 1][j]
                                + log_beta[t + 1][j];
                        }
                    }
                    let norm = log_sum_exp(&scratch);
                    if norm == f64::NEG_INFINITY {
                        continue;
                    }
                    for i in 0..k {
                        for j in 0..k {
                            trans_acc[i][j] += (scratch[i * k + j] - norm).exp();
                        }
                    }
                }

                gammas.push(gamma);
            }

            // M-step, pooled across sequences.
            for j in 0..k {
                let p = (init_acc[j] / active_seqs).max(PROB_FLOOR);
                self.log_init[j] = p.ln();
            }
            normalize_log_row(&mut self.log_init);

            for i in 0..k {
                if trans_denom[i] > OCCUPANCY_EPS {
                    for j in 0..k {
                        let p = (trans_acc[i][j] / trans_denom[i]).max(PROB_FLOOR);
                        self.log_trans[i][j] = p.ln();
                    }
                    normalize_log_row(&mut self.log_trans[i]);
                }
                // Rows with no outgoing occupancy keep their previous values.
            }

            let mut new_means = self.means.clone();
            for j in 0..k {
                if weight[j] > OCCUPANCY_EPS {
                    for (m, wx) in new_means[j].iter_mut().zip(weighted_x[j].iter()) {
                        *m = wx / weight[j];
                    }
                }
            }

            // Variance uses the squared deviation from the *new* means.
            let mut sq_acc = vec![vec![0.0; dim]; k];
            for (gamma, seq) in gammas.iter().zip(sequences.iter()) {
                for (g, row) in gamma.iter().zip(seq.iter()) {
                    for j in 0..k {
                        for ((sq, x), m) in sq_acc[j]
                            .iter_mut()
                            .zip(row.iter())
                            .zip(new_means[j].iter())
                        {
                            let diff = x - m;
                            *sq += g[j] * diff * diff;
                        }
                    }
                }
            }
            for j in 0..k {
                if weight[j] > OCCUPANCY_EPS {
                    for (v, sq) in self.vars[j].iter_mut().zip(sq_acc[j].iter()) {
                        *v = (sq / weight[j]).max(self.variance_floor);
                    }
                }
                // Zero-occupancy states retain their previous variance.
            }
            self.means = new_means;

            iterations = iter + 1;
            observer(iterations, opts.max_iterations);

            if let Some(prev) = prev_ll {
                if (total_ll - prev).abs() < opts.tolerance {
                    converged = true;
                    break;
                }
            }
            prev_ll = Some(total_ll);
        }

        self.fitted = true;
        tracing::debug!(
            n_states = self.n_states,
            iterations,
            converged,
            log_likelihood = total_ll,
            "baum-welch fit finished"
        );
        Ok(FitSummary {
            log_likelihood: total_ll,
            iterations,
            converged,
        })
    }

    /// Total forward log-likelihood of the sequences under the fitted model.
    pub fn log_likelihood(&self, sequences: &[Vec<Vec<f64>>]) -> Result<f64> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        self.check_sequences(sequences)?;
        let mut total = 0.0;
        for seq in sequences {
            if seq.is_empty() {
                continue;
            }
            let log_b = self.emission_log_probs(seq);
            let (_, seq_ll) = self.forward(&log_b);
            total += seq_ll;
        }
        Ok(total)
    }

    /// Most likely hidden-state sequence (Viterbi), ties broken by the
    /// first-encountered maximum.
    pub fn decode(&self, seq: &[Vec<f64>]) -> Result<Vec<usize>> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        for row in seq {
            if row.len() != self.n_features {
                return Err(Error::DimensionMismatch {
                    expected: self.n_features,
                    got: row.len(),
                });
            }
        }
        if seq.is_empty() {
            return Ok(Vec::new());
        }

        let k = self.n_states;
        let t_len = seq.len();
        let log_b = self.emission_log_probs(seq);
        let mut dp = vec![vec![f64::NEG_INFINITY; k]; t_len];
        let mut back = vec![vec![0usize; k]; t_len];
        for j in 0..k {
            dp[0][j] = self.log_init[j] + log_b[0][j];
        }
        for t in 1..t_len {
            for j in 0..k {
                let mut best_i = 0;
                let mut best = f64::NEG_INFINITY;
                for i in 0..k {
                    let score = dp[t - 1][i] + self.log_trans[i][j];
                    if score > best {
                        best = score;
                        best_i = i;
                    }
                }
                dp[t][j] = best + log_b[t][j];
                back[t][j] = best_i;
            }
        }

        let mut states = vec![0usize; t_len];
        states[t_len - 1] = argmax(&dp[t_len - 1]).unwrap_or(0);
        for t in (0..t_len - 1).rev() {
            states[t] = back[t + 1][states[t + 1]];
        }
        Ok(states)
    }

    /// Bayesian information criterion for relative comparison across
    /// candidate state counts on the same data.
    pub fn bic(&self, total_log_likelihood: f64, n_samples: usize) -> Result<f64> {
        if !self.fitted {
            return Err(Error::NotFitted);
        }
        let k = self.n_states as f64;
        let d = self.n_features as f64;
        let n_params = (k - 1.0) + k * (k - 1.0) + 2.0 * k * d;
        Ok(-2.0 * total_log_likelihood + n_params * (n_samples as f64).ln())
    }
}

/// Renormalize a row of log-probabilities so the probabilities sum to 1.
fn normalize_log_row(row: &mut [f64]) {
    let norm = log_sum_exp(row);
    if norm.is_finite() {
        for v in row.iter_mut() {
            *v -= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn opts() -> FitOptions {
        FitOptions {
            max_iterations: 50,
            tolerance: 1e-4,
        }
    }

    /// Two tight clusters far apart, arranged as one sequence.
    fn bimodal_sequence() -> Vec<Vec<Vec<f64>>> {
        let mut seq = Vec::new();
        for i in 0..20 {
            let jitter = (i % 4) as f64 * 0.05;
            seq.push(vec![jitter, -jitter]);
        }
        for i in 0..20 {
            let jitter = (i % 4) as f64 * 0.05;
            seq.push(vec![10.0 + jitter, 10.0 - jitter]);
        }
        vec![seq]
    }

    #[test]
    fn decode_before_fit_fails() {
        let model = GaussianHmm::new(2, 2, &config()).unwrap();
        assert!(matches!(
            model.decode(&[vec![0.0, 0.0]]),
            Err(Error::NotFitted)
        ));
    }

    #[test]
    fn bic_before_fit_fails() {
        let model = GaussianHmm::new(2, 2, &config()).unwrap();
        assert!(matches!(model.bic(-10.0, 5), Err(Error::NotFitted)));
    }

    #[test]
    fn fit_rejects_dimension_mismatch() {
        let mut model = GaussianHmm::new(2, 3, &config()).unwrap();
        let err = model.fit(&[vec![vec![0.0, 1.0]]], &opts()).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, got: 2 }));
    }

    #[test]
    fn fit_rejects_empty_input() {
        let mut model = GaussianHmm::new(2, 2, &config()).unwrap();
        assert!(matches!(
            model.fit(&[], &opts()),
            Err(Error::EmptyMatrix)
        ));
    }

    #[test]
    fn transition_rows_and_initial_sum_to_one() {
        let mut model = GaussianHmm::new(2, 2, &config()).unwrap();
        model.fit(&bimodal_sequence(), &opts()).unwrap();

        let init_sum: f64 = model.log_init.iter().map(|l| l.exp()).sum();
        assert!((init_sum - 1.0).abs() < 1e-9, "init sum {init_sum}");
        for row in &model.log_trans {
            let sum: f64 = row.iter().map(|l| l.exp()).sum();
            assert!((sum - 1.0).abs() < 1e-9, "row sum {sum}");
        }
    }

    #[test]
    fn fit_converges_on_separated_clusters() {
        let mut model = GaussianHmm::new(2, 2, &config()).unwrap();
        let summary = model.fit(&bimodal_sequence(), &opts()).unwrap();
        assert!(summary.converged);
        assert!(summary.log_likelihood.is_finite());
        assert!(summary.iterations >= 2);
    }

    #[test]
    fn decode_assigns_adjacent_observations_same_state() {
        let seqs = bimodal_sequence();
        let mut model = GaussianHmm::new(2, 2, &config()).unwrap();
        model.fit(&seqs, &opts()).unwrap();
        let states = model.decode(&seqs[0]).unwrap();

        let same_adjacent = states
            .windows(2)
            .filter(|w| w[0] == w[1])
            .count();
        // 40 observations, one genuine regime switch in the middle.
        assert!(
            same_adjacent >= 36,
            "only {same_adjacent} adjacent pairs agree"
        );
        assert_ne!(states[0], states[39]);
    }

    #[test]
    fn single_state_single_feature_degenerates_gracefully() {
        let seq = vec![(0..12).map(|i| vec![i as f64 * 0.1]).collect::<Vec<_>>()];
        let mut model = GaussianHmm::new(1, 1, &config()).unwrap();
        let summary = model.fit(&seq, &opts()).unwrap();
        assert!(!summary.log_likelihood.is_nan());
        let bic = model.bic(summary.log_likelihood, 12).unwrap();
        assert!(bic.is_finite());
        let states = model.decode(&seq[0]).unwrap();
        assert!(states.iter().all(|s| *s == 0));
    }

    #[test]
    fn multiple_sequences_do_not_cross_boundaries() {
        // Two sequences pinned to different clusters; transitions between
        // them must come from the sticky prior, not the data.
        let seq_a: Vec<Vec<f64>> = (0..15).map(|_| vec![0.0, 0.0]).collect();
        let seq_b: Vec<Vec<f64>> = (0..15).map(|_| vec![10.0, 10.0]).collect();
        let mut model = GaussianHmm::new(2, 2, &config()).unwrap();
        let summary = model.fit(&[seq_a.clone(), seq_b.clone()], &opts()).unwrap();
        assert!(summary.log_likelihood.is_finite());

        let a_states = model.decode(&seq_a).unwrap();
        let b_states = model.decode(&seq_b).unwrap();
        assert!(a_states.windows(2).all(|w| w[0] == w[1]));
        assert!(b_states.windows(2).all(|w| w[0] == w[1]));
        assert_ne!(a_states[0], b_states[0]);
    }

    #[test]
    fn log_likelihood_requires_fit() {
        let model = GaussianHmm::new(2, 2, &config()).unwrap();
        assert!(matches!(
            model.log_likelihood(&[vec![vec![0.0, 0.0]]]),
            Err(Error::NotFitted)
        ));
    }

    #[test]
    fn observer_sees_monotonic_iterations() {
        let mut model = GaussianHmm::new(2, 2, &config()).unwrap();
        let mut seen = Vec::new();
        model
            .fit_observed(&bimodal_sequence(), &opts(), &mut |iter, _max| {
                seen.push(iter)
            })
            .unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
