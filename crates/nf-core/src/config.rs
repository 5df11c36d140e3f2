//! Engine configuration.
//!
//! All empirically chosen constants live here as configurable fields with
//! the defaults the engine was tuned with, in particular the sticky
//! self-transition prior (flow behavior tends to persist over consecutive
//! observations) and the BIC early-stop patience.

use nf_common::{Error, Result};

/// Tunable constants for the discovery engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum diagonal variance; degenerate dimensions are clamped here.
    pub variance_floor: f64,
    /// Initial self-transition probability of the transition matrix.
    pub self_transition_prior: f64,
    /// Fixed Lloyd refinement iterations after K-means++ seeding.
    pub kmeans_iterations: usize,
    /// Iteration cap for the final Baum-Welch fit.
    pub fit_max_iterations: usize,
    /// Absolute log-likelihood tolerance for the final fit.
    pub fit_tolerance: f64,
    /// Iteration cap for the cheap model-order sweep fits.
    pub sweep_max_iterations: usize,
    /// Loose tolerance for the sweep fits.
    pub sweep_tolerance: f64,
    /// Smallest candidate state count in the sweep.
    pub sweep_min_states: usize,
    /// Largest candidate state count in the sweep.
    pub sweep_max_states: usize,
    /// Consecutive non-improving BIC candidates before the sweep stops.
    pub bic_patience: usize,
    /// Row count above which the sweep subsamples its input.
    pub sweep_subsample_threshold: usize,
    /// Row cap for the subsampled sweep input.
    pub sweep_subsample_cap: usize,
    /// Minimum usable rows for a discovery run.
    pub min_flows: usize,
    /// Seed for the K-means++ PRNG, the pipeline's only randomness source.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            variance_floor: 1e-6,
            self_transition_prior: 0.7,
            kmeans_iterations: 10,
            fit_max_iterations: 100,
            fit_tolerance: 1e-4,
            sweep_max_iterations: 10,
            sweep_tolerance: 1e-2,
            sweep_min_states: 2,
            sweep_max_states: 10,
            bic_patience: 2,
            sweep_subsample_threshold: 15_000,
            sweep_subsample_cap: 10_000,
            min_flows: 10,
            seed: 42,
        }
    }
}

impl EngineConfig {
    /// Validate field ranges before a run.
    pub fn validate(&self) -> Result<()> {
        if self.variance_floor <= 0.0 {
            return Err(Error::Config(format!(
                "variance_floor must be positive, got {}",
                self.variance_floor
            )));
        }
        if !(0.0..1.0).contains(&self.self_transition_prior) {
            return Err(Error::Config(format!(
                "self_transition_prior must be in [0, 1), got {}",
                self.self_transition_prior
            )));
        }
        if self.fit_max_iterations == 0 || self.sweep_max_iterations == 0 {
            return Err(Error::Config("iteration caps must be at least 1".into()));
        }
        if self.sweep_min_states < 1 || self.sweep_min_states > self.sweep_max_states {
            return Err(Error::Config(format!(
                "invalid sweep range: {}..={}",
                self.sweep_min_states, self.sweep_max_states
            )));
        }
        if self.sweep_subsample_cap == 0 {
            return Err(Error::Config("sweep_subsample_cap must be positive".into()));
        }
        if self.min_flows == 0 {
            return Err(Error::Config("min_flows must be positive".into()));
        }
        Ok(())
    }
}
