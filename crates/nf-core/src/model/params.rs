//! Versioned model persistence.
//!
//! The external representation stores plain probabilities; the model keeps
//! log-space internally. Loading floors every probability at a small epsilon
//! before taking logs so a round trip never produces -inf.

use crate::config::EngineConfig;
use crate::model::hmm::{GaussianHmm, PROB_FLOOR};
use nf_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Current persistence format version. Bump when the feature dimensionality
/// or field layout changes.
pub const PARAMS_VERSION: u32 = 1;

/// Durable JSON representation of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmParams {
    pub version: u32,
    pub n_states: usize,
    pub n_features: usize,
    pub means: Vec<Vec<f64>>,
    pub variances: Vec<Vec<f64>>,
    pub transition: Vec<Vec<f64>>,
    pub initial: Vec<f64>,
}

impl GaussianHmm {
    /// Export fitted parameters as plain probabilities.
    pub fn to_params(&self) -> Result<HmmParams> {
        if !self.is_fitted() {
            return Err(Error::NotFitted);
        }
        Ok(HmmParams {
            version: PARAMS_VERSION,
            n_states: self.n_states(),
            n_features: self.n_features(),
            means: self.means.clone(),
            variances: self.vars.clone(),
            transition: self
                .log_trans
                .iter()
                .map(|row| row.iter().map(|l| l.exp()).collect())
                .collect(),
            initial: self.log_init.iter().map(|l| l.exp()).collect(),
        })
    }

    /// Rebuild a fitted model from exported parameters.
    pub fn from_params(params: HmmParams, config: &EngineConfig) -> Result<Self> {
        if params.version != PARAMS_VERSION {
            return Err(Error::ParamsVersion(params.version));
        }
        let k = params.n_states;
        let d = params.n_features;
        if k == 0 || d == 0 {
            return Err(Error::InvalidParams("zero states or features".into()));
        }
        let check_matrix = |name: &str, m: &[Vec<f64>], rows: usize, cols: usize| -> Result<()> {
            if m.len() != rows || m.iter().any(|r| r.len() != cols) {
                return Err(Error::InvalidParams(format!(
                    "{name} must be {rows}x{cols}"
                )));
            }
            Ok(())
        };
        check_matrix("means", &params.means, k, d)?;
        check_matrix("variances", &params.variances, k, d)?;
        check_matrix("transition", &params.transition, k, k)?;
        if params.initial.len() != k {
            return Err(Error::InvalidParams(format!(
                "initial must have {k} entries"
            )));
        }
        if params
            .variances
            .iter()
            .flatten()
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(Error::InvalidParams("variances must be positive".into()));
        }

        let mut model = GaussianHmm::new(k, d, config)?;
        model.means = params.means;
        model.vars = params
            .variances
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| v.max(config.variance_floor))
                    .collect()
            })
            .collect();
        model.log_trans = params
            .transition
            .into_iter()
            .map(|row| row.into_iter().map(|p| p.max(PROB_FLOOR).ln()).collect())
            .collect();
        model.log_init = params
            .initial
            .into_iter()
            .map(|p| p.max(PROB_FLOOR).ln())
            .collect();
        model.mark_fitted();
        Ok(model)
    }
}
