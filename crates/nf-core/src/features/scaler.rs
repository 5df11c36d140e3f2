//! Standardization of feature matrices to zero mean and unit variance.

use nf_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Fitted scaler parameters: one mean and one standard deviation per
/// feature dimension. Serializable so a fitted scaler can be reapplied
/// without data replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Per-dimension standard scaler.
///
/// Uses the population standard deviation (divide by N). Dimensions with
/// zero variance map every input to 0 rather than NaN.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a scaler from previously fitted parameters.
    pub fn from_params(params: ScalerParams) -> Result<Self> {
        if params.mean.len() != params.std.len() {
            return Err(Error::InvalidParams(format!(
                "scaler mean/std length mismatch: {} vs {}",
                params.mean.len(),
                params.std.len()
            )));
        }
        if params.std.iter().any(|s| *s < 0.0 || !s.is_finite()) {
            return Err(Error::InvalidParams(
                "scaler std entries must be finite and non-negative".into(),
            ));
        }
        Ok(Self {
            params: Some(params),
        })
    }

    /// Fitted parameters, if any.
    pub fn params(&self) -> Option<&ScalerParams> {
        self.params.as_ref()
    }

    /// Fit per-dimension mean and population standard deviation.
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        if rows.is_empty() {
            return Err(Error::EmptyMatrix);
        }
        let dim = rows[0].len();
        for row in rows {
            if row.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    got: row.len(),
                });
            }
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; dim];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row.iter()) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut var = vec![0.0; dim];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row.iter()).zip(mean.iter()) {
                let diff = x - m;
                *v += diff * diff;
            }
        }
        let std = var.iter().map(|v| (v / n).sqrt()).collect();

        self.params = Some(ScalerParams { mean, std });
        Ok(())
    }

    /// Apply `(x - mean) / std` per dimension; zero-std dimensions yield 0.
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let params = self.params.as_ref().ok_or(Error::ScalerNotFitted)?;
        let dim = params.mean.len();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    got: row.len(),
                });
            }
            let scaled = row
                .iter()
                .zip(params.mean.iter())
                .zip(params.std.iter())
                .map(|((x, m), s)| if *s == 0.0 { 0.0 } else { (x - m) / s })
                .collect();
            out.push(scaled);
        }
        Ok(out)
    }

    /// Fit and transform in one call.
    pub fn fit_transform(&mut self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fit(rows)?;
        self.transform(rows)
    }
}
