//! Robust location and scale estimators.
//!
//! Median and median-absolute-deviation (MAD) are preferred over mean/stddev
//! wherever a single extreme value must not distort the summary.

/// Scale factor that makes MAD a consistent estimator of sigma for Gaussians.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Median of the samples. Returns None for empty input.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut values = samples.to_vec();
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Median absolute deviation around the given center.
pub fn mad(samples: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = samples.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Robust scale estimate: MAD rescaled to sigma units, floored at min_scale.
pub fn robust_scale(samples: &[f64], center: f64, min_scale: f64) -> Option<f64> {
    mad(samples, center).map(|m| (MAD_TO_SIGMA * m).max(min_scale))
}
