//! Numerically stable primitives for log-domain probability math.

/// ln(2*pi), used by the Gaussian log-density.
pub const LOG_2PI: f64 = 1.837_877_066_409_345_3;

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// Log-density of a diagonal-covariance multivariate Gaussian.
///
/// All three slices must share the same length; variances must be positive.
pub fn log_gaussian_diag(x: &[f64], mean: &[f64], var: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), mean.len());
    debug_assert_eq!(x.len(), var.len());
    let mut log_prob = 0.0;
    for ((xi, mi), vi) in x.iter().zip(mean.iter()).zip(var.iter()) {
        let diff = xi - mi;
        log_prob -= 0.5 * (diff * diff / vi + vi.ln() + LOG_2PI);
    }
    log_prob
}

/// Index of the largest value, ties broken by the first occurrence.
///
/// Returns None for empty input.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
