//! Property-based tests for nf-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use nf_math::{log_add_exp, log_gaussian_diag, log_sum_exp, mad, median, robust_scale};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() && b.is_infinite() {
        return a.signum() == b.signum();
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// log_sum_exp is commutative: order doesn't matter.
    #[test]
    fn log_sum_exp_commutative(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        let ab = log_sum_exp(&[a, b]);
        let ba = log_sum_exp(&[b, a]);
        prop_assert!(approx_eq(ab, ba, TOL));
    }

    /// log_sum_exp is associative: grouping doesn't matter.
    #[test]
    fn log_sum_exp_associative(a in -50.0..50.0f64, b in -50.0..50.0f64, c in -50.0..50.0f64) {
        let direct = log_sum_exp(&[a, b, c]);
        let grouped = log_sum_exp(&[log_sum_exp(&[a, b]), c]);
        prop_assert!(approx_eq(direct, grouped, TOL));
    }

    /// log_sum_exp numerical stability: no overflow with large values.
    #[test]
    fn log_sum_exp_no_overflow(a in 500.0..700.0f64, b in 500.0..700.0f64) {
        let result = log_sum_exp(&[a, b]);
        prop_assert!(!result.is_nan());
        prop_assert!(result >= a.max(b) - TOL);
    }

    /// log_sum_exp numerical stability: no underflow with very negative values.
    #[test]
    fn log_sum_exp_no_underflow(a in -700.0..-500.0f64, b in -700.0..-500.0f64) {
        let result = log_sum_exp(&[a, b]);
        prop_assert!(!result.is_nan());
        prop_assert!(result.is_finite() || result == f64::NEG_INFINITY);
    }

    /// log_add_exp matches log_sum_exp for 2 elements.
    #[test]
    fn log_add_exp_matches_log_sum_exp(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        prop_assert!(approx_eq(log_add_exp(a, b), log_sum_exp(&[a, b]), TOL));
    }

    /// Gaussian log-density is maximized at the mean for any variance.
    #[test]
    fn gaussian_peak_at_mean(mean in -50.0..50.0f64, var in 0.01..10.0f64, off in 0.1..20.0f64) {
        let at_mean = log_gaussian_diag(&[mean], &[mean], &[var]);
        let away = log_gaussian_diag(&[mean + off], &[mean], &[var]);
        prop_assert!(at_mean > away);
    }

    /// Gaussian log-density is symmetric around the mean.
    #[test]
    fn gaussian_symmetric(mean in -50.0..50.0f64, var in 0.01..10.0f64, off in 0.1..20.0f64) {
        let right = log_gaussian_diag(&[mean + off], &[mean], &[var]);
        let left = log_gaussian_diag(&[mean - off], &[mean], &[var]);
        prop_assert!(approx_eq(right, left, 1e-9));
    }

    /// Median lies within the sample range.
    #[test]
    fn median_within_range(samples in prop::collection::vec(-1000.0..1000.0f64, 1..50)) {
        let med = median(&samples).unwrap();
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(med >= min && med <= max);
    }

    /// MAD is invariant under translation.
    #[test]
    fn mad_translation_invariant(
        samples in prop::collection::vec(-100.0..100.0f64, 2..30),
        shift in -50.0..50.0f64,
    ) {
        let med = median(&samples).unwrap();
        let base = mad(&samples, med).unwrap();
        let shifted: Vec<f64> = samples.iter().map(|v| v + shift).collect();
        let shifted_med = median(&shifted).unwrap();
        let shifted_mad = mad(&shifted, shifted_med).unwrap();
        prop_assert!(approx_eq(base, shifted_mad, 1e-8));
    }

    /// Robust scale never drops below its floor.
    #[test]
    fn robust_scale_respects_floor(
        samples in prop::collection::vec(-100.0..100.0f64, 1..30),
        floor in 1e-9..1e-3f64,
    ) {
        let med = median(&samples).unwrap();
        let scale = robust_scale(&samples, med, floor).unwrap();
        prop_assert!(scale >= floor);
    }
}
