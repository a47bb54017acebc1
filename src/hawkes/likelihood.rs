//! Exponential-kernel Hawkes log-likelihood.
//!
//! ```text
//! ℓ(μ,α,β) = Σ_i ln λ(t_i⁻) − ∫_0^T λ(u) du
//! ```
//!
//! The event term uses the O(n) recursion
//! `R_0 = 0`, `R_i = exp(−β (t_i − t_{i−1})) · (1 + R_{i−1})`, so
//! `λ(t_i⁻) = μ + α R_i` only sees strictly earlier events. The compensator
//! has the closed form `μ T + (α/β) Σ_i (1 − exp(−β (T − t_i)))`.

use crate::error::HawkesResult;
use crate::model::{EventSeries, HawkesParams};

/// Finite objective value assigned to infeasible candidates.
pub const PENALTY: f64 = 1e50;

/// Why a candidate left the feasible region during objective evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Degenerate {
    NonPositiveParameter,
    NearCritical,
    NonPositiveIntensity,
    NonFinite,
}

/// `Σ_i ln λ(t_i⁻)` via the decayed-sum recursion.
pub(crate) fn log_intensity_sum(offsets: &[f64], params: &HawkesParams) -> Result<f64, Degenerate> {
    let mut r = 0.0_f64;
    let mut sum = 0.0_f64;
    let mut prev = match offsets.first() {
        Some(&t) => t,
        None => return Ok(0.0),
    };

    for (i, &t) in offsets.iter().enumerate() {
        if i > 0 {
            r = (-params.beta * (t - prev)).exp() * (1.0 + r);
            prev = t;
        }
        let lambda = params.mu + params.alpha * r;
        if lambda.is_nan() || lambda <= 0.0 {
            return Err(Degenerate::NonPositiveIntensity);
        }
        sum += lambda.ln();
    }
    Ok(sum)
}

/// `∫_0^T λ(u) du` with T the last offset.
pub(crate) fn compensator(offsets: &[f64], params: &HawkesParams) -> f64 {
    let horizon = offsets.last().copied().unwrap_or(0.0);
    let excited: f64 = offsets
        .iter()
        .map(|&t| 1.0 - (-params.beta * (horizon - t)).exp())
        .sum();
    params.mu * horizon + params.alpha / params.beta * excited
}

/// Log-likelihood restricted to the feasible region `α < margin · β`.
pub(crate) fn evaluate(offsets: &[f64], params: &HawkesParams, margin: f64) -> Result<f64, Degenerate> {
    if !(params.mu > 0.0 && params.alpha > 0.0 && params.beta > 0.0) {
        return Err(Degenerate::NonPositiveParameter);
    }
    if !params.is_stable(margin) {
        return Err(Degenerate::NearCritical);
    }
    let ll = log_intensity_sum(offsets, params)? - compensator(offsets, params);
    if !ll.is_finite() {
        return Err(Degenerate::NonFinite);
    }
    Ok(ll)
}

/// Negative log-likelihood handed to the minimizer; infeasible points map to
/// [`PENALTY`] instead of an error.
pub fn penalized_neg_log_likelihood(offsets: &[f64], params: &HawkesParams, margin: f64) -> f64 {
    match evaluate(offsets, params, margin) {
        Ok(ll) => -ll,
        Err(_) => PENALTY,
    }
}

/// Log-likelihood of `params` on `series` (no stability restriction).
pub fn log_likelihood(series: &EventSeries, params: &HawkesParams) -> HawkesResult<f64> {
    params.validate()?;
    let offsets = series.offsets();
    // λ ≥ μ > 0 for validated parameters, so the recursion cannot degenerate.
    let sum = log_intensity_sum(offsets, params).unwrap_or(f64::NEG_INFINITY);
    Ok(sum - compensator(offsets, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_log_intensity_sum(offsets: &[f64], p: &HawkesParams) -> f64 {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &ti)| {
                let excitation: f64 = offsets[..i]
                    .iter()
                    .map(|&tj| (-p.beta * (ti - tj)).exp())
                    .sum();
                (p.mu + p.alpha * excitation).ln()
            })
            .sum()
    }

    fn naive_compensator(offsets: &[f64], p: &HawkesParams) -> f64 {
        // Riemann sum of λ on a fine grid.
        let horizon = *offsets.last().unwrap();
        let steps = 200_000;
        let dt = horizon / steps as f64;
        (0..steps)
            .map(|k| {
                let u = (k as f64 + 0.5) * dt;
                let excitation: f64 = offsets
                    .iter()
                    .filter(|&&tj| tj < u)
                    .map(|&tj| (-p.beta * (u - tj)).exp())
                    .sum();
                (p.mu + p.alpha * excitation) * dt
            })
            .sum()
    }

    fn synthetic_offsets(n: usize) -> Vec<f64> {
        let mut t = 0.0;
        (0..n)
            .map(|i| {
                let out = t;
                t += 0.05 + ((i * 37 % 11) as f64) * 0.7;
                out
            })
            .collect()
    }

    #[test]
    fn recursion_matches_double_sum() {
        let offsets = synthetic_offsets(50);
        let p = HawkesParams {
            mu: 0.2,
            alpha: 0.4,
            beta: 0.9,
        };
        let fast = log_intensity_sum(&offsets, &p).unwrap();
        let slow = naive_log_intensity_sum(&offsets, &p);
        assert!((fast - slow).abs() < 1e-9, "fast={fast} slow={slow}");
    }

    #[test]
    fn compensator_closed_form_matches_quadrature() {
        let offsets = [0.0, 0.4, 1.3, 1.35, 4.0];
        let p = HawkesParams {
            mu: 0.5,
            alpha: 0.8,
            beta: 2.0,
        };
        let closed = compensator(&offsets, &p);
        let numeric = naive_compensator(&offsets, &p);
        assert!((closed - numeric).abs() < 1e-4, "closed={closed} numeric={numeric}");
    }

    #[test]
    fn first_event_sees_baseline_only() {
        let p = HawkesParams {
            mu: 0.3,
            alpha: 5.0,
            beta: 10.0,
        };
        let sum = log_intensity_sum(&[0.0], &p).unwrap();
        assert!((sum - 0.3_f64.ln()).abs() < 1e-15);
    }

    #[test]
    fn infeasible_candidates_are_penalized() {
        let offsets = synthetic_offsets(20);
        let unstable = HawkesParams {
            mu: 0.1,
            alpha: 0.96,
            beta: 1.0,
        };
        assert_eq!(
            evaluate(&offsets, &unstable, 0.95),
            Err(Degenerate::NearCritical)
        );
        assert_eq!(penalized_neg_log_likelihood(&offsets, &unstable, 0.95), PENALTY);

        let negative = HawkesParams {
            mu: -0.1,
            alpha: 0.1,
            beta: 1.0,
        };
        assert_eq!(penalized_neg_log_likelihood(&offsets, &negative, 0.95), PENALTY);

        let feasible = HawkesParams {
            mu: 0.1,
            alpha: 0.5,
            beta: 1.0,
        };
        assert!(penalized_neg_log_likelihood(&offsets, &feasible, 0.95) < PENALTY);
    }

    #[test]
    fn public_log_likelihood_rejects_invalid_params() {
        let series = EventSeries::from_seconds(&[0.0, 1.0, 2.0]).unwrap();
        let bad = HawkesParams {
            mu: 0.0,
            alpha: 0.1,
            beta: 1.0,
        };
        assert!(log_likelihood(&series, &bad).is_err());
    }
}
