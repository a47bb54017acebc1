use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HawkesError, HawkesResult};

const KEY_EVENTS: &str = "Events";
const KEY_HORIZON: &str = "T (seconds)";
const KEY_MU: &str = "mu";
const KEY_ALPHA: &str = "alpha";
const KEY_BETA: &str = "beta";
const KEY_BRANCHING: &str = "branching_ratio(alpha/beta)";
const KEY_HALF_LIFE: &str = "half_life_seconds";

/// Exponential-kernel Hawkes parameters:
/// `λ(t) = μ + α · Σ_{t_j < t} exp(-β (t - t_j))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HawkesParams {
    /// Baseline intensity (events/second).
    pub mu: f64,
    /// Jump added to the intensity by each event.
    pub alpha: f64,
    /// Decay rate (1/second).
    pub beta: f64,
}

impl HawkesParams {
    pub fn new(mu: f64, alpha: f64, beta: f64) -> HawkesResult<Self> {
        let params = Self { mu, alpha, beta };
        params.validate()?;
        Ok(params)
    }

    /// Rejects any non-finite or non-positive component.
    pub fn validate(&self) -> HawkesResult<()> {
        for (name, value) in [("mu", self.mu), ("alpha", self.alpha), ("beta", self.beta)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(HawkesError::InvalidInput(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Expected number of direct children per event (α/β).
    pub fn branching_ratio(&self) -> f64 {
        self.alpha / self.beta
    }

    pub fn half_life_seconds(&self) -> f64 {
        std::f64::consts::LN_2 / self.beta
    }

    /// Strict sub-criticality check `α < margin · β`.
    pub fn is_stable(&self, margin: f64) -> bool {
        self.alpha < margin * self.beta
    }
}

/// Persisted outcome of a fit: the key/value parameter file handed from the
/// `fit` run to the `intensity` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub events: usize,
    pub horizon_seconds: f64,
    pub params: HawkesParams,
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", KEY_EVENTS, self.events)?;
        writeln!(f, "{}: {:.3}", KEY_HORIZON, self.horizon_seconds)?;
        writeln!(f, "{}: {:.15}", KEY_MU, self.params.mu)?;
        writeln!(f, "{}: {:.15}", KEY_ALPHA, self.params.alpha)?;
        writeln!(f, "{}: {:.15}", KEY_BETA, self.params.beta)?;
        writeln!(f, "{}: {:.10}", KEY_BRANCHING, self.params.branching_ratio())?;
        writeln!(f, "{}: {:.6}", KEY_HALF_LIFE, self.params.half_life_seconds())
    }
}

impl FromStr for FitReport {
    type Err = HawkesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut events = None;
        let mut horizon = None;
        let mut mu = None;
        let mut alpha = None;
        let mut beta = None;

        for (line_no, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(HawkesError::Artifact(format!(
                    "line {}: expected 'Key: value', got '{}'",
                    line_no + 1,
                    line
                )));
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                KEY_EVENTS => {
                    events = Some(value.parse::<usize>().map_err(|e| {
                        HawkesError::Artifact(format!("{}: invalid count '{}': {}", key, value, e))
                    })?)
                }
                KEY_HORIZON => horizon = Some(parse_float(key, value)?),
                KEY_MU => mu = Some(parse_float(key, value)?),
                KEY_ALPHA => alpha = Some(parse_float(key, value)?),
                KEY_BETA => beta = Some(parse_float(key, value)?),
                // Derived values are recomputed from α and β.
                KEY_BRANCHING | KEY_HALF_LIFE => {
                    parse_float(key, value)?;
                }
                other => {
                    return Err(HawkesError::Artifact(format!("unknown key '{}'", other)));
                }
            }
        }

        let params = HawkesParams {
            mu: require(mu, KEY_MU)?,
            alpha: require(alpha, KEY_ALPHA)?,
            beta: require(beta, KEY_BETA)?,
        };
        params
            .validate()
            .map_err(|e| HawkesError::Artifact(e.to_string()))?;

        Ok(Self {
            events: require(events, KEY_EVENTS)?,
            horizon_seconds: require(horizon, KEY_HORIZON)?,
            params,
        })
    }
}

fn parse_float(key: &str, value: &str) -> HawkesResult<f64> {
    value
        .parse::<f64>()
        .map_err(|e| HawkesError::Artifact(format!("{}: invalid number '{}': {}", key, value, e)))
}

fn require<T>(value: Option<T>, key: &str) -> HawkesResult<T> {
    value.ok_or_else(|| HawkesError::Artifact(format!("missing key '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_quantities() {
        let p = HawkesParams::new(0.01, 0.05, 0.1).unwrap();
        assert!((p.branching_ratio() - 0.5).abs() < 1e-12);
        assert!((p.half_life_seconds() - 6.931471805599453).abs() < 1e-9);
        assert!(p.is_stable(0.95));
        assert!(!p.is_stable(0.5));
    }

    #[test]
    fn new_rejects_non_positive() {
        assert!(HawkesParams::new(0.0, 0.1, 1.0).is_err());
        assert!(HawkesParams::new(0.1, -0.1, 1.0).is_err());
        assert!(HawkesParams::new(0.1, 0.1, f64::INFINITY).is_err());
    }

    #[test]
    fn artifact_has_exact_keys_in_order() {
        let report = FitReport {
            events: 1234,
            horizon_seconds: 86_399.5,
            params: HawkesParams {
                mu: 0.0123,
                alpha: 0.02,
                beta: 0.04,
            },
        };
        let text = report.to_string();
        let keys: Vec<&str> = text
            .lines()
            .map(|l| l.split_once(':').unwrap().0)
            .collect();
        assert_eq!(
            keys,
            vec![
                "Events",
                "T (seconds)",
                "mu",
                "alpha",
                "beta",
                "branching_ratio(alpha/beta)",
                "half_life_seconds"
            ]
        );
        assert!(text.contains("branching_ratio(alpha/beta): 0.5000000000"));
    }

    #[test]
    fn parse_rejects_missing_beta() {
        let err = "Events: 10\nT (seconds): 5.000\nmu: 0.1\nalpha: 0.2\n"
            .parse::<FitReport>()
            .unwrap_err();
        assert!(err.to_string().contains("beta"));
    }

    #[test]
    fn parse_rejects_garbage_line() {
        assert!("mu 0.1".parse::<FitReport>().is_err());
        assert!("Events: 10\nfoo: 1".parse::<FitReport>().is_err());
    }
}
