use argmin::core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use serde::{Deserialize, Serialize};

use crate::error::{HawkesError, HawkesResult};
use crate::hawkes::likelihood::{penalized_neg_log_likelihood, PENALTY};
use crate::model::{EventSeries, FitReport, HawkesParams};

/// Log-space step used to span the initial simplex around a start point.
const SIMPLEX_STEP: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Upper bound c on the branching ratio: candidates need `α < c · β`.
    pub stability_margin: f64,
    /// Fits on fewer events are refused.
    pub min_events: usize,
    /// Iteration cap for each simplex run.
    pub max_iters: u64,
    /// Extra simplex runs restarted from the incumbent best point.
    pub restarts: usize,
    /// Convergence threshold on the spread of simplex objective values.
    pub tolerance: f64,
    /// Decay-rate prior used when no initial guess is supplied (1/s).
    pub initial_beta: f64,
    /// Branching ratio the default initial α is derived from.
    pub initial_branching_ratio: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            stability_margin: 0.95,
            min_events: 200,
            max_iters: 5_000,
            restarts: 2,
            tolerance: 1e-9,
            initial_beta: 1.0 / 30.0,
            initial_branching_ratio: 0.5,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> HawkesResult<()> {
        if !(self.stability_margin > 0.0 && self.stability_margin < 1.0) {
            return Err(HawkesError::InvalidInput(format!(
                "stability_margin must be in (0, 1), got {}",
                self.stability_margin
            )));
        }
        if self.min_events < 2 {
            return Err(HawkesError::InvalidInput(format!(
                "min_events must be >= 2, got {}",
                self.min_events
            )));
        }
        if self.max_iters == 0 {
            return Err(HawkesError::InvalidInput("max_iters must be > 0".to_string()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(HawkesError::InvalidInput(format!(
                "tolerance must be finite and > 0, got {}",
                self.tolerance
            )));
        }
        if !(self.initial_beta.is_finite() && self.initial_beta > 0.0) {
            return Err(HawkesError::InvalidInput(format!(
                "initial_beta must be finite and > 0, got {}",
                self.initial_beta
            )));
        }
        if !(self.initial_branching_ratio > 0.0 && self.initial_branching_ratio < 1.0) {
            return Err(HawkesError::InvalidInput(format!(
                "initial_branching_ratio must be in (0, 1), got {}",
                self.initial_branching_ratio
            )));
        }
        Ok(())
    }
}

/// Result of a maximum-likelihood fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HawkesFit {
    pub params: HawkesParams,
    pub log_likelihood: f64,
    pub events: usize,
    pub horizon_seconds: f64,
    pub stability_margin: f64,
    pub iterations: u64,
    pub restarts: usize,
}

impl HawkesFit {
    pub fn report(&self) -> FitReport {
        FitReport {
            events: self.events,
            horizon_seconds: self.horizon_seconds,
            params: self.params,
        }
    }
}

/// Negative log-likelihood over θ = (ln μ, ln α, ln β).
///
/// The log transform keeps every vertex strictly positive; the stability
/// constraint is left to the penalty.
struct LogSpaceObjective<'a> {
    offsets: &'a [f64],
    margin: f64,
}

impl CostFunction for LogSpaceObjective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(penalized_neg_log_likelihood(
            self.offsets,
            &from_log_space(theta),
            self.margin,
        ))
    }
}

fn to_log_space(params: &HawkesParams) -> Vec<f64> {
    vec![params.mu.ln(), params.alpha.ln(), params.beta.ln()]
}

fn from_log_space(theta: &[f64]) -> HawkesParams {
    HawkesParams {
        mu: theta[0].exp(),
        alpha: theta[1].exp(),
        beta: theta[2].exp(),
    }
}

/// Start point plus one vertex per axis. α is stepped down and β up so every
/// vertex keeps the branching ratio of a feasible start feasible.
fn simplex_around(theta: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = vec![theta.to_vec()];
    for (axis, step) in [SIMPLEX_STEP, -SIMPLEX_STEP, SIMPLEX_STEP].into_iter().enumerate() {
        let mut vertex = theta.to_vec();
        vertex[axis] += step;
        vertices.push(vertex);
    }
    vertices
}

struct SimplexRun {
    theta: Vec<f64>,
    cost: f64,
    iterations: u64,
}

#[derive(Debug, Clone)]
pub struct HawkesEstimator {
    config: EstimatorConfig,
}

impl HawkesEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Default starting point: μ₀ = n/T, β₀ = configured prior,
    /// α₀ = n₀ · β₀ with n₀ pulled inside the stability margin when needed.
    pub fn initial_guess(&self, series: &EventSeries) -> HawkesResult<HawkesParams> {
        let mu = series.mean_rate().ok_or_else(|| {
            HawkesError::InvalidInput("all events share one timestamp (T = 0)".to_string())
        })?;
        let margin = self.config.stability_margin;
        let branching = if self.config.initial_branching_ratio < margin {
            self.config.initial_branching_ratio
        } else {
            0.5 * margin
        };
        let beta = self.config.initial_beta;
        HawkesParams::new(mu, branching * beta, beta)
    }

    /// Maximum-likelihood fit of (μ, α, β) subject to `α < margin · β`.
    pub fn fit(
        &self,
        series: &EventSeries,
        initial: Option<HawkesParams>,
    ) -> HawkesResult<HawkesFit> {
        self.config.validate()?;
        if series.len() < self.config.min_events {
            return Err(HawkesError::InsufficientData {
                count: series.len(),
                min: self.config.min_events,
            });
        }
        if series.horizon() <= 0.0 {
            return Err(HawkesError::InvalidInput(
                "all events share one timestamp (T = 0)".to_string(),
            ));
        }

        let margin = self.config.stability_margin;
        let start = match initial {
            Some(guess) => {
                guess.validate()?;
                if !guess.is_stable(margin) {
                    return Err(HawkesError::InvalidInput(format!(
                        "initial guess has branching ratio {:.6} >= stability margin {}",
                        guess.branching_ratio(),
                        margin
                    )));
                }
                guess
            }
            None => self.initial_guess(series)?,
        };

        tracing::info!(
            events = series.len(),
            horizon_s = series.horizon(),
            margin,
            mu0 = start.mu,
            alpha0 = start.alpha,
            beta0 = start.beta,
            "Fitting Hawkes process"
        );

        let first = self.run_simplex(series.offsets(), to_log_space(&start))?;
        let (best, iterations, restarts) =
            self.refine(first, |theta| self.run_simplex(series.offsets(), theta));

        if best.cost >= PENALTY {
            return Err(HawkesError::OptimizationFailed(
                "no feasible point found inside the stability region".to_string(),
            ));
        }
        let params = from_log_space(&best.theta);
        params.validate().map_err(|e| {
            HawkesError::OptimizationFailed(format!("solver returned degenerate parameters: {e}"))
        })?;
        if !params.is_stable(margin) {
            return Err(HawkesError::OptimizationFailed(format!(
                "solver returned branching ratio {:.6} outside margin {}",
                params.branching_ratio(),
                margin
            )));
        }

        let fit = HawkesFit {
            params,
            log_likelihood: -best.cost,
            events: series.len(),
            horizon_seconds: series.horizon(),
            stability_margin: margin,
            iterations,
            restarts,
        };
        tracing::info!(
            mu = fit.params.mu,
            alpha = fit.params.alpha,
            beta = fit.params.beta,
            branching_ratio = fit.params.branching_ratio(),
            log_likelihood = fit.log_likelihood,
            iterations,
            restarts,
            "Hawkes fit converged"
        );
        Ok(fit)
    }

    /// Restart from the incumbent until the gain drops below tolerance. A
    /// restart that fails to converge ends refinement and keeps the incumbent.
    fn refine<F>(&self, mut best: SimplexRun, mut run: F) -> (SimplexRun, u64, usize)
    where
        F: FnMut(Vec<f64>) -> HawkesResult<SimplexRun>,
    {
        let mut iterations = best.iterations;
        let mut restarts = 0;
        while restarts < self.config.restarts {
            restarts += 1;
            let next = match run(best.theta.clone()) {
                Ok(next) => next,
                Err(e) => {
                    tracing::debug!(restart = restarts, error = %e, "Restart discarded, keeping incumbent");
                    break;
                }
            };
            iterations += next.iterations;
            let improvement = best.cost - next.cost;
            if next.cost < best.cost {
                best = next;
            }
            if improvement <= self.config.tolerance * best.cost.abs().max(1.0) {
                break;
            }
        }
        (best, iterations, restarts)
    }

    fn run_simplex(&self, offsets: &[f64], start: Vec<f64>) -> HawkesResult<SimplexRun> {
        let objective = LogSpaceObjective {
            offsets,
            margin: self.config.stability_margin,
        };
        let solver = NelderMead::new(simplex_around(&start))
            .with_sd_tolerance(self.config.tolerance)
            .map_err(|e| HawkesError::OptimizationFailed(e.to_string()))?;

        let result = Executor::new(objective, solver)
            .configure(|state| state.max_iters(self.config.max_iters))
            .run()
            .map_err(|e| HawkesError::OptimizationFailed(e.to_string()))?;

        let state = result.state();
        let iterations = state.get_iter();
        match state.get_termination_status() {
            TerminationStatus::Terminated(TerminationReason::SolverConverged) => {}
            status => {
                return Err(HawkesError::OptimizationFailed(format!(
                    "solver stopped after {} iterations: {:?}",
                    iterations, status
                )));
            }
        }
        let theta = state.get_best_param().cloned().ok_or_else(|| {
            HawkesError::OptimizationFailed("solver produced no best parameter".to_string())
        })?;
        let cost = state.get_best_cost();

        tracing::debug!(iterations, cost, "Simplex run finished");
        Ok(SimplexRun {
            theta,
            cost,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplex_vertices_stay_feasible() {
        let start = HawkesParams {
            mu: 0.1,
            alpha: 0.9 * 0.5,
            beta: 0.5,
        };
        for vertex in simplex_around(&to_log_space(&start)) {
            assert!(from_log_space(&vertex).is_stable(0.95));
        }
    }

    #[test]
    fn log_space_round_trip() {
        let p = HawkesParams {
            mu: 0.0123,
            alpha: 0.04,
            beta: 0.09,
        };
        let back = from_log_space(&to_log_space(&p));
        assert!((back.mu - p.mu).abs() < 1e-15);
        assert!((back.alpha - p.alpha).abs() < 1e-15);
        assert!((back.beta - p.beta).abs() < 1e-15);
    }

    #[test]
    fn initial_guess_respects_tight_margin() {
        let estimator = HawkesEstimator::new(EstimatorConfig {
            stability_margin: 0.3,
            ..EstimatorConfig::default()
        });
        let series = EventSeries::from_seconds(&[0.0, 1.0, 2.0, 4.0]).unwrap();
        let guess = estimator.initial_guess(&series).unwrap();
        assert!((guess.mu - 1.0).abs() < 1e-12);
        assert!((guess.branching_ratio() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn failed_restart_keeps_converged_incumbent() {
        let estimator = HawkesEstimator::new(EstimatorConfig {
            restarts: 3,
            ..EstimatorConfig::default()
        });
        let first = SimplexRun {
            theta: vec![-2.0, -3.0, -1.0],
            cost: 120.5,
            iterations: 40,
        };
        let mut calls = 0;
        let (best, iterations, restarts) = estimator.refine(first, |_| {
            calls += 1;
            Err(HawkesError::OptimizationFailed(
                "solver stopped after 5000 iterations: MaxItersReached".to_string(),
            ))
        });
        assert_eq!(calls, 1);
        assert_eq!(restarts, 1);
        assert_eq!(iterations, 40);
        assert_eq!(best.theta, vec![-2.0, -3.0, -1.0]);
        assert_eq!(best.cost, 120.5);
    }

    #[test]
    fn restarts_keep_improvements() {
        let estimator = HawkesEstimator::new(EstimatorConfig::default());
        let first = SimplexRun {
            theta: vec![0.0, 0.0, 0.0],
            cost: 10.0,
            iterations: 7,
        };
        let (best, iterations, restarts) = estimator.refine(first, |theta| {
            Ok(SimplexRun {
                theta: theta.iter().map(|x| x - 0.1).collect(),
                cost: 9.0,
                iterations: 3,
            })
        });
        // Second restart finds no further gain and stops refinement.
        assert_eq!(restarts, 2);
        assert_eq!(iterations, 13);
        assert_eq!(best.cost, 9.0);
        assert!((best.theta[0] + 0.1).abs() < 1e-15);
    }

    #[test]
    fn config_validation() {
        let mut cfg = EstimatorConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.stability_margin = 1.0;
        assert!(cfg.validate().is_err());
        cfg.stability_margin = 0.95;
        cfg.tolerance = 0.0;
        assert!(cfg.validate().is_err());
    }
}
