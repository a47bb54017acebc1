pub mod estimator;
pub mod intensity;
pub mod likelihood;
pub mod simulate;

pub use estimator::{EstimatorConfig, HawkesEstimator, HawkesFit};
pub use intensity::{reconstruct, IntensitySample, IntensitySeries};
pub use likelihood::log_likelihood;
pub use simulate::simulate;
