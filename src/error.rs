use thiserror::Error;

pub type HawkesResult<T> = Result<T, HawkesError>;

#[derive(Error, Debug)]
pub enum HawkesError {
    #[error("insufficient data: {count} events, at least {min} required")]
    InsufficientData { count: usize, min: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("optimization failed: {0}")]
    OptimizationFailed(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
