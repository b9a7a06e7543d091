use thiserror::Error;

/// Fatal errors surfaced to callers.
///
/// Only malformed inputs end a fit. Numerical trouble met during the search is
/// absorbed as a penalty by the estimator and never reaches this type, but the
/// leaf routines (`tacvf`, `likelihood`) can still report it when called
/// directly, wrapped in [`ArtfimaError::Numerical`].
#[derive(Error, Debug)]
pub enum ArtfimaError {
    #[error("invalid model specification: {0}")]
    InvalidModelSpec(String),

    #[error("parameter length mismatch: expected {expected}, got {got}")]
    ParamLengthMismatch { expected: usize, got: usize },

    #[error("data error: {0}")]
    DataError(String),

    #[error("optimization failed: {0}")]
    OptimizationFailed(String),

    #[error(transparent)]
    Numerical(#[from] Infeasible),
}

/// Numerical infeasibility of a single parameter point.
///
/// Every variant is recoverable: the estimator turns it into the penalty
/// value and the forecast engine into its persistence fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Infeasible {
    #[error("covariance matrix is not positive-definite")]
    NotPositiveDefinite,

    #[error("non-finite value from {0}")]
    NonFiniteSpecialFunction(&'static str),

    #[error("hypergeometric series did not converge after {0} terms")]
    SeriesNotConverged(usize),

    #[error("autocovariance sequence contains non-finite values")]
    NonFiniteCovariance,

    #[error("singular linear system in {0}")]
    SingularSystem(&'static str),

    #[error("non-invertible {0} polynomial")]
    NonInvertible(&'static str),

    #[error("parameter {name}={value} outside its bounds")]
    OutOfBounds { name: &'static str, value: f64 },

    #[error("non-finite log-likelihood")]
    NonFiniteLikelihood,

    #[error("length mismatch: need at least {needed} values, got {got}")]
    LengthMismatch { needed: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, ArtfimaError>;

/// Result type of the numerical leaf routines.
pub type NumResult<T> = std::result::Result<T, Infeasible>;
