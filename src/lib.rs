//! Maximum-likelihood fitting and forecasting of ARTFIMA, ARFIMA and ARMA
//! models.

pub mod error;
pub mod types;
pub mod params;
pub mod special;
pub mod tacvf;
pub mod likelihood;
pub mod sdf;
pub mod differencing;
pub mod start_params;
pub mod objective;
pub mod information;
pub mod optimizer;
pub mod forecast;
pub mod batch;

#[cfg(feature = "python")]
mod python;

pub use error::{ArtfimaError, Infeasible, Result};
pub use forecast::{forecast, forecast_with_parameters, ForecastResult};
pub use optimizer::fit;
pub use params::ParameterVector;
pub use types::{Bounds, FitOptions, FitResult, LikelihoodMethod, ModelClass, ModelSpec};
