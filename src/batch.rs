//! Rayon-based parallel batch processing for multiple time series.
//!
//! Provides batch versions of loglike, fit, and forecast that process
//! N time series in parallel using Rayon's work-stealing thread pool.

use rayon::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::forecast::{forecast_with_parameters, ForecastResult};
use crate::optimizer;
use crate::params::ParameterVector;
use crate::types::{FitOptions, FitResult, ModelSpec};

/// Log-likelihood of many series under one spec and parameter set.
pub fn batch_loglike(
    series: &[Vec<f64>],
    spec: &ModelSpec,
    params: &ParameterVector,
) -> Vec<Result<f64>> {
    series
        .par_iter()
        .map(|y| optimizer::loglike_at(y, spec, params))
        .collect()
}

/// Fit the same spec to many series in parallel. Each series is fit
/// independently; one failure does not affect the others.
pub fn batch_fit(series: &[Vec<f64>], spec: &ModelSpec, options: &FitOptions) -> Vec<Result<FitResult>> {
    info!(
        n_series = series.len(),
        class = spec.class.as_str(),
        "batch fit"
    );
    series
        .par_iter()
        .map(|y| optimizer::fit(y, spec, options))
        .collect()
}

/// Forecast many series in parallel, `params_list[i]` belonging to
/// `series[i]`.
pub fn batch_forecast(
    series: &[Vec<f64>],
    spec: &ModelSpec,
    params_list: &[ParameterVector],
    steps: usize,
    alpha: f64,
) -> Vec<Result<ForecastResult>> {
    info!(n_series = series.len(), steps, "batch forecast");
    series
        .par_iter()
        .zip(params_list.par_iter())
        .map(|(y, params)| forecast_with_parameters(y, spec, params, steps, alpha))
        .collect()
}
