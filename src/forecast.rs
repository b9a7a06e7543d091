use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::warn;

use crate::differencing::integrate;
use crate::error::{ArtfimaError, Result};
use crate::likelihood::dl_likelihood;
use crate::optimizer::prepare_series;
use crate::params::{PackedLayout, ParameterVector};
use crate::tacvf::artfima_tacvf;
use crate::types::{FitResult, ModelSpec};

/// Growth of the multi-step variance per horizon step.
const VARIANCE_GROWTH: f64 = 0.15;
/// Growth of the fallback standard deviation per horizon step.
const FALLBACK_SD_GROWTH: f64 = 0.1;
/// Variance cap as a multiple of the process variance.
const VARIANCE_CAP: f64 = 3.0;

/// H-step ahead forecast result.
#[derive(Debug, Clone)]
pub struct ForecastResult {
    /// Forecast means for h = 1..steps, at the level of the input series.
    pub mean: Vec<f64>,
    /// Forecast standard deviations.
    pub sd: Vec<f64>,
    /// Lower confidence interval bounds.
    pub ci_lower: Vec<f64>,
    /// Upper confidence interval bounds.
    pub ci_upper: Vec<f64>,
    /// True when any horizon fell back to persistence.
    pub used_fallback: bool,
}

impl ForecastResult {
    fn empty() -> Self {
        Self {
            mean: vec![],
            sd: vec![],
            ci_lower: vec![],
            ci_upper: vec![],
            used_fallback: false,
        }
    }
}

/// Forecast from a fitted model.
pub fn forecast(fit: &FitResult, steps: usize, alpha: f64) -> Result<ForecastResult> {
    predict(
        &fit.series,
        fit.mean,
        &fit.estimate,
        fit.sigma2,
        &fit.anchors,
        steps,
        alpha,
    )
}

/// Forecast a raw series under `spec` with known parameters.
///
/// The series is differenced and centered the way [`fit`](crate::optimizer::fit)
/// does it; the innovation variance is the profile estimate at `params`.
pub fn forecast_with_parameters(
    y: &[f64],
    spec: &ModelSpec,
    params: &ParameterVector,
    steps: usize,
    alpha: f64,
) -> Result<ForecastResult> {
    spec.validate()?;
    let layout = PackedLayout::from_spec(spec);
    let params = layout.unpack(&layout.pack(params)?)?;
    let prepared = prepare_series(y, spec)?;

    let n = prepared.w.len();
    let r = artfima_tacvf(&params, n - 1, 1.0)?;
    let sigma2 = dl_likelihood(&r, &prepared.w)?.sigma2;

    predict(
        &prepared.series,
        prepared.mean,
        &params,
        sigma2,
        &prepared.anchors,
        steps,
        alpha,
    )
}

fn predict(
    series: &[f64],
    mean: f64,
    params: &ParameterVector,
    sigma2: f64,
    anchors: &[f64],
    steps: usize,
    alpha: f64,
) -> Result<ForecastResult> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ArtfimaError::InvalidModelSpec(format!(
            "alpha must be in (0, 1), got {}",
            alpha
        )));
    }
    if series.is_empty() {
        return Err(ArtfimaError::DataError("series is empty".to_string()));
    }
    if steps == 0 {
        return Ok(ForecastResult::empty());
    }

    let scale = if sigma2.is_finite() && sigma2 > 0.0 { sigma2 } else { 1.0 };
    let r = artfima_tacvf(params, series.len() + steps - 1, scale)?;
    let (level_mean, sd, used_fallback) = linear_predictor(series, mean, &r, sigma2, steps);
    if used_fallback {
        warn!("Toeplitz solve failed, forecasting by persistence");
    }

    let mean = integrate(&level_mean, anchors);
    let z_alpha = z_score(1.0 - alpha / 2.0);
    let ci_lower = mean.iter().zip(&sd).map(|(m, s)| m - z_alpha * s).collect();
    let ci_upper = mean.iter().zip(&sd).map(|(m, s)| m + z_alpha * s).collect();

    Ok(ForecastResult {
        mean,
        sd,
        ci_lower,
        ci_upper,
        used_fallback,
    })
}

/// Best linear predictor of the next `steps` values of `series` given its
/// autocovariance `r` (lags 0..n+steps-1) at innovation scale.
///
/// The n×n Toeplitz system is factorized once and solved per horizon.
/// Returns the forecasts, their standard deviations and whether any
/// horizon used the persistence fallback.
fn linear_predictor(
    series: &[f64],
    mean: f64,
    r: &[f64],
    sigma2: f64,
    steps: usize,
) -> (Vec<f64>, Vec<f64>, bool) {
    let n = series.len();
    let z = DVector::from_iterator(n, series.iter().map(|v| v - mean));
    let lu = DMatrix::from_fn(n, n, |i, j| r[i.abs_diff(j)]).lu();

    let process_var = if r[0] > 0.0 { r[0] } else { 1.0 };
    let sigma2_valid = sigma2.is_finite() && sigma2 > 0.0;
    let innovation_var = if sigma2_valid { sigma2 } else { 0.1 * process_var };
    let base_sd = if sigma2_valid { sigma2 } else { r[0] }.sqrt();

    let mut forecasts = Vec::with_capacity(steps);
    let mut sd = Vec::with_capacity(steps);
    let mut used_fallback = false;

    for h in 1..=steps {
        let cross = DVector::from_fn(n, |i, _| r[n + h - 1 - i]);
        let coef = lu.solve(&cross).filter(|c| c.iter().all(|v| v.is_finite()));

        match coef {
            Some(coef) => {
                forecasts.push(coef.dot(&z) + mean);

                let conditional = (r[0] - cross.dot(&coef)).max(0.0);
                let mut var = if h == 1 {
                    conditional.max(innovation_var)
                } else {
                    innovation_var * (1.0 + VARIANCE_GROWTH * h as f64)
                };
                var = var.min(VARIANCE_CAP * process_var);
                if !var.is_finite() || var <= 0.0 {
                    var = innovation_var;
                }
                sd.push(var.sqrt());
            }
            None => {
                used_fallback = true;
                let persisted = match forecasts.last() {
                    Some(&prev) => prev,
                    None => series[n - 1],
                };
                forecasts.push(persisted);
                sd.push(if h == 1 {
                    base_sd
                } else {
                    base_sd * (1.0 + FALLBACK_SD_GROWTH * h as f64)
                });
            }
        }
    }
    (forecasts, sd, used_fallback)
}

/// Standard normal quantile.
fn z_score(p: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
