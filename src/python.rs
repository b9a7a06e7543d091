use numpy::PyReadonlyArray1;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::batch;
use crate::error::ArtfimaError;
use crate::forecast;
use crate::optimizer;
use crate::params::ParameterVector;
use crate::tacvf;
use crate::types::{Bounds, FitOptions, FitResult, LikelihoodMethod, ModelClass, ModelSpec};

fn value_error(e: ArtfimaError) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(e.to_string())
}

/// Smoke-test function: returns the version string.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn build_spec(
    glp: &str,
    order: (usize, usize, usize),
    likelihood: &str,
    fixed_d: Option<f64>,
    lambda_max: f64,
    d_max: f64,
) -> PyResult<ModelSpec> {
    let (p, d0, q) = order;
    let class = ModelClass::parse(glp).map_err(value_error)?;
    let likelihood = LikelihoodMethod::parse(likelihood).map_err(value_error)?;
    let bounds = Bounds {
        d_max,
        lambda_max,
        ..Bounds::default()
    };
    let mut spec = ModelSpec::new(class, p, q)
        .with_differencing(d0)
        .with_bounds(bounds)
        .with_likelihood(likelihood);
    if let Some(d) = fixed_d {
        spec = spec.with_fixed_d(d);
    }
    spec.validate().map_err(value_error)?;
    Ok(spec)
}

fn rows(m: &nalgebra::DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows())
        .map(|i| m.row(i).iter().copied().collect())
        .collect()
}

fn fit_to_dict<'py>(py: Python<'py>, result: FitResult) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("glp", result.spec.class.as_str())?;
    dict.set_item("d", result.estimate.d)?;
    dict.set_item("lambda", result.estimate.lambda)?;
    dict.set_item("phi", result.estimate.phi)?;
    dict.set_item("theta", result.estimate.theta)?;
    dict.set_item("packed", result.packed)?;
    dict.set_item("sigma2", result.sigma2)?;
    dict.set_item("loglike", result.loglike)?;
    dict.set_item("aic", result.aic)?;
    dict.set_item("bic", result.bic)?;
    dict.set_item("n_obs", result.n_obs)?;
    dict.set_item("n_params", result.n_params)?;
    dict.set_item("converged", result.converged)?;
    dict.set_item("on_boundary", result.on_boundary)?;
    dict.set_item("std_errors", result.std_errors)?;
    dict.set_item("covariance", result.covariance.as_ref().map(rows))?;
    dict.set_item("hessian", result.hessian.as_ref().map(rows))?;
    dict.set_item("residuals", result.residuals)?;
    dict.set_item("tacvf", result.tacvf)?;
    dict.set_item("mean", result.mean)?;
    dict.set_item("se_mean", result.se_mean)?;
    dict.set_item("snr", result.snr)?;
    dict.set_item("null_loglike", result.null_loglike)?;
    dict.set_item("n_evals", result.n_evals)?;
    dict.set_item("method", result.method)?;
    Ok(dict)
}

/// Fit an ARTFIMA / ARFIMA / ARMA model by maximum likelihood.
///
/// `order` is (p, d0, q) with d0 the integer differencing applied first.
/// Returns a dict with the estimates, likelihood, information criteria
/// and diagnostics.
#[pyfunction]
#[pyo3(signature = (y, glp="ARTFIMA", order=(0, 0, 0), likelihood="exact", fixed_d=None,
                    lambda_max=3.0, d_max=10.0, maxiter=500, parallel_starts=false))]
fn artfima_fit<'py>(
    py: Python<'py>,
    y: PyReadonlyArray1<'py, f64>,
    glp: &str,
    order: (usize, usize, usize),
    likelihood: &str,
    fixed_d: Option<f64>,
    lambda_max: f64,
    d_max: f64,
    maxiter: u64,
    parallel_starts: bool,
) -> PyResult<Py<PyDict>> {
    let endog = y.as_slice()?;
    let spec = build_spec(glp, order, likelihood, fixed_d, lambda_max, d_max)?;
    let options = FitOptions::default()
        .with_maxiter(maxiter)
        .with_parallel_starts(parallel_starts);

    let result = optimizer::fit(endog, &spec, &options).map_err(value_error)?;
    Ok(fit_to_dict(py, result)?.into())
}

/// Forecast with known parameters.
///
/// Returns a dict with: mean, sd, ci_lower, ci_upper, used_fallback.
#[pyfunction]
#[pyo3(signature = (y, glp="ARTFIMA", order=(0, 0, 0), d=None, lam=None, phi=vec![],
                    theta=vec![], fixed_d=None, steps=10, alpha=0.05))]
fn artfima_forecast<'py>(
    py: Python<'py>,
    y: PyReadonlyArray1<'py, f64>,
    glp: &str,
    order: (usize, usize, usize),
    d: Option<f64>,
    lam: Option<f64>,
    phi: Vec<f64>,
    theta: Vec<f64>,
    fixed_d: Option<f64>,
    steps: usize,
    alpha: f64,
) -> PyResult<Py<PyDict>> {
    if steps > 10_000 {
        return Err(pyo3::exceptions::PyValueError::new_err(format!(
            "steps must be <= 10000, got {}",
            steps
        )));
    }

    let endog = y.as_slice()?;
    let spec = build_spec(glp, order, "exact", fixed_d, 3.0, 10.0)?;
    let params = ParameterVector::new(d, lam, phi, theta);

    let result = forecast::forecast_with_parameters(endog, &spec, &params, steps, alpha)
        .map_err(value_error)?;

    let dict = PyDict::new(py);
    dict.set_item("mean", result.mean)?;
    dict.set_item("sd", result.sd)?;
    dict.set_item("ci_lower", result.ci_lower)?;
    dict.set_item("ci_upper", result.ci_upper)?;
    dict.set_item("used_fallback", result.used_fallback)?;
    Ok(dict.into())
}

/// Theoretical autocovariance at lags 0..=maxlag.
#[pyfunction]
#[pyo3(signature = (maxlag, d=None, lam=None, phi=vec![], theta=vec![], sigma2=1.0))]
fn artfima_tacvf(
    maxlag: usize,
    d: Option<f64>,
    lam: Option<f64>,
    phi: Vec<f64>,
    theta: Vec<f64>,
    sigma2: f64,
) -> PyResult<Vec<f64>> {
    let params = ParameterVector::new(d, lam, phi, theta);
    tacvf::artfima_tacvf(&params, maxlag, sigma2).map_err(|e| value_error(e.into()))
}

/// Exact profile log-likelihood of `y` at the given parameters.
#[pyfunction]
#[pyo3(signature = (y, glp="ARTFIMA", order=(0, 0, 0), d=None, lam=None, phi=vec![],
                    theta=vec![], fixed_d=None))]
fn artfima_loglike<'py>(
    y: PyReadonlyArray1<'py, f64>,
    glp: &str,
    order: (usize, usize, usize),
    d: Option<f64>,
    lam: Option<f64>,
    phi: Vec<f64>,
    theta: Vec<f64>,
    fixed_d: Option<f64>,
) -> PyResult<f64> {
    let endog = y.as_slice()?;
    let spec = build_spec(glp, order, "exact", fixed_d, 3.0, 10.0)?;
    let params = ParameterVector::new(d, lam, phi, theta);
    optimizer::loglike_at(endog, &spec, &params).map_err(value_error)
}

/// Fit the same model to many series in parallel (Rayon).
///
/// Returns a list of dicts (one per series), each with the same keys as
/// artfima_fit. Failed series return a dict with an "error" key instead.
#[pyfunction]
#[pyo3(signature = (series_list, glp="ARTFIMA", order=(0, 0, 0), likelihood="exact",
                    fixed_d=None, maxiter=500))]
fn artfima_batch_fit<'py>(
    py: Python<'py>,
    series_list: Vec<PyReadonlyArray1<'py, f64>>,
    glp: &str,
    order: (usize, usize, usize),
    likelihood: &str,
    fixed_d: Option<f64>,
    maxiter: u64,
) -> PyResult<Py<PyList>> {
    let spec = build_spec(glp, order, likelihood, fixed_d, 3.0, 10.0)?;
    let options = FitOptions::default().with_maxiter(maxiter);

    // Copy out of the Python arrays while holding the GIL
    let series: Vec<Vec<f64>> = series_list
        .iter()
        .map(|a| a.as_slice().map(|s| s.to_vec()))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let results = py.allow_threads(|| batch::batch_fit(&series, &spec, &options));

    let py_results = results
        .into_iter()
        .map(|r| match r {
            Ok(result) => fit_to_dict(py, result),
            Err(e) => {
                let dict = PyDict::new(py);
                dict.set_item("error", e.to_string())?;
                dict.set_item("converged", false)?;
                Ok(dict)
            }
        })
        .collect::<PyResult<Vec<_>>>()?;

    let list = PyList::new(py, py_results)?;
    Ok(list.into())
}

/// Python module definition.
#[pymodule]
fn artfima_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(artfima_fit, m)?)?;
    m.add_function(wrap_pyfunction!(artfima_forecast, m)?)?;
    m.add_function(wrap_pyfunction!(artfima_tacvf, m)?)?;
    m.add_function(wrap_pyfunction!(artfima_loglike, m)?)?;
    m.add_function(wrap_pyfunction!(artfima_batch_fit, m)?)?;
    Ok(())
}
