//! ARTFIMA maximum-likelihood estimation.
//!
//! Multi-start bounded L-BFGS-B over the packed search vector, with a
//! Nelder-Mead fallback when every start fails and a Brent line search
//! when λ is the only free parameter. The winning point is refined into a
//! [`FitResult`]: exact log-likelihood, residuals, observed information and
//! the diagnostics reported to callers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use argmin::core::{CostFunction, Executor, IterState, State, TerminationReason};
use argmin::solver::brent::BrentOpt;
use argmin::solver::neldermead::NelderMead;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::differencing::difference;
use crate::error::{ArtfimaError, Result};
use crate::information::{information_from_hessian, numerical_hessian};
use crate::likelihood::{dl_likelihood, dl_residuals, exact_loglikelihood};
use crate::objective::{ArtfimaObjective, SearchContext};
use crate::params::{PackedLayout, ParameterVector};
use crate::start_params::{compute_start_params, StartGenerator};
use crate::tacvf::artfima_tacvf;
use crate::types::{FitOptions, FitResult, LikelihoodMethod, ModelClass, ModelSpec};

/// Distance to a bound below which an estimate is reported as on it.
const BOUNDARY_TOL: f64 = 0.01;

/// Brent iteration cap for the λ-only search.
const BRENT_MAX_ITERS: u64 = 500;

/// Outcome of one optimizer run.
#[derive(Debug, Clone)]
struct RunOutcome {
    beta: Vec<f64>,
    cost: f64,
    converged: bool,
}

type RunResult = std::result::Result<(RunOutcome, SearchContext), String>;

fn lock(ctx: &Mutex<SearchContext>) -> std::sync::MutexGuard<'_, SearchContext> {
    ctx.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Series preparation
// ---------------------------------------------------------------------------

/// The series as the estimator sees it.
#[derive(Debug, Clone)]
pub(crate) struct PreparedSeries {
    /// After differencing, before centering.
    pub series: Vec<f64>,
    pub anchors: Vec<f64>,
    /// Centered.
    pub w: Vec<f64>,
    pub mean: f64,
}

/// Validate, difference and center a raw series for `spec`.
pub(crate) fn prepare_series(y: &[f64], spec: &ModelSpec) -> Result<PreparedSeries> {
    if y.is_empty() {
        return Err(ArtfimaError::DataError("series is empty".to_string()));
    }
    if let Some(i) = y.iter().position(|v| !v.is_finite()) {
        return Err(ArtfimaError::DataError(format!(
            "series contains a non-finite value at index {}",
            i
        )));
    }

    let (series, anchors) = difference(y, spec.d0);
    let min_obs = spec.min_obs();
    if series.len() < min_obs {
        return Err(ArtfimaError::DataError(format!(
            "Not enough observations: n={} < minimum required {} for model order",
            series.len(),
            min_obs
        )));
    }

    let mean = series.iter().sum::<f64>() / series.len() as f64;
    let w: Vec<f64> = series.iter().map(|v| v - mean).collect();
    let ss: f64 = w.iter().map(|v| v * v).sum();
    if !(ss > 0.0) {
        return Err(ArtfimaError::DataError(
            "series has zero variance".to_string(),
        ));
    }

    Ok(PreparedSeries {
        series,
        anchors,
        w,
        mean,
    })
}

// ---------------------------------------------------------------------------
// L-BFGS-B (box-constrained)
// ---------------------------------------------------------------------------

/// Forward-difference gradient, stepping backwards at an upper bound.
fn fd_gradient(
    objective: &ArtfimaObjective,
    x: &[f64],
    f0: f64,
    bounds: &[(f64, f64)],
    ctx: &mut SearchContext,
    g: &mut [f64],
) {
    let eps = f64::EPSILON.sqrt();
    let mut x_work = x.to_vec();
    for i in 0..x.len() {
        let orig = x_work[i];
        let mut h = eps * orig.abs().max(1.0);
        if orig + h > bounds[i].1 {
            h = -h;
        }
        x_work[i] = orig + h;
        let f_step = objective.evaluate(&x_work, ctx);
        x_work[i] = orig;
        g[i] = (f_step - f0) / h;
        if !g[i].is_finite() {
            g[i] = 0.0;
        }
    }
}

fn run_lbfgsb(objective: &Arc<ArtfimaObjective>, init_params: Vec<f64>, maxiter: u64) -> RunResult {
    let obj = Arc::clone(objective);
    let box_bounds = obj.layout.bounds(&obj.bounds);
    let ctx = Arc::new(Mutex::new(SearchContext::new()));
    let ctx_inner = Arc::clone(&ctx);
    let call_count = Arc::new(AtomicU64::new(0));
    let call_count_inner = Arc::clone(&call_count);
    let hit_limit = Arc::new(AtomicBool::new(false));
    let hit_limit_inner = Arc::clone(&hit_limit);
    let grad_bounds = box_bounds.clone();

    let evaluate = move |x: &[f64], g: &mut [f64]| -> anyhow::Result<f64> {
        let mut ctx = lock(&ctx_inner);

        // The lbfgsb crate has no call cap: past the limit the gradient is
        // zeroed so the optimizer stops where it is.
        if call_count_inner.load(Ordering::Relaxed) >= maxiter {
            hit_limit_inner.store(true, Ordering::Relaxed);
            g.iter_mut().for_each(|g_i| *g_i = 0.0);
            return Ok(obj.evaluate(x, &mut ctx));
        }
        call_count_inner.fetch_add(1, Ordering::Relaxed);

        let cost = obj.evaluate(x, &mut ctx);
        if cost >= obj.penalty() {
            g.iter_mut().for_each(|g_i| *g_i = 0.0);
            return Ok(cost);
        }
        fd_gradient(&obj, x, cost, &grad_bounds, &mut ctx, g);
        Ok(cost)
    };

    let param = lbfgsb::LbfgsbParameter {
        m: 10,
        factr: 1e7,
        pgtol: 1e-5,
        iprint: -1,
    };

    let mut problem = lbfgsb::LbfgsbProblem::build(init_params, evaluate);
    problem.set_bounds(
        box_bounds
            .iter()
            .map(|&(lo, hi)| (Some(lo), Some(hi)))
            .collect::<Vec<_>>(),
    );

    let mut state = lbfgsb::LbfgsbState::new(problem, param);
    state
        .minimize()
        .map_err(|e| format!("L-BFGS-B failed: {}", e))?;

    let outcome = RunOutcome {
        beta: state.x().to_vec(),
        cost: state.fx(),
        converged: !hit_limit.load(Ordering::Relaxed),
    };
    let ctx = lock(&ctx).clone();
    Ok((outcome, ctx))
}

// ---------------------------------------------------------------------------
// Nelder-Mead fallback and Brent line search
// ---------------------------------------------------------------------------

/// argmin adapter over the packed objective.
struct PackedCost {
    objective: Arc<ArtfimaObjective>,
    ctx: Arc<Mutex<SearchContext>>,
}

impl CostFunction for PackedCost {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        Ok(self.objective.evaluate(param, &mut lock(&self.ctx)))
    }
}

/// argmin adapter for the λ-only objective.
struct LambdaCost {
    objective: Arc<ArtfimaObjective>,
    ctx: Arc<Mutex<SearchContext>>,
}

impl CostFunction for LambdaCost {
    type Param = f64;
    type Output = f64;

    fn cost(&self, lambda: &f64) -> std::result::Result<f64, argmin::core::Error> {
        Ok(self.objective.evaluate(&[*lambda], &mut lock(&self.ctx)))
    }
}

fn run_nelder_mead(objective: &Arc<ArtfimaObjective>, init_params: Vec<f64>, maxiter: u64) -> RunResult {
    let n = init_params.len();

    let mut simplex = vec![init_params.clone()];
    for i in 0..n {
        let mut vertex = init_params.clone();
        let delta = if vertex[i].abs() > 1e-8 {
            vertex[i] * 0.05
        } else {
            0.00025
        };
        vertex[i] += delta;
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(1e-6)
        .map_err(|e| e.to_string())?;

    let ctx = Arc::new(Mutex::new(SearchContext::new()));
    let cost = PackedCost {
        objective: Arc::clone(objective),
        ctx: Arc::clone(&ctx),
    };

    let result = Executor::new(cost, solver)
        .configure(|state: IterState<Vec<f64>, (), (), (), (), f64>| state.max_iters(maxiter))
        .run()
        .map_err(|e| format!("Nelder-Mead failed: {}", e))?;

    let state = result.state();
    let beta = state
        .get_best_param()
        .ok_or("Nelder-Mead: no best parameter found")?
        .clone();
    let outcome = RunOutcome {
        beta,
        cost: state.get_best_cost(),
        converged: state.get_termination_reason() == Some(&TerminationReason::SolverConverged),
    };
    let ctx = lock(&ctx).clone();
    Ok((outcome, ctx))
}

fn run_brent(objective: &Arc<ArtfimaObjective>) -> RunResult {
    let solver = BrentOpt::new(objective.bounds.lambda_min, objective.bounds.lambda_max);

    let ctx = Arc::new(Mutex::new(SearchContext::new()));
    let cost = LambdaCost {
        objective: Arc::clone(objective),
        ctx: Arc::clone(&ctx),
    };

    let result = Executor::new(cost, solver)
        .configure(|state: IterState<f64, (), (), (), (), f64>| state.max_iters(BRENT_MAX_ITERS))
        .run()
        .map_err(|e| format!("Brent failed: {}", e))?;

    let state = result.state();
    let lambda = *state
        .get_best_param()
        .ok_or("Brent: no best parameter found")?;
    let outcome = RunOutcome {
        beta: vec![lambda],
        cost: state.get_best_cost(),
        converged: state.get_termination_reason() == Some(&TerminationReason::SolverConverged),
    };
    let ctx = lock(&ctx).clone();
    Ok((outcome, ctx))
}

// ---------------------------------------------------------------------------
// Multi-start search
// ---------------------------------------------------------------------------

/// Run L-BFGS-B from every start and keep the best finite value below the
/// penalty. Every run's context is folded into `global`.
fn multi_start(
    objective: &Arc<ArtfimaObjective>,
    starts: &[(String, Vec<f64>)],
    options: &FitOptions,
    global: &Mutex<SearchContext>,
) -> Option<RunOutcome> {
    let run_one = |(name, beta0): &(String, Vec<f64>)| -> Option<RunOutcome> {
        match run_lbfgsb(objective, beta0.clone(), options.maxiter) {
            Ok((outcome, ctx)) => {
                lock(global).merge(&ctx);
                debug!(
                    start = name.as_str(),
                    cost = outcome.cost,
                    converged = outcome.converged,
                    evaluations = ctx.evaluations,
                    "L-BFGS-B run finished"
                );
                Some(outcome)
            }
            Err(e) => {
                debug!(start = name.as_str(), error = %e, "L-BFGS-B run failed");
                None
            }
        }
    };

    let outcomes: Vec<Option<RunOutcome>> = if options.parallel_starts {
        starts.par_iter().map(run_one).collect()
    } else {
        starts.iter().map(run_one).collect()
    };

    let penalty = objective.penalty();
    outcomes
        .into_iter()
        .flatten()
        .filter(|o| o.cost.is_finite() && o.cost < penalty)
        .fold(None, |best: Option<RunOutcome>, o| match best {
            Some(b) if b.cost <= o.cost => Some(b),
            _ => Some(o),
        })
}

/// Whether the estimate sits within [`BOUNDARY_TOL`] of a long-memory bound.
fn on_boundary(spec: &ModelSpec, params: &ParameterVector) -> bool {
    let b = &spec.bounds;
    match spec.class {
        ModelClass::Artfima => {
            let near_lambda = params
                .lambda
                .map_or(false, |l| b.lambda_max - l < BOUNDARY_TOL);
            let near_d = spec.fixed_d.is_none()
                && params.d.map_or(false, |d| b.d_max - d.abs() < BOUNDARY_TOL);
            near_lambda || near_d
        }
        ModelClass::Arfima => params
            .d
            .map_or(false, |d| b.arfima_d_max - d.abs() < BOUNDARY_TOL),
        ModelClass::Arma => false,
    }
}

// ---------------------------------------------------------------------------
// Public fit() entry point
// ---------------------------------------------------------------------------

/// Fit an ARTFIMA, ARFIMA or ARMA model by maximum likelihood.
///
/// # Arguments
/// * `y` - Observed time series
/// * `spec` - Model class, orders, differencing, bounds and objective
/// * `options` - Starts, call cap and parallelism
pub fn fit(y: &[f64], spec: &ModelSpec, options: &FitOptions) -> Result<FitResult> {
    spec.validate()?;
    let prepared = prepare_series(y, spec)?;
    info!(
        class = spec.class.as_str(),
        p = spec.p,
        d0 = spec.d0,
        q = spec.q,
        n = prepared.w.len(),
        likelihood = spec.likelihood.as_str(),
        "fitting model"
    );

    let objective = Arc::new(ArtfimaObjective::new(spec, prepared.w.clone()));

    // 1. No free parameters: the null model is the answer.
    if objective.layout.is_empty() {
        debug!("no free parameters, reporting the null model");
        return finalize(&objective, spec, prepared, Vec::new(), true, "null".to_string(), 0);
    }

    let global = Mutex::new(SearchContext::new());

    // 2. Search.
    let (chosen, mut method) = if spec.fixed_d.is_some() && spec.p == 0 && spec.q == 0 {
        debug!("lambda is the only free parameter, using Brent");
        match run_brent(&objective) {
            Ok((outcome, ctx)) => {
                lock(&global).merge(&ctx);
                (Some(outcome), "brent".to_string())
            }
            Err(e) => {
                warn!(error = %e, "Brent search failed");
                (None, "brent".to_string())
            }
        }
    } else {
        let starts = compute_start_params(spec, options)?;
        match multi_start(&objective, &starts, options, &global) {
            Some(outcome) => (Some(outcome), "lbfgsb".to_string()),
            None => {
                warn!("every start failed, falling back to Nelder-Mead");
                let beta0 = StartGenerator::low_d().generate(spec);
                match run_nelder_mead(&objective, beta0, options.maxiter) {
                    Ok((outcome, ctx)) => {
                        lock(&global).merge(&ctx);
                        let ok = outcome.cost.is_finite() && outcome.cost < objective.penalty();
                        (ok.then_some(outcome), "nelder-mead (fallback)".to_string())
                    }
                    Err(e) => {
                        warn!(error = %e, "Nelder-Mead fallback failed");
                        (None, "nelder-mead (fallback)".to_string())
                    }
                }
            }
        }
    };

    // 3. The chosen point must be feasible; otherwise take the best
    //    feasible point seen along any trajectory.
    let global = global.into_inner().unwrap_or_else(PoisonError::into_inner);
    let (beta, converged) = match chosen {
        Some(o) if objective.value(&o.beta).is_ok() => (o.beta, o.converged),
        _ => match &global.best {
            Some((beta, _)) => {
                warn!("optimum is infeasible, using the best feasible point visited");
                method.push_str("+best-feasible");
                (beta.clone(), false)
            }
            None => {
                return Err(ArtfimaError::OptimizationFailed(
                    "no feasible parameter point was found".to_string(),
                ));
            }
        },
    };

    finalize(&objective, spec, prepared, beta, converged, method, global.evaluations)
}

/// Exact profile log-likelihood of a raw series under `spec` at `params`,
/// after the same differencing and centering as [`fit`].
pub fn loglike_at(y: &[f64], spec: &ModelSpec, params: &ParameterVector) -> Result<f64> {
    spec.validate()?;
    let layout = PackedLayout::from_spec(spec);
    let params = layout.unpack(&layout.pack(params)?)?;
    let prepared = prepare_series(y, spec)?;
    let r = artfima_tacvf(&params, prepared.w.len() - 1, 1.0)?;
    Ok(dl_likelihood(&r, &prepared.w)?.loglike)
}

/// Build the reported result at the chosen packed point.
fn finalize(
    objective: &ArtfimaObjective,
    spec: &ModelSpec,
    prepared: PreparedSeries,
    beta: Vec<f64>,
    converged: bool,
    method: String,
    n_evals: u64,
) -> Result<FitResult> {
    let w = &prepared.w;
    let n = w.len();
    let params = objective.feasible_params(&beta)?;

    let r = artfima_tacvf(&params, n - 1, 1.0)?;
    let ll = match exact_loglikelihood(&r, w) {
        Ok(out) => out,
        Err(e) => {
            debug!(error = %e, "Cholesky likelihood failed, using Durbin-Levinson");
            dl_likelihood(&r, w)?
        }
    };
    let sigma2 = ll.sigma2;

    let (residuals, residuals_positive_definite) = match dl_residuals(&r, w) {
        Ok(out) => (out.residuals, out.positive_definite),
        Err(e) => {
            warn!(error = %e, "residuals unavailable");
            (Vec::new(), false)
        }
    };

    let information = if beta.is_empty() {
        None
    } else {
        let (scale, se_scale) = match spec.likelihood {
            LikelihoodMethod::Exact => (1.0, 1.0),
            LikelihoodMethod::Whittle => (sigma2, sigma2.sqrt() / (n as f64).sqrt()),
        };
        let info = numerical_hessian(|b| objective.value(b), &beta)
            .and_then(|h| information_from_hessian(h, scale, se_scale));
        if info.is_none() {
            warn!("observed information unavailable, no standard errors");
        }
        info
    };
    let (hessian, covariance, std_errors) = match information {
        Some(info) => {
            let mut se = info.std_errors;
            if spec.fixed_d.is_some() {
                se.insert(0, 0.0);
            }
            (Some(info.hessian), Some(info.covariance), Some(se))
        }
        None if beta.is_empty() => (None, None, Some(Vec::new())),
        None => (None, None, None),
    };

    let nf = n as f64;
    let long_run: f64 = r[0]
        + 2.0
            * r[1..]
                .iter()
                .enumerate()
                .map(|(k, rk)| (1.0 - (k + 1) as f64 / nf) * rk)
                .sum::<f64>();
    let se_mean = (sigma2 * long_run / nf).max(0.0).sqrt();
    let var_w = w.iter().map(|v| v * v).sum::<f64>() / nf;
    let snr = (var_w - sigma2) / sigma2;

    let boundary = on_boundary(spec, &params);
    info!(
        loglike = ll.loglike,
        sigma2,
        converged,
        on_boundary = boundary,
        evaluations = n_evals,
        method = method.as_str(),
        "fit finished"
    );

    Ok(FitResult {
        spec: spec.clone(),
        estimate: params,
        packed: beta,
        sigma2,
        loglike: ll.loglike,
        aic: 0.0,
        bic: 0.0,
        n_obs: n,
        n_params: spec.n_estimated_params(),
        converged,
        on_boundary: boundary,
        std_errors,
        covariance,
        hessian,
        residuals,
        residuals_positive_definite,
        tacvf: r,
        mean: prepared.mean,
        se_mean,
        snr,
        null_loglike: objective.null_loglike(),
        n_evals,
        method,
        series: prepared.series,
        anchors: prepared.anchors,
    }
    .with_information_criteria())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixtures() -> serde_json::Value {
        let path = concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/artfima_reference.json"
        );
        let data = std::fs::read_to_string(path).expect("fixtures file not found");
        serde_json::from_str(&data).expect("invalid JSON")
    }

    fn series(case: &serde_json::Value) -> Vec<f64> {
        case["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn test_fit_null_model() {
        let fixtures = load_fixtures();
        let case = &fixtures["white_noise"];
        let data = series(case);
        let spec = ModelSpec::new(ModelClass::Arma, 0, 0);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();

        let expected = case["null_loglike"].as_f64().unwrap();
        assert_eq!(result.method, "null");
        assert!(result.converged);
        assert_eq!(result.n_params, 0);
        assert_eq!(result.n_evals, 0);
        assert!((result.loglike - expected).abs() < 1e-9, "got {}", result.loglike);
        assert!((result.null_loglike - expected).abs() < 1e-9);
        assert!((result.mean - case["mean"].as_f64().unwrap()).abs() < 1e-12);
        assert!(result.snr.abs() < 1e-12);
        assert_eq!(result.residuals.len(), data.len());
    }

    #[test]
    fn test_fit_artfima_on_white_noise() {
        let fixtures = load_fixtures();
        let case = &fixtures["white_noise"];
        let data = series(case);
        let null = case["null_loglike"].as_f64().unwrap();

        let spec = ModelSpec::new(ModelClass::Artfima, 0, 0);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();
        // nests white noise; the gain over it is a χ²₂/2 draw
        let gain = result.loglike - null;
        assert!(gain >= -1e-6, "ARTFIMA loglike {} below null {}", result.loglike, null);
        assert!(gain < 3.0, "gain {} over white noise", gain);
        assert!(result.converged);
        assert_eq!(result.n_params, 2);
        assert!(result.n_evals > 0);
        let d = result.estimate.d.unwrap();
        if spec.bounds.d_max - d.abs() < BOUNDARY_TOL {
            assert!(result.on_boundary, "d = {} at the box edge", d);
        }
    }

    fn assert_finite_std_errors(result: &FitResult) {
        if result.on_boundary {
            return;
        }
        let se = result.std_errors.as_ref().expect("standard errors");
        assert_eq!(se.len(), result.packed.len());
        assert!(se.iter().all(|v| v.is_finite() && *v > 0.0), "se = {:?}", se);
    }

    #[test]
    fn test_fit_artfima_nests_arma() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["ar1"]);
        let opts = FitOptions::default().with_maxiter(2000);
        let arma = fit(&data, &ModelSpec::new(ModelClass::Arma, 1, 0), &opts).unwrap();

        for q in [0, 1] {
            let spec = ModelSpec::new(ModelClass::Artfima, 1, q);
            let result = fit(&data, &spec, &opts).unwrap();
            assert!(
                result.loglike >= arma.loglike - 1e-3,
                "ARTFIMA(1,{}) loglike {} below ARMA(1,0) {}",
                q,
                result.loglike,
                arma.loglike
            );
            assert!(result.converged, "ARTFIMA(1,{}) did not converge", q);
            assert_eq!(result.packed.len(), 3 + q);
            assert_finite_std_errors(&result);
        }
    }

    #[test]
    fn test_whittle_artfima_fit() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["fdwn"]);
        let spec = ModelSpec::new(ModelClass::Artfima, 1, 0).with_likelihood(LikelihoodMethod::Whittle);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();

        assert!(result.converged);
        assert_eq!(result.method, "lbfgsb");
        let d = result.estimate.d.unwrap();
        let lambda = result.estimate.lambda.unwrap();
        assert!(d.abs() <= spec.bounds.d_max, "d = {}", d);
        assert!(
            (spec.bounds.lambda_min..=spec.bounds.lambda_max).contains(&lambda),
            "λ = {}",
            lambda
        );
        assert!(result.loglike.is_finite());
        assert_finite_std_errors(&result);
    }

    #[test]
    fn test_fit_ar1() {
        let fixtures = load_fixtures();
        let case = &fixtures["ar1"];
        let data = series(case);
        let expected_phi = case["phi_mle"].as_f64().unwrap();
        let expected_ll = case["loglike_mle"].as_f64().unwrap();

        let spec = ModelSpec::new(ModelClass::Arma, 1, 0);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();

        assert!(result.converged, "AR(1) fit should converge");
        let phi_err = (result.estimate.phi[0] - expected_phi).abs();
        assert!(
            phi_err < 5e-3,
            "AR(1) param error too large: {} (got {}, expected {})",
            phi_err,
            result.estimate.phi[0],
            expected_phi
        );
        assert!(result.loglike <= expected_ll + 1e-6);
        assert!(
            result.loglike > expected_ll - 1e-3,
            "AR(1) loglike {} vs {}",
            result.loglike,
            expected_ll
        );
        assert_eq!(result.estimate.phi[0], result.packed[0]);
        assert!(!result.on_boundary);
    }

    #[test]
    fn test_ar1_standard_error() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["ar1"]);
        let spec = ModelSpec::new(ModelClass::Arma, 1, 0);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();

        // asymptotic se of φ̂ is √((1-φ²)/n)
        let phi = result.estimate.phi[0];
        let asymptotic = ((1.0 - phi * phi) / result.n_obs as f64).sqrt();
        let se = result.std_errors.as_ref().expect("standard errors")[0];
        assert!(
            (se - asymptotic).abs() < 0.01,
            "se {} vs asymptotic {}",
            se,
            asymptotic
        );
        let cov = result.covariance.as_ref().unwrap();
        assert!((cov[(0, 0)] - se * se).abs() < 1e-12);
    }

    #[test]
    fn test_fit_arfima_fractional_noise() {
        let fixtures = load_fixtures();
        let case = &fixtures["fdwn"];
        let data = series(case);
        let expected_d = case["d_mle"].as_f64().unwrap();
        let expected_ll = case["loglike_mle"].as_f64().unwrap();

        let spec = ModelSpec::new(ModelClass::Arfima, 0, 0);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();

        let d = result.estimate.d.unwrap();
        assert!(
            (d - expected_d).abs() < 5e-3,
            "ARFIMA d error: got {}, expected {}",
            d,
            expected_d
        );
        assert!(result.loglike <= expected_ll + 1e-6);
        assert!(result.loglike > expected_ll - 1e-3);
        assert!(result.estimate.lambda.is_none());
        assert!(result.snr > 0.0);
    }

    #[test]
    fn test_fixed_d_uses_brent() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["fdwn"]);
        let spec = ModelSpec::new(ModelClass::Artfima, 0, 0).with_fixed_d(0.3);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();

        assert_eq!(result.method, "brent");
        assert_eq!(result.estimate.d, Some(0.3));
        let lambda = result.estimate.lambda.unwrap();
        assert!((1e-6..=3.0).contains(&lambda));
        assert_eq!(result.n_params, 1);
        if let Some(se) = &result.std_errors {
            assert_eq!(se.len(), 2);
            assert_eq!(se[0], 0.0);
        }
    }

    #[test]
    fn test_fixed_d_with_arma_terms() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["ar1"]);
        let spec = ModelSpec::new(ModelClass::Artfima, 1, 0).with_fixed_d(0.1);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();
        assert_eq!(result.estimate.d, Some(0.1));
        assert_eq!(result.packed.len(), 2);
        assert_eq!(result.method, "lbfgsb");
    }

    #[test]
    fn test_input_errors() {
        let spec = ModelSpec::new(ModelClass::Arma, 0, 0);
        let opts = FitOptions::default();

        assert!(matches!(fit(&[], &spec, &opts), Err(ArtfimaError::DataError(_))));

        let mut with_nan = vec![0.5; 30];
        with_nan[3] = f64::NAN;
        with_nan[4] = 1.0;
        assert!(matches!(fit(&with_nan, &spec, &opts), Err(ArtfimaError::DataError(_))));

        let short: Vec<f64> = (0..20).map(|i| (i as f64).sin()).collect();
        assert!(matches!(fit(&short, &spec, &opts), Err(ArtfimaError::DataError(_))));

        let constant = vec![2.5; 50];
        assert!(matches!(fit(&constant, &spec, &opts), Err(ArtfimaError::DataError(_))));

        let data: Vec<f64> = (0..50).map(|i| (i as f64 * 0.7).sin()).collect();
        let bad = ModelSpec::new(ModelClass::Arfima, 0, 0).with_fixed_d(0.2);
        assert!(matches!(fit(&data, &bad, &opts), Err(ArtfimaError::InvalidModelSpec(_))));
    }

    #[test]
    fn test_differencing_shortens_series() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["ar1"]);
        let mut level = 0.0;
        let integrated: Vec<f64> = data
            .iter()
            .map(|v| {
                level += v;
                level
            })
            .collect();

        let spec = ModelSpec::new(ModelClass::Arma, 1, 0).with_differencing(1);
        let result = fit(&integrated, &spec, &FitOptions::default()).unwrap();
        assert_eq!(result.n_obs, data.len() - 1);
        assert_eq!(result.anchors, vec![level]);
        assert_eq!(result.series.len(), data.len() - 1);
        assert!((result.series[0] - data[1]).abs() < 1e-9);
    }

    #[test]
    fn test_aic_bic() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["ar1"]);
        let spec = ModelSpec::new(ModelClass::Artfima, 1, 0);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();

        let k = result.n_params as f64;
        let n = result.n_obs as f64;
        assert_eq!(result.n_params, 3);
        assert!((result.aic - (-2.0 * result.loglike + 2.0 * k)).abs() < 1e-10);
        assert!((result.bic - (-2.0 * result.loglike + k * n.ln())).abs() < 1e-10);
    }

    #[test]
    fn test_fit_with_caller_start() {
        let fixtures = load_fixtures();
        let case = &fixtures["ar1"];
        let data = series(case);
        let spec = ModelSpec::new(ModelClass::Arma, 1, 0);
        let opts = FitOptions::default().with_start(ParameterVector::arma(vec![0.5], vec![]));
        let result = fit(&data, &spec, &opts).unwrap();
        let expected = case["phi_mle"].as_f64().unwrap();
        assert!((result.estimate.phi[0] - expected).abs() < 5e-3);

        let explosive = FitOptions::default().with_start(ParameterVector::arma(vec![1.5], vec![]));
        assert!(fit(&data, &spec, &explosive).is_err());
    }

    #[test]
    fn test_parallel_starts_match_sequential() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["fdwn"]);
        let spec = ModelSpec::new(ModelClass::Arfima, 0, 0);
        let seq = fit(&data, &spec, &FitOptions::default()).unwrap();
        let par = fit(&data, &spec, &FitOptions::default().with_parallel_starts(true)).unwrap();
        assert_eq!(seq.packed, par.packed);
        assert_eq!(seq.n_evals, par.n_evals);
    }

    #[test]
    fn test_zero_maxiter_not_converged() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["fdwn"]);
        let spec = ModelSpec::new(ModelClass::Arfima, 0, 0);
        let result = fit(&data, &spec, &FitOptions::default().with_maxiter(0)).unwrap();
        assert!(!result.converged, "maxiter=0 must report not converged");
        assert!(result.loglike.is_finite());
    }

    #[test]
    fn test_whittle_fit() {
        let fixtures = load_fixtures();
        let data = series(&fixtures["fdwn"]);
        let spec = ModelSpec::new(ModelClass::Arfima, 0, 0).with_likelihood(LikelihoodMethod::Whittle);
        let result = fit(&data, &spec, &FitOptions::default()).unwrap();
        let d = result.estimate.d.unwrap();
        assert!((d - 0.3).abs() < 0.15, "Whittle d = {}", d);
        assert!(result.loglike.is_finite());
        assert!(result.sigma2 > 0.0);
    }

    #[test]
    fn test_loglike_at_reference_point() {
        let fixtures = load_fixtures();
        let case = &fixtures["ar1"];
        let data = series(case);
        let spec = ModelSpec::new(ModelClass::Arma, 1, 0);
        let ll = loglike_at(&data, &spec, &ParameterVector::arma(vec![0.6], vec![])).unwrap();
        let expected = case["loglike_at_true"].as_f64().unwrap();
        assert!((ll - expected).abs() < 1e-8, "got {}, expected {}", ll, expected);

        let fixed = ModelSpec::new(ModelClass::Artfima, 0, 0).with_fixed_d(0.3);
        let params = ParameterVector::new(None, Some(0.5), vec![], vec![]);
        assert!(loglike_at(&data, &fixed, &params).unwrap().is_finite());
    }

    #[test]
    fn test_on_boundary() {
        let spec = ModelSpec::new(ModelClass::Arfima, 0, 0);
        assert!(on_boundary(&spec, &ParameterVector::new(Some(0.485), None, vec![], vec![])));
        assert!(!on_boundary(&spec, &ParameterVector::new(Some(0.3), None, vec![], vec![])));

        let spec = ModelSpec::new(ModelClass::Artfima, 0, 0);
        assert!(on_boundary(&spec, &ParameterVector::new(Some(0.3), Some(2.995), vec![], vec![])));
        assert!(on_boundary(&spec, &ParameterVector::new(Some(-9.995), Some(1.0), vec![], vec![])));
        assert!(!on_boundary(&spec, &ParameterVector::new(Some(0.3), Some(1.0), vec![], vec![])));
    }
}
