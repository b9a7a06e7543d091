use nalgebra::DMatrix;

use crate::error::{ArtfimaError, Result};
use crate::params::ParameterVector;
use crate::start_params::StartGenerator;

/// Model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelClass {
    Artfima, // d and λ
    Arfima,  // d only
    Arma,    // no long-memory parameters
}

impl ModelClass {
    /// Number of long-memory parameters carried by the class.
    pub fn glp_order(&self) -> usize {
        match self {
            ModelClass::Artfima => 2,
            ModelClass::Arfima => 1,
            ModelClass::Arma => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelClass::Artfima => "ARTFIMA",
            ModelClass::Arfima => "ARFIMA",
            ModelClass::Arma => "ARMA",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ARTFIMA" => Ok(ModelClass::Artfima),
            "ARFIMA" => Ok(ModelClass::Arfima),
            "ARMA" | "ARIMA" => Ok(ModelClass::Arma),
            other => Err(ArtfimaError::InvalidModelSpec(format!(
                "unknown model class '{}'. Use 'ARTFIMA', 'ARFIMA' or 'ARMA'",
                other
            ))),
        }
    }
}

/// Objective used during the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikelihoodMethod {
    Exact,   // Durbin-Levinson
    Whittle, // periodogram / spectral density
}

impl LikelihoodMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikelihoodMethod::Exact => "exact",
            LikelihoodMethod::Whittle => "whittle",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(LikelihoodMethod::Exact),
            "whittle" => Ok(LikelihoodMethod::Whittle),
            other => Err(ArtfimaError::InvalidModelSpec(format!(
                "unknown likelihood '{}'. Use 'exact' or 'whittle'",
                other
            ))),
        }
    }
}

/// Gap kept between the ARFIMA search box and the open |d| < arfima_d_max
/// region, so box endpoints stay feasible.
pub const ARFIMA_EDGE: f64 = 1e-4;

/// Box constraints of the search space.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    /// ARTFIMA: d ∈ [-d_max, d_max].
    pub d_max: f64,
    /// ARFIMA: |d| < arfima_d_max.
    pub arfima_d_max: f64,
    pub lambda_min: f64,
    pub lambda_max: f64,
    /// Every AR/MA PACF coordinate lies in [-pacf_max, pacf_max].
    pub pacf_max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            d_max: 10.0,
            arfima_d_max: 0.49,
            lambda_min: 1e-6,
            lambda_max: 3.0,
            pacf_max: 0.99,
        }
    }
}

impl Bounds {
    /// (lower, upper) search limits on d for a model class. The ARFIMA
    /// interval is open, so its box sits `ARFIMA_EDGE` inside.
    pub fn d_range(&self, class: ModelClass) -> (f64, f64) {
        match class {
            ModelClass::Arfima => {
                let hi = self.arfima_d_max - ARFIMA_EDGE;
                (-hi, hi)
            }
            _ => (-self.d_max, self.d_max),
        }
    }

    fn validate(&self) -> Result<()> {
        let all_finite = [
            self.d_max,
            self.arfima_d_max,
            self.lambda_min,
            self.lambda_max,
            self.pacf_max,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !all_finite {
            return Err(ArtfimaError::InvalidModelSpec(
                "bounds must be finite".to_string(),
            ));
        }
        if self.d_max <= 0.0 {
            return Err(ArtfimaError::InvalidModelSpec(format!(
                "d_max must be positive, got {}",
                self.d_max
            )));
        }
        if !(self.arfima_d_max > 0.0 && self.arfima_d_max < 0.5) {
            return Err(ArtfimaError::InvalidModelSpec(format!(
                "arfima_d_max must be in (0, 0.5), got {}",
                self.arfima_d_max
            )));
        }
        if !(self.lambda_min > 0.0 && self.lambda_min < self.lambda_max) {
            return Err(ArtfimaError::InvalidModelSpec(format!(
                "lambda bounds must satisfy 0 < min < max, got [{}, {}]",
                self.lambda_min, self.lambda_max
            )));
        }
        if !(self.pacf_max > 0.0 && self.pacf_max < 1.0) {
            return Err(ArtfimaError::InvalidModelSpec(format!(
                "pacf_max must be in (0, 1), got {}",
                self.pacf_max
            )));
        }
        Ok(())
    }
}

/// Model specification. Immutable once handed to the estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub class: ModelClass,
    pub p: usize,          // AR order
    pub d0: usize,         // integer differencing applied before fitting
    pub q: usize,          // MA order
    pub fixed_d: Option<f64>,
    pub bounds: Bounds,
    pub likelihood: LikelihoodMethod,
}

impl ModelSpec {
    pub fn new(class: ModelClass, p: usize, q: usize) -> Self {
        Self {
            class,
            p,
            d0: 0,
            q,
            fixed_d: None,
            bounds: Bounds::default(),
            likelihood: LikelihoodMethod::Exact,
        }
    }

    pub fn with_differencing(mut self, d0: usize) -> Self {
        self.d0 = d0;
        self
    }

    pub fn with_fixed_d(mut self, d: f64) -> Self {
        self.fixed_d = Some(d);
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_likelihood(mut self, likelihood: LikelihoodMethod) -> Self {
        self.likelihood = likelihood;
        self
    }

    /// Number of estimated long-memory parameters (a fixed d is not counted).
    pub fn glp_add(&self) -> usize {
        let fixed = if self.fixed_d.is_some() { 1 } else { 0 };
        self.class.glp_order().saturating_sub(fixed)
    }

    /// Parameter count used by AIC/BIC.
    pub fn n_estimated_params(&self) -> usize {
        self.p + self.q + self.glp_add()
    }

    /// Shortest series (after differencing) the estimator accepts.
    pub fn min_obs(&self) -> usize {
        self.p.max(self.q).max(1) + 20
    }

    pub fn validate(&self) -> Result<()> {
        self.bounds.validate()?;
        if let Some(d) = self.fixed_d {
            if self.class != ModelClass::Artfima {
                return Err(ArtfimaError::InvalidModelSpec(format!(
                    "a fixed d is only supported for ARTFIMA, got {}",
                    self.class.as_str()
                )));
            }
            if !d.is_finite() || !(-0.5..=2.0).contains(&d) {
                return Err(ArtfimaError::InvalidModelSpec(format!(
                    "fixed d must be in [-0.5, 2], got {}",
                    d
                )));
            }
        }
        Ok(())
    }
}

/// Estimator configuration.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Caller start in coefficient form; replaces the default starts.
    pub start: Option<ParameterVector>,
    /// Start generators tried in order when no caller start is given.
    pub starts: Vec<StartGenerator>,
    /// Objective-call cap per optimizer run.
    pub maxiter: u64,
    /// Run the starts on the rayon pool.
    pub parallel_starts: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            start: None,
            starts: StartGenerator::defaults(),
            maxiter: 500,
            parallel_starts: false,
        }
    }
}

impl FitOptions {
    pub fn with_start(mut self, start: ParameterVector) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_maxiter(mut self, maxiter: u64) -> Self {
        self.maxiter = maxiter;
        self
    }

    pub fn with_parallel_starts(mut self, parallel: bool) -> Self {
        self.parallel_starts = parallel;
        self
    }
}

/// Fit result returned by the estimator.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub spec: ModelSpec,
    /// Estimate in coefficient form.
    pub estimate: ParameterVector,
    /// Estimate in the packed search coordinates (PACF for AR/MA).
    pub packed: Vec<f64>,
    pub sigma2: f64,
    pub loglike: f64,
    pub aic: f64,
    pub bic: f64,
    pub n_obs: usize,
    pub n_params: usize,
    pub converged: bool,
    pub on_boundary: bool,
    /// Standard errors in packed coordinates, with 0 for a fixed d.
    pub std_errors: Option<Vec<f64>>,
    pub covariance: Option<DMatrix<f64>>,
    pub hessian: Option<DMatrix<f64>>,
    pub residuals: Vec<f64>,
    /// False when the residuals came from the LU fallback.
    pub residuals_positive_definite: bool,
    /// Fitted autocovariance at unit innovation scale, lags 0..n-1.
    pub tacvf: Vec<f64>,
    pub mean: f64,
    pub se_mean: f64,
    pub snr: f64,
    pub null_loglike: f64,
    pub n_evals: u64,
    pub method: String,
    /// The modelled series (after differencing, before centering).
    pub series: Vec<f64>,
    /// Last level of each differencing stage, outermost first.
    pub anchors: Vec<f64>,
}

impl FitResult {
    pub fn with_information_criteria(mut self) -> Self {
        let k = self.n_params as f64;
        let n = self.n_obs as f64;
        self.aic = -2.0 * self.loglike + 2.0 * k;
        self.bic = -2.0 * self.loglike + k * n.ln();
        self
    }
}
