//! Objective over the packed search vector.
//!
//! The estimator minimizes either the negative profile log-likelihood
//! (Durbin-Levinson) or the Whittle objective. Every numerical failure is
//! mapped to a fixed penalty so the bounded optimizer sees a finite value
//! everywhere in its box.

use crate::error::{Infeasible, NumResult};
use crate::likelihood::{dl_loglikelihood, null_loglikelihood};
use crate::params::{is_invertible, PackedLayout, ParameterVector};
use crate::sdf::{artfima_sdf, fourier_frequencies, periodogram, whittle_objective};
use crate::tacvf::artfima_tacvf;
use crate::types::{Bounds, LikelihoodMethod, ModelClass, ModelSpec};

/// Evaluation bookkeeping for one search, passed explicitly to every call.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    pub evaluations: u64,
    /// Best feasible point seen so far and its objective value.
    pub best: Option<(Vec<f64>, f64)>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, beta: &[f64], value: f64) {
        let better = match &self.best {
            Some((_, best)) => value < *best,
            None => true,
        };
        if better {
            self.best = Some((beta.to_vec(), value));
        }
    }

    /// Fold another context's counts and best point into this one.
    pub fn merge(&mut self, other: &SearchContext) {
        self.evaluations += other.evaluations;
        if let Some((beta, value)) = &other.best {
            self.record(beta, *value);
        }
    }
}

/// Objective for one centered series under one specification.
#[derive(Debug, Clone)]
pub struct ArtfimaObjective {
    pub layout: PackedLayout,
    pub bounds: Bounds,
    pub method: LikelihoodMethod,
    /// Centered series.
    pub w: Vec<f64>,
    periodogram: Vec<f64>,
    frequencies: Vec<f64>,
    null_loglike: f64,
    penalty: f64,
}

impl ArtfimaObjective {
    pub fn new(spec: &ModelSpec, w: Vec<f64>) -> Self {
        let null_loglike = null_loglikelihood(&w);
        let (periodogram, frequencies, penalty) = match spec.likelihood {
            LikelihoodMethod::Exact => (Vec::new(), Vec::new(), -null_loglike + 2.0 * null_loglike.abs()),
            LikelihoodMethod::Whittle => {
                let ss: f64 = w.iter().map(|v| v * v).sum();
                (periodogram(&w), fourier_frequencies(w.len()), ss + 2.0 * ss.abs())
            }
        };
        Self {
            layout: PackedLayout::from_spec(spec),
            bounds: spec.bounds.clone(),
            method: spec.likelihood,
            w,
            periodogram,
            frequencies,
            null_loglike,
            penalty,
        }
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn null_loglike(&self) -> f64 {
        self.null_loglike
    }

    pub fn n_obs(&self) -> usize {
        self.w.len()
    }

    /// Decode `beta` and check it against the box and invertibility.
    pub fn feasible_params(&self, beta: &[f64]) -> NumResult<ParameterVector> {
        if beta.len() != self.layout.len() {
            return Err(Infeasible::LengthMismatch {
                needed: self.layout.len(),
                got: beta.len(),
            });
        }
        if let Some(i) = self.layout.d_index() {
            let d = beta[i];
            let outside = match self.layout.class {
                ModelClass::Arfima => d.abs() >= self.bounds.arfima_d_max,
                _ => d.abs() > self.bounds.d_max,
            };
            if !d.is_finite() || outside {
                return Err(Infeasible::OutOfBounds { name: "d", value: d });
            }
        }
        if let Some(i) = self.layout.lambda_index() {
            let lambda = beta[i];
            if !lambda.is_finite() || lambda < self.bounds.lambda_min || lambda > self.bounds.lambda_max {
                return Err(Infeasible::OutOfBounds { name: "lambda", value: lambda });
            }
        }
        let g = self.layout.n_glp();
        for &pi in &beta[g..] {
            if !pi.is_finite() || pi.abs() > self.bounds.pacf_max {
                return Err(Infeasible::OutOfBounds { name: "pacf", value: pi });
            }
        }

        let params = self
            .layout
            .unpack(beta)
            .map_err(|_| Infeasible::LengthMismatch {
                needed: self.layout.len(),
                got: beta.len(),
            })?;
        if !is_invertible(&params.phi) {
            return Err(Infeasible::NonInvertible("AR"));
        }
        if !is_invertible(&params.theta) {
            return Err(Infeasible::NonInvertible("MA"));
        }
        Ok(params)
    }

    /// Raw objective value, surfacing the reason when `beta` is infeasible.
    pub fn value(&self, beta: &[f64]) -> NumResult<f64> {
        let params = self.feasible_params(beta)?;
        match self.method {
            LikelihoodMethod::Exact => {
                let n = self.w.len();
                let r = artfima_tacvf(&params, n - 1, 1.0)?;
                if !(r[0] > 0.0) || !r[0].is_finite() {
                    return Err(Infeasible::NotPositiveDefinite);
                }
                let ll = dl_loglikelihood(&r, &self.w)?;
                Ok(-ll)
            }
            LikelihoodMethod::Whittle => {
                let sdf = artfima_sdf(&params, &self.frequencies);
                whittle_objective(&self.periodogram, &sdf)
            }
        }
    }

    /// Objective value with every infeasibility mapped to the penalty.
    pub fn evaluate(&self, beta: &[f64], ctx: &mut SearchContext) -> f64 {
        ctx.evaluations += 1;
        match self.value(beta) {
            Ok(v) if v.is_finite() => {
                ctx.record(beta, v);
                v
            }
            _ => self.penalty,
        }
    }
}
