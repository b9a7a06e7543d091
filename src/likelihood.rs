//! Exact Gaussian likelihood of a stationary series given its autocovariance.
//!
//! All log-likelihoods here are profile likelihoods: the innovation scale
//! is concentrated out, so an autocovariance `r` only matters up to a
//! positive factor, and the `2π` constant is dropped:
//!
//! ```text
//! ll = -½ Σ log v_i - (n/2) log(S / n),    S = Σ e_i² / v_i
//! ```
//!
//! where `e_i` are one-step prediction errors and `v_i` their variances
//! (relative to `r`). `S / n` is the innovation variance at the scale of `r`.

use nalgebra::{DMatrix, DVector};

use crate::error::{Infeasible, NumResult};

/// Log-likelihood and implied innovation variance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodOutput {
    pub loglike: f64,
    pub sigma2: f64,
}

/// Standardized residuals `L⁻¹ z` from the Cholesky factor of Toeplitz(r).
#[derive(Debug, Clone)]
pub struct ResidualOutput {
    pub residuals: Vec<f64>,
    /// False when Cholesky failed and the residuals came from `R⁻¹ z`.
    pub positive_definite: bool,
}

fn check_inputs(r: &[f64], z: &[f64]) -> NumResult<()> {
    let n = z.len();
    if n == 0 {
        return Err(Infeasible::LengthMismatch { needed: 1, got: 0 });
    }
    if r.len() < n {
        return Err(Infeasible::LengthMismatch {
            needed: n,
            got: r.len(),
        });
    }
    if r[..n].iter().any(|v| !v.is_finite()) {
        return Err(Infeasible::NonFiniteCovariance);
    }
    if r[0] <= 0.0 {
        return Err(Infeasible::NotPositiveDefinite);
    }
    Ok(())
}

fn profile(sum_log_v: f64, sum_sq: f64, n: usize) -> NumResult<LikelihoodOutput> {
    let nf = n as f64;
    let sigma2 = sum_sq / nf;
    let loglike = -0.5 * sum_log_v - 0.5 * nf * sigma2.ln();
    if !loglike.is_finite() || !(sigma2 > 0.0) {
        return Err(Infeasible::NonFiniteLikelihood);
    }
    Ok(LikelihoodOutput { loglike, sigma2 })
}

/// Profile log-likelihood and innovation variance by Durbin-Levinson.
///
/// O(n²) time and O(n) memory; never forms the covariance matrix.
pub fn dl_likelihood(r: &[f64], z: &[f64]) -> NumResult<LikelihoodOutput> {
    check_inputs(r, z)?;
    let n = z.len();

    let mut v = r[0];
    let mut sum_log_v = v.ln();
    let mut sum_sq = z[0] * z[0] / v;

    // prediction coefficients of the current order, phi[j] multiplies z[i-1-j]
    let mut phi: Vec<f64> = Vec::with_capacity(n);
    let mut prev: Vec<f64> = Vec::with_capacity(n);

    for i in 1..n {
        let mut k = r[i];
        for (j, &c) in phi.iter().enumerate() {
            k -= c * r[i - 1 - j];
        }
        k /= v;

        prev.clear();
        prev.extend_from_slice(&phi);
        let m = prev.len();
        for j in 0..m {
            phi[j] = prev[j] - k * prev[m - 1 - j];
        }
        phi.push(k);

        v *= 1.0 - k * k;
        if !(v > 0.0) || !v.is_finite() {
            return Err(Infeasible::NotPositiveDefinite);
        }

        let pred: f64 = phi
            .iter()
            .enumerate()
            .map(|(j, &c)| c * z[i - 1 - j])
            .sum();
        let err = z[i] - pred;
        sum_log_v += v.ln();
        sum_sq += err * err / v;
    }

    profile(sum_log_v, sum_sq, n)
}

/// Profile log-likelihood by Durbin-Levinson.
pub fn dl_loglikelihood(r: &[f64], z: &[f64]) -> NumResult<f64> {
    dl_likelihood(r, z).map(|out| out.loglike)
}

fn toeplitz(r: &[f64], n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| r[i.abs_diff(j)])
}

/// Standardized residuals via Cholesky of Toeplitz(r), falling back to an
/// LU solve of `R⁻¹ z` when the matrix is not positive definite.
pub fn dl_residuals(r: &[f64], z: &[f64]) -> NumResult<ResidualOutput> {
    check_inputs(r, z)?;
    let n = z.len();
    let mat = toeplitz(r, n);
    let zv = DVector::from_column_slice(z);

    if let Some(chol) = mat.clone().cholesky() {
        let y = chol
            .l()
            .solve_lower_triangular(&zv)
            .ok_or(Infeasible::SingularSystem("dl_residuals"))?;
        return Ok(ResidualOutput {
            residuals: y.iter().copied().collect(),
            positive_definite: true,
        });
    }

    let y = mat
        .lu()
        .solve(&zv)
        .ok_or(Infeasible::SingularSystem("dl_residuals"))?;
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Infeasible::SingularSystem("dl_residuals"));
    }
    Ok(ResidualOutput {
        residuals: y.iter().copied().collect(),
        positive_definite: false,
    })
}

/// Profile log-likelihood and innovation variance through the Cholesky
/// factor of Toeplitz(r). Same value as [`dl_likelihood`] at O(n³) cost.
pub fn exact_loglikelihood(r: &[f64], z: &[f64]) -> NumResult<LikelihoodOutput> {
    check_inputs(r, z)?;
    let n = z.len();
    let chol = toeplitz(r, n)
        .cholesky()
        .ok_or(Infeasible::NotPositiveDefinite)?;
    let l = chol.l();
    let log_det: f64 = 2.0 * l.diagonal().iter().map(|d| d.ln()).sum::<f64>();
    let y = l
        .solve_lower_triangular(&DVector::from_column_slice(z))
        .ok_or(Infeasible::SingularSystem("exact_loglikelihood"))?;
    let quad = y.dot(&y);
    profile(log_det, quad, n)
}

/// Profile log-likelihood of white noise: `-n/2 · log(Σw² / n)`.
pub fn null_loglikelihood(w: &[f64]) -> f64 {
    let n = w.len() as f64;
    let ss: f64 = w.iter().map(|v| v * v).sum();
    -0.5 * n * (ss / n).ln()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
