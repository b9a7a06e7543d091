//! Theoretical autocovariance functions (TACVF).
//!
//! Provides the fractional white noise, tempered fractional and ARMA
//! kernels, the FFT-based combination of a long-memory kernel with an
//! ARMA kernel, and the `artfima_tacvf` dispatcher that picks between them.
//! Every sequence covers lags `0..=maxlag`.

use nalgebra::{DMatrix, DVector};
use rustfft::{num_complex::Complex64, FftPlanner};

use crate::error::{Infeasible, NumResult};
use crate::params::ParameterVector;
use crate::special::{fdwn_variance, fractional_weight, hyp2f1};

/// Largest d used by the fractional white noise kernel.
pub const FDWN_D_MAX: f64 = 0.499;

/// Cap on the hypergeometric argument e^{-2λ}.
pub const FI_Z_MAX: f64 = 0.99;

/// |d| below this is treated as zero by the tempered kernel.
const FI_D_EPS: f64 = 1e-8;

/// |d| below this makes the dispatcher fall through to pure ARMA.
const ARMA_D_EPS: f64 = 1e-10;

/// λ above this selects the tempered kernel over fractional white noise.
const TEMPERED_LAMBDA_EPS: f64 = 1e-7;

fn delta(maxlag: usize, sigma2: f64) -> Vec<f64> {
    let mut x = vec![0.0; maxlag + 1];
    x[0] = sigma2;
    x
}

/// Fractionally differenced white noise, unit innovation variance.
///
/// `x[0] = Γ(1-2d)/Γ(1-d)²`, `x[i] = (i-1+d)/(i-d) · x[i-1]`, with d
/// clamped to at most 0.499.
pub fn tacvf_fdwn(d: f64, maxlag: usize) -> NumResult<Vec<f64>> {
    let d = d.min(FDWN_D_MAX);
    let mut x = Vec::with_capacity(maxlag + 1);
    x.push(fdwn_variance(d)?);
    for i in 1..=maxlag {
        let fi = i as f64;
        let prev = x[i - 1];
        x.push((fi - 1.0 + d) / (fi - d) * prev);
    }
    Ok(x)
}

/// Tempered fractional integration, unit innovation variance.
///
/// For d > 0, `x[k] = e^{-λk} Γ(k+d)/(Γ(d)Γ(k+1)) ₂F₁(d, d+k; 1+k; z)` with
/// `z = min(e^{-2λ}, 0.99)`. For d ≤ 0 the kernel is approximated by
/// `e^{-λk}` times fractional white noise at `max(d, -0.499)`. λ = 0 is the
/// untempered process and returns [`tacvf_fdwn`] exactly.
pub fn tacvf_fi(d: f64, lambda: f64, maxlag: usize) -> NumResult<Vec<f64>> {
    if !d.is_finite() || !lambda.is_finite() {
        return Err(Infeasible::NonFiniteCovariance);
    }
    if d.abs() < FI_D_EPS {
        return Ok(delta(maxlag, 1.0));
    }
    if lambda == 0.0 {
        return tacvf_fdwn(d, maxlag);
    }

    if d > 0.0 {
        let z = (-2.0 * lambda).exp().min(FI_Z_MAX);
        let mut x = Vec::with_capacity(maxlag + 1);
        for k in 0..=maxlag {
            let kf = k as f64;
            let a = hyp2f1(d, d + kf, 1.0 + kf, z)?;
            let w = fractional_weight(d, k)?;
            let v = a * w * (-lambda * kf).exp();
            if !v.is_finite() {
                return Err(Infeasible::NonFiniteSpecialFunction("tacvf_fi"));
            }
            x.push(v);
        }
        Ok(x)
    } else {
        let base = tacvf_fdwn(d.max(-FDWN_D_MAX), maxlag)?;
        Ok(base
            .into_iter()
            .enumerate()
            .map(|(k, v)| (-lambda * k as f64).exp() * v)
            .collect())
    }
}

/// ARMA autocovariance for `(1 - Σφ B) y = (1 - Σθ B) e`, `Var(e) = σ²`.
///
/// The first `r = max(p, q) + 1` lags solve an r×r linear system, the rest
/// follow the AR recursion. No parameters gives a scaled delta.
pub fn tacvf_arma(phi: &[f64], theta: &[f64], maxlag: usize, sigma2: f64) -> NumResult<Vec<f64>> {
    let p = phi.len();
    let q = theta.len();
    if p == 0 && q == 0 {
        return Ok(delta(maxlag, sigma2));
    }

    let r = p.max(q) + 1;

    // ψ-weights of the MA polynomial filtered through the AR recursion
    let mut psi = vec![0.0; q + 1];
    psi[0] = 1.0;
    for k in 1..=q {
        psi[k] = -theta[k - 1];
        for i in 1..=p.min(k) {
            psi[k] += phi[i - 1] * psi[k - i];
        }
    }

    // MA polynomial with leading -1: [-1, θ_1, .., θ_q]
    let ma = |i: usize| if i == 0 { -1.0 } else { theta[i - 1] };
    let mut b = vec![0.0; r];
    for k in 0..=q {
        for i in k..=q {
            b[k] -= ma(i) * psi[i - k];
        }
    }

    let mut g = if p == 0 {
        b
    } else {
        // AR polynomial padded on both sides: index r-1 holds -1, r.. holds φ
        let mut ar = vec![0.0; 3 * r];
        ar[r - 1] = -1.0;
        ar[r..r + p].copy_from_slice(phi);

        let a = DMatrix::from_fn(r, r, |i, j| {
            if j == 0 {
                ar[r + i - 1]
            } else {
                ar[r + i - j - 1] + ar[r + i + j - 1]
            }
        });
        let rhs = DVector::from_iterator(r, b.iter().map(|v| -v));
        let sol = a
            .lu()
            .solve(&rhs)
            .ok_or(Infeasible::SingularSystem("tacvf_arma"))?;
        sol.iter().copied().collect()
    };

    if g.len() < maxlag + 1 {
        let start = g.len();
        g.resize(maxlag + 1, 0.0);
        if p > 0 {
            for i in start..=maxlag {
                g[i] = (1..=p).map(|j| phi[j - 1] * g[i - j]).sum();
            }
        }
    }
    g.truncate(maxlag + 1);

    let out: Vec<f64> = g.into_iter().map(|v| v * sigma2).collect();
    if out.iter().any(|v| !v.is_finite()) {
        return Err(Infeasible::NonFiniteCovariance);
    }
    Ok(out)
}

/// Internal kernel length used before mixing: a power of two, at least
/// 256 and at least twice `maxlag`.
pub fn lag_truncation(maxlag: usize) -> usize {
    2 * maxlag.next_power_of_two().max(128)
}

/// Autocovariance of the sum filter of two independent kernels.
///
/// Both one-sided sequences (same length L) are extended evenly to length
/// `2L - 2`, circularly convolved through the FFT, and the causal half is
/// returned. `mix(x, δ) == x`.
pub fn mix(x: &[f64], y: &[f64]) -> NumResult<Vec<f64>> {
    let l = x.len();
    if y.len() != l {
        return Err(Infeasible::LengthMismatch {
            needed: l,
            got: y.len(),
        });
    }
    match l {
        0 => return Ok(vec![]),
        1 => return Ok(vec![x[0] * y[0]]),
        _ => {}
    }

    let n = 2 * l - 2;
    let even = |s: &[f64]| -> Vec<Complex64> {
        (0..n)
            .map(|k| {
                let lag = if k < l { k } else { n - k };
                Complex64::new(s[lag], 0.0)
            })
            .collect()
    };

    let mut ex = even(x);
    let mut ey = even(y);

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(n);
    forward.process(&mut ex);
    forward.process(&mut ey);

    let mut prod: Vec<Complex64> = ex.iter().zip(ey.iter()).map(|(a, b)| a * b).collect();
    let inverse = planner.plan_fft_inverse(n);
    inverse.process(&mut prod);

    let scale = 1.0 / n as f64;
    let out: Vec<f64> = prod.iter().take(l).map(|c| c.re * scale).collect();
    if out.iter().any(|v| !v.is_finite()) {
        return Err(Infeasible::NonFiniteCovariance);
    }
    Ok(out)
}

/// Model autocovariance at innovation variance `sigma2`, lags `0..=maxlag`.
///
/// No long memory (d absent or |d| ≈ 0) gives the ARMA kernel. Otherwise
/// the tempered kernel is used when λ is materially positive and fractional
/// white noise when not. With an ARMA part both kernels are computed at
/// [`lag_truncation`] lags, mixed, and truncated.
pub fn artfima_tacvf(params: &ParameterVector, maxlag: usize, sigma2: f64) -> NumResult<Vec<f64>> {
    let d = match params.d {
        Some(d) if d.abs() >= ARMA_D_EPS => d,
        _ => return tacvf_arma(&params.phi, &params.theta, maxlag, sigma2),
    };
    let lambda = params.lambda.unwrap_or(0.0);
    let has_arma = !params.phi.is_empty() || !params.theta.is_empty();

    let kernel_lag = if has_arma {
        lag_truncation(maxlag) - 1
    } else {
        maxlag
    };
    let kernel = if lambda > TEMPERED_LAMBDA_EPS {
        tacvf_fi(d, lambda, kernel_lag)?
    } else {
        tacvf_fdwn(d, kernel_lag)?
    };

    let mut r = if has_arma {
        let arma = tacvf_arma(&params.phi, &params.theta, kernel_lag, 1.0)?;
        mix(&kernel, &arma)?
    } else {
        kernel
    };
    r.truncate(maxlag + 1);
    for v in r.iter_mut() {
        *v *= sigma2;
    }

    if r.iter().any(|v| !v.is_finite()) {
        return Err(Infeasible::NonFiniteCovariance);
    }
    Ok(r)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
