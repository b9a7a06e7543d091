//! Special functions used by the autocovariance engine.
//!
//! Gamma and log-Gamma come from `statrs`; the Gauss hypergeometric
//! function is summed here since no crate in the stack provides it.

use statrs::function::gamma::ln_gamma;

use crate::error::{Infeasible, NumResult};

/// Hard cap on hypergeometric series terms.
pub const HYP2F1_MAX_TERMS: usize = 200_000;

const HYP2F1_RTOL: f64 = 1e-16;

/// Gauss hypergeometric function ₂F₁(a, b; c; z) for 0 ≤ z < 1.
///
/// Summed as a power series. When `a + b - c > 0` the terms grow like
/// `k^{a+b-c-1}` before the geometric factor wins, so Euler's
/// transformation `(1-z)^{c-a-b} ₂F₁(c-a, c-b; c; z)` is used instead.
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> NumResult<f64> {
    if !(a.is_finite() && b.is_finite() && c.is_finite() && z.is_finite()) {
        return Err(Infeasible::NonFiniteSpecialFunction("hyp2f1"));
    }
    if !(0.0..1.0).contains(&z) {
        return Err(Infeasible::OutOfBounds { name: "z", value: z });
    }
    if a + b - c > 0.0 {
        let prefactor = (1.0 - z).powf(c - a - b);
        let value = prefactor * hyp2f1_series(c - a, c - b, c, z)?;
        return finite(value);
    }
    hyp2f1_series(a, b, c, z)
}

fn hyp2f1_series(a: f64, b: f64, c: f64, z: f64) -> NumResult<f64> {
    if z == 0.0 {
        return Ok(1.0);
    }
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 0..HYP2F1_MAX_TERMS {
        let kf = k as f64;
        term *= (a + kf) * (b + kf) / ((c + kf) * (kf + 1.0)) * z;
        sum += term;
        if !sum.is_finite() {
            return Err(Infeasible::NonFiniteSpecialFunction("hyp2f1"));
        }
        // terminating series (a or b a non-positive integer)
        if term == 0.0 {
            return Ok(sum);
        }
        // stop only once the ratio has turned into decay
        let ratio = ((a + kf + 1.0) * (b + kf + 1.0) / ((c + kf + 1.0) * (kf + 2.0)) * z).abs();
        if ratio < 1.0 && term.abs() <= HYP2F1_RTOL * sum.abs() {
            return Ok(sum);
        }
    }
    Err(Infeasible::SeriesNotConverged(HYP2F1_MAX_TERMS))
}

/// Γ(1 - 2d) / Γ(1 - d)², the variance of fractional white noise, d < 0.5.
pub fn fdwn_variance(d: f64) -> NumResult<f64> {
    if !(d < 0.5) || !d.is_finite() {
        return Err(Infeasible::OutOfBounds { name: "d", value: d });
    }
    finite((ln_gamma(1.0 - 2.0 * d) - 2.0 * ln_gamma(1.0 - d)).exp())
}

/// Γ(k + d) / (Γ(d) Γ(k + 1)) for d > 0, through log-Gamma.
pub fn fractional_weight(d: f64, k: usize) -> NumResult<f64> {
    if !(d > 0.0) {
        return Err(Infeasible::OutOfBounds { name: "d", value: d });
    }
    let kf = k as f64;
    finite((ln_gamma(kf + d) - ln_gamma(d) - ln_gamma(kf + 1.0)).exp())
}

fn finite(v: f64) -> NumResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(Infeasible::NonFiniteSpecialFunction("gamma"))
    }
}
