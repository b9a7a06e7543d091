//! Observed information at the optimum.
//!
//! Central-difference Hessian of the objective in packed coordinates and
//! the covariance / standard errors derived from its inverse. Anything that
//! goes wrong (a probe outside the feasible region, a singular or
//! indefinite Hessian) makes the result unavailable instead of failing.

use nalgebra::DMatrix;

use crate::error::NumResult;

/// Relative step of the central differences.
pub const HESSIAN_STEP: f64 = 1e-4;

/// Covariance of the estimates and its diagonal square roots.
#[derive(Debug, Clone)]
pub struct Information {
    pub hessian: DMatrix<f64>,
    pub covariance: DMatrix<f64>,
    pub std_errors: Vec<f64>,
}

/// Central-difference Hessian of `f` at `x`, step `1e-4·max(1, |x_i|)`.
///
/// Returns `None` as soon as any probe fails or is non-finite.
pub fn numerical_hessian<F>(f: F, x: &[f64]) -> Option<DMatrix<f64>>
where
    F: Fn(&[f64]) -> NumResult<f64>,
{
    let k = x.len();
    let h: Vec<f64> = x.iter().map(|v| HESSIAN_STEP * v.abs().max(1.0)).collect();
    let eval = |p: &[f64]| -> Option<f64> { f(p).ok().filter(|v| v.is_finite()) };

    let f0 = eval(x)?;
    let mut hess = DMatrix::zeros(k, k);
    let mut p = x.to_vec();

    for i in 0..k {
        p[i] = x[i] + h[i];
        let fp = eval(&p)?;
        p[i] = x[i] - h[i];
        let fm = eval(&p)?;
        p[i] = x[i];
        hess[(i, i)] = (fp - 2.0 * f0 + fm) / (h[i] * h[i]);

        for j in 0..i {
            p[i] = x[i] + h[i];
            p[j] = x[j] + h[j];
            let fpp = eval(&p)?;
            p[j] = x[j] - h[j];
            let fpm = eval(&p)?;
            p[i] = x[i] - h[i];
            let fmm = eval(&p)?;
            p[j] = x[j] + h[j];
            let fmp = eval(&p)?;
            p[i] = x[i];
            p[j] = x[j];

            let v = (fpp - fpm - fmp + fmm) / (4.0 * h[i] * h[j]);
            hess[(i, j)] = v;
            hess[(j, i)] = v;
        }
    }
    Some(hess)
}

/// Invert the Hessian and scale it into a covariance.
///
/// `scale` multiplies the inverse (1 for the exact likelihood, σ² for
/// Whittle); `se_scale` multiplies the standard errors. Standard errors
/// exist only when every variance is positive.
pub fn information_from_hessian(hessian: DMatrix<f64>, scale: f64, se_scale: f64) -> Option<Information> {
    let inv = hessian.clone().try_inverse()?;
    if inv.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let diag: Vec<f64> = inv.diagonal().iter().copied().collect();
    if diag.iter().any(|&v| !(v > 0.0)) {
        return None;
    }
    let std_errors = diag.iter().map(|v| v.sqrt() * se_scale).collect();
    Some(Information {
        hessian,
        covariance: inv * scale,
        std_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Infeasible;

    #[test]
    fn test_hessian_of_quadratic() {
        // f = 2x² + 3xy + 5y², H = [[4, 3], [3, 10]]
        let f = |p: &[f64]| -> NumResult<f64> {
            Ok(2.0 * p[0] * p[0] + 3.0 * p[0] * p[1] + 5.0 * p[1] * p[1])
        };
        let h = numerical_hessian(f, &[0.4, -1.3]).unwrap();
        assert!((h[(0, 0)] - 4.0).abs() < 1e-5);
        assert!((h[(0, 1)] - 3.0).abs() < 1e-5);
        assert!((h[(1, 0)] - 3.0).abs() < 1e-5);
        assert!((h[(1, 1)] - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_failed_probe_gives_none() {
        // feasible only for x ≥ 0: probing at the edge steps outside
        let f = |p: &[f64]| -> NumResult<f64> {
            if p[0] < 0.0 {
                Err(Infeasible::OutOfBounds { name: "x", value: p[0] })
            } else {
                Ok(p[0] * p[0])
            }
        };
        assert!(numerical_hessian(f, &[0.0]).is_none());
        assert!(numerical_hessian(f, &[1.0]).is_some());
    }

    #[test]
    fn test_information_scaling() {
        let h = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 16.0]);
        let info = information_from_hessian(h, 2.0, 0.5).unwrap();
        assert!((info.covariance[(0, 0)] - 0.5).abs() < 1e-14);
        assert!((info.covariance[(1, 1)] - 0.125).abs() < 1e-14);
        assert!((info.std_errors[0] - 0.25).abs() < 1e-14);
        assert!((info.std_errors[1] - 0.125).abs() < 1e-14);
    }

    #[test]
    fn test_singular_or_indefinite_is_unavailable() {
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(information_from_hessian(singular, 1.0, 1.0).is_none());
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert!(information_from_hessian(indefinite, 1.0, 1.0).is_none());
    }
}
