//! Spectral utilities for the Whittle objective.
//!
//! Periodogram of the centered series and the closed-form spectral density
//! of the model, both at the positive Fourier frequencies
//! `ω_j = 2πj/n, j = 1..=⌊(n-1)/2⌋`. The density is at unit innovation
//! variance without the `1/2π` factor, so `mean(I/f)` estimates σ².

use std::f64::consts::PI;

use rustfft::{num_complex::Complex64, FftPlanner};

use crate::error::{Infeasible, NumResult};
use crate::params::ParameterVector;

/// Positive Fourier frequencies of a length-n series, excluding 0 and π.
pub fn fourier_frequencies(n: usize) -> Vec<f64> {
    let m = n.saturating_sub(1) / 2;
    (1..=m).map(|j| 2.0 * PI * j as f64 / n as f64).collect()
}

/// `|X_j|² / n` at the positive Fourier frequencies.
pub fn periodogram(z: &[f64]) -> Vec<f64> {
    let n = z.len();
    let m = n.saturating_sub(1) / 2;
    if m == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = z.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    buffer[1..=m]
        .iter()
        .map(|c| c.norm_sqr() / n as f64)
        .collect()
}

/// `|1 - Σ c_j e^{-ijω}|²`
fn poly_gain(coef: &[f64], w: f64) -> f64 {
    let (mut re, mut im) = (1.0, 0.0);
    for (j, &c) in coef.iter().enumerate() {
        let a = (j + 1) as f64 * w;
        re -= c * a.cos();
        im += c * a.sin();
    }
    re * re + im * im
}

/// Spectral density of the model at `frequencies`.
pub fn artfima_sdf(params: &ParameterVector, frequencies: &[f64]) -> Vec<f64> {
    let lambda = params.lambda.unwrap_or(0.0);
    frequencies
        .iter()
        .map(|&w| {
            let memory = match params.d {
                Some(d) if d != 0.0 && lambda > 0.0 => {
                    let el = (-lambda).exp();
                    (1.0 + el * el - 2.0 * w.cos() * el).powf(-d)
                }
                Some(d) if d != 0.0 => (2.0 * (w / 2.0).sin()).powf(-2.0 * d),
                _ => 1.0,
            };
            memory * poly_gain(&params.theta, w) / poly_gain(&params.phi, w)
        })
        .collect()
}

/// Whittle objective `mean(I_j / f_j)`.
pub fn whittle_objective(periodogram: &[f64], sdf: &[f64]) -> NumResult<f64> {
    if periodogram.is_empty() || periodogram.len() != sdf.len() {
        return Err(Infeasible::LengthMismatch {
            needed: periodogram.len(),
            got: sdf.len(),
        });
    }
    let mut total = 0.0;
    for (&ip, &fp) in periodogram.iter().zip(sdf.iter()) {
        if !(fp > 0.0) || !fp.is_finite() {
            return Err(Infeasible::NonFiniteLikelihood);
        }
        total += ip / fp;
    }
    let value = total / periodogram.len() as f64;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Infeasible::NonFiniteLikelihood)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_count() {
        assert_eq!(fourier_frequencies(10).len(), 4);
        assert_eq!(fourier_frequencies(11).len(), 5);
        assert!(fourier_frequencies(2).is_empty());
        let w = fourier_frequencies(8);
        assert!((w[0] - PI / 4.0).abs() < 1e-15);
        assert!(w.iter().all(|&x| x > 0.0 && x < PI));
    }

    #[test]
    fn test_periodogram_parseval() {
        // odd n, centered: 2 Σ I_j = Σ z²
        let raw = [0.3, -1.1, 2.0, 0.7, -0.4, 1.3, -2.2, 0.9, 0.1];
        let mean = raw.iter().sum::<f64>() / raw.len() as f64;
        let z: Vec<f64> = raw.iter().map(|v| v - mean).collect();
        let ip = periodogram(&z);
        assert_eq!(ip.len(), 4);
        let ss: f64 = z.iter().map(|v| v * v).sum();
        assert!((2.0 * ip.iter().sum::<f64>() - ss).abs() < 1e-12);
    }

    #[test]
    fn test_periodogram_single_harmonic() {
        let n = 16;
        let z: Vec<f64> = (0..n)
            .map(|t| (2.0 * PI * 3.0 * t as f64 / n as f64).cos())
            .collect();
        let ip = periodogram(&z);
        // all power at j = 3: |n/2|² / n
        assert!((ip[2] - n as f64 / 4.0).abs() < 1e-10);
        assert!(ip[0].abs() < 1e-10);
    }

    #[test]
    fn test_white_noise_sdf() {
        let w = fourier_frequencies(50);
        let s = artfima_sdf(&ParameterVector::white_noise(), &w);
        assert!(s.iter().all(|&v| (v - 1.0).abs() < 1e-15));
    }

    #[test]
    fn test_ar1_sdf() {
        let phi = 0.6;
        let w = fourier_frequencies(30);
        let s = artfima_sdf(&ParameterVector::arma(vec![phi], vec![]), &w);
        for (x, &wj) in s.iter().zip(w.iter()) {
            let expected = 1.0 / (1.0 - 2.0 * phi * wj.cos() + phi * phi);
            assert!((x - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tempered_sdf_approaches_fractional() {
        let w = fourier_frequencies(64);
        let fd = artfima_sdf(&ParameterVector::new(Some(0.3), None, vec![], vec![]), &w);
        let tfd = artfima_sdf(&ParameterVector::new(Some(0.3), Some(1e-9), vec![], vec![]), &w);
        for (a, b) in fd.iter().zip(tfd.iter()) {
            assert!((a - b).abs() / a < 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_whittle_objective() {
        let ip = vec![1.0, 2.0, 3.0];
        let sdf = vec![1.0, 2.0, 1.0];
        assert!((whittle_objective(&ip, &sdf).unwrap() - 5.0 / 3.0).abs() < 1e-15);
        assert!(whittle_objective(&ip, &[1.0, 0.0, 1.0]).is_err());
        assert!(whittle_objective(&ip, &[1.0]).is_err());
    }
}
