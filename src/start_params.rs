//! Starting points for the multi-start search.
//!
//! The likelihood over (d, λ, ARMA) is multimodal: long memory trades off
//! against tempering and against short-memory structure. The defaults
//! cover a low, medium and high d regime plus a start near the upper d
//! bound. They are empirically tuned, so they are plain data that callers
//! can replace through [`FitOptions::starts`](crate::types::FitOptions).

use crate::error::{ArtfimaError, Result};
use crate::params::PackedLayout;
use crate::types::{FitOptions, ModelClass, ModelSpec};

/// One starting point, described independently of the model orders.
#[derive(Debug, Clone, PartialEq)]
pub struct StartGenerator {
    pub name: String,
    /// d for ARTFIMA.
    pub d: f64,
    /// d for ARFIMA.
    pub arfima_d: f64,
    pub lambda: f64,
    /// AR PACF pattern, tiled to length p.
    pub ar_pattern: Vec<f64>,
    /// MA PACF pattern, tiled to length q.
    pub ma_pattern: Vec<f64>,
}

impl StartGenerator {
    pub fn r_like() -> Self {
        Self {
            name: "r_like".to_string(),
            d: 8.0,
            arfima_d: 0.3,
            lambda: 1.5,
            ar_pattern: vec![-0.5, -0.3],
            ma_pattern: vec![0.3, 0.2, -0.2, -0.1],
        }
    }

    pub fn low_d() -> Self {
        Self {
            name: "low_d".to_string(),
            d: 0.3,
            arfima_d: 0.3,
            lambda: 0.025,
            ar_pattern: vec![0.1, -0.05],
            ma_pattern: vec![0.1, -0.1],
        }
    }

    pub fn med_d() -> Self {
        Self {
            name: "med_d".to_string(),
            d: 3.0,
            arfima_d: 3.0,
            lambda: 0.8,
            ar_pattern: vec![0.2, -0.1],
            ma_pattern: vec![0.2, -0.15],
        }
    }

    pub fn high_d() -> Self {
        Self {
            name: "high_d".to_string(),
            d: 9.5,
            arfima_d: 0.45,
            lambda: 2.0,
            ar_pattern: vec![0.3, -0.2],
            ma_pattern: vec![0.4, 0.3, -0.1, -0.2],
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::r_like(), Self::low_d(), Self::med_d(), Self::high_d()]
    }

    /// Packed start for `spec`, projected into the search box.
    pub fn generate(&self, spec: &ModelSpec) -> Vec<f64> {
        let layout = PackedLayout::from_spec(spec);
        let mut beta = Vec::with_capacity(layout.len());
        if layout.d_index().is_some() {
            beta.push(match spec.class {
                ModelClass::Arfima => self.arfima_d,
                _ => self.d,
            });
        }
        if layout.lambda_index().is_some() {
            beta.push(self.lambda);
        }
        beta.extend(tile(&self.ar_pattern, spec.p));
        beta.extend(tile(&self.ma_pattern, spec.q));
        layout.project(&beta, &spec.bounds)
    }
}

fn tile(pattern: &[f64], len: usize) -> Vec<f64> {
    if pattern.is_empty() {
        return vec![0.0; len];
    }
    pattern.iter().copied().cycle().take(len).collect()
}

/// Named packed starting points for a fit.
///
/// A caller start replaces the generators. It is given in coefficient form
/// and packed through the PACF transform, and cannot be combined with a
/// fixed d.
pub fn compute_start_params(spec: &ModelSpec, options: &FitOptions) -> Result<Vec<(String, Vec<f64>)>> {
    let layout = PackedLayout::from_spec(spec);
    if let Some(start) = &options.start {
        if spec.fixed_d.is_some() {
            return Err(ArtfimaError::InvalidModelSpec(
                "a caller start and a fixed d are mutually exclusive".to_string(),
            ));
        }
        let beta = layout.pack(start)?;
        return Ok(vec![("user".to_string(), layout.project(&beta, &spec.bounds))]);
    }
    if options.starts.is_empty() {
        return Err(ArtfimaError::InvalidModelSpec(
            "no start generators configured".to_string(),
        ));
    }
    Ok(options
        .starts
        .iter()
        .map(|g| (g.name.clone(), g.generate(spec)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterVector;

    #[test]
    fn test_tile() {
        assert_eq!(tile(&[0.1, -0.05], 3), vec![0.1, -0.05, 0.1]);
        assert_eq!(tile(&[0.3, 0.2, -0.2, -0.1], 2), vec![0.3, 0.2]);
        assert!(tile(&[0.5], 0).is_empty());
        assert_eq!(tile(&[], 2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_artfima_starts() {
        let spec = ModelSpec::new(ModelClass::Artfima, 1, 2);
        let starts = compute_start_params(&spec, &FitOptions::default()).unwrap();
        let names: Vec<&str> = starts.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["r_like", "low_d", "med_d", "high_d"]);
        assert_eq!(starts[0].1, vec![8.0, 1.5, -0.5, 0.3, 0.2]);
        assert_eq!(starts[1].1, vec![0.3, 0.025, 0.1, 0.1, -0.1]);
        assert_eq!(starts[3].1, vec![9.5, 2.0, 0.3, 0.4, 0.3]);
    }

    #[test]
    fn test_arfima_starts_are_projected() {
        let spec = ModelSpec::new(ModelClass::Arfima, 0, 0);
        let starts = compute_start_params(&spec, &FitOptions::default()).unwrap();
        assert_eq!(starts[0].1, vec![0.3]);
        // med_d's 3.0 lands just inside the open ARFIMA interval
        assert!((starts[2].1[0] - 0.4899).abs() < 1e-12);
        assert_eq!(starts[3].1, vec![0.45]);
    }

    #[test]
    fn test_fixed_d_puts_lambda_first() {
        let spec = ModelSpec::new(ModelClass::Artfima, 1, 0).with_fixed_d(0.4);
        let starts = compute_start_params(&spec, &FitOptions::default()).unwrap();
        assert_eq!(starts[0].1, vec![1.5, -0.5]);
        assert_eq!(starts[1].1, vec![0.025, 0.1]);
    }

    #[test]
    fn test_caller_start_replaces_defaults() {
        let spec = ModelSpec::new(ModelClass::Artfima, 1, 0);
        let opts = FitOptions::default()
            .with_start(ParameterVector::new(Some(0.4), Some(0.2), vec![0.5], vec![]));
        let starts = compute_start_params(&spec, &opts).unwrap();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].0, "user");
        assert_eq!(starts[0].1, vec![0.4, 0.2, 0.5]);
    }

    #[test]
    fn test_caller_start_errors() {
        let fixed = ModelSpec::new(ModelClass::Artfima, 0, 0).with_fixed_d(0.3);
        let opts = FitOptions::default()
            .with_start(ParameterVector::new(Some(0.4), Some(0.2), vec![], vec![]));
        assert!(compute_start_params(&fixed, &opts).is_err());

        let spec = ModelSpec::new(ModelClass::Artfima, 1, 0);
        let wrong = FitOptions::default()
            .with_start(ParameterVector::new(Some(0.4), Some(0.2), vec![], vec![]));
        assert!(matches!(
            compute_start_params(&spec, &wrong),
            Err(ArtfimaError::ParamLengthMismatch { .. })
        ));

        let mut none = FitOptions::default();
        none.starts.clear();
        assert!(compute_start_params(&spec, &none).is_err());
    }
}
