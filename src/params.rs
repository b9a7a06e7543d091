use crate::error::{ArtfimaError, Result};
use crate::types::{Bounds, ModelClass, ModelSpec};

/// Model parameters in coefficient form.
///
/// `d` and `lambda` are `None` when the model class does not carry them;
/// `phi` / `theta` are empty for zero AR / MA order. Polynomial convention:
/// AR `1 - Σ φ_j B^j`, MA `1 - Σ θ_j B^j`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterVector {
    pub d: Option<f64>,
    pub lambda: Option<f64>,
    pub phi: Vec<f64>,
    pub theta: Vec<f64>,
}

impl ParameterVector {
    pub fn new(d: Option<f64>, lambda: Option<f64>, phi: Vec<f64>, theta: Vec<f64>) -> Self {
        Self { d, lambda, phi, theta }
    }

    /// Pure ARMA parameters.
    pub fn arma(phi: Vec<f64>, theta: Vec<f64>) -> Self {
        Self { d: None, lambda: None, phi, theta }
    }

    /// No parameters at all: white noise.
    pub fn white_noise() -> Self {
        Self::default()
    }

    pub fn p(&self) -> usize {
        self.phi.len()
    }

    pub fn q(&self) -> usize {
        self.theta.len()
    }
}

// ---------------------------------------------------------------------------
// Coefficient <-> PACF transforms (Levinson recursions)
// ---------------------------------------------------------------------------

/// Map AR coefficients to partial autocorrelations (reverse Levinson).
///
/// The highest-order coefficient is the reflection coefficient of the
/// current order; the remaining ones are remapped to the order below by
/// `(φ_low + a·rev(φ_low)) / (1 - a²)`. Stops as soon as a reflection
/// coefficient reaches unit magnitude, leaving lower orders at zero.
pub fn ar_to_pacf(phi: &[f64]) -> Vec<f64> {
    let l = phi.len();
    let mut pacf = vec![0.0; l];
    let mut phik = phi.to_vec();

    for k in (0..l).rev() {
        let a = phik[k];
        pacf[k] = a;
        if a.abs() >= 1.0 {
            break;
        }
        let low = &phik[..k];
        let denom = 1.0 - a * a;
        phik = low
            .iter()
            .zip(low.iter().rev())
            .map(|(&x, &y)| (x + a * y) / denom)
            .collect();
    }
    pacf
}

/// Map partial autocorrelations to AR coefficients (forward Levinson).
///
/// `φ_k = [φ_{k-1} - π_k·rev(φ_{k-1}), π_k]`
pub fn pacf_to_ar(pacf: &[f64]) -> Vec<f64> {
    let mut phik: Vec<f64> = Vec::with_capacity(pacf.len());
    for &pi in pacf {
        let mut next: Vec<f64> = phik
            .iter()
            .zip(phik.iter().rev())
            .map(|(&x, &y)| x - pi * y)
            .collect();
        next.push(pi);
        phik = next;
    }
    phik
}

/// True iff every partial autocorrelation implied by `phi` lies strictly
/// inside the unit interval. Empty polynomials are invertible.
pub fn is_invertible(phi: &[f64]) -> bool {
    if phi.iter().any(|v| !v.is_finite()) {
        return false;
    }
    ar_to_pacf(phi)
        .iter()
        .all(|a| a.is_finite() && a.abs() < 1.0)
}

// ---------------------------------------------------------------------------
// Packed search vector
// ---------------------------------------------------------------------------

/// Layout of the search vector `[d?, λ?, AR-PACF(p), MA-PACF(q)]`.
///
/// ARTFIMA carries `[d, λ, ..]`, or `[λ, ..]` when d is fixed; ARFIMA
/// carries `[d, ..]`; ARMA only the PACF blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedLayout {
    pub class: ModelClass,
    pub p: usize,
    pub q: usize,
    pub fixed_d: Option<f64>,
}

impl PackedLayout {
    pub fn from_spec(spec: &ModelSpec) -> Self {
        Self {
            class: spec.class,
            p: spec.p,
            q: spec.q,
            fixed_d: spec.fixed_d,
        }
    }

    /// Number of free long-memory slots at the head of the vector.
    pub fn n_glp(&self) -> usize {
        match (self.class, self.fixed_d) {
            (ModelClass::Artfima, Some(_)) => 1,
            (class, _) => class.glp_order(),
        }
    }

    pub fn len(&self) -> usize {
        self.n_glp() + self.p + self.q
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn d_index(&self) -> Option<usize> {
        match (self.class, self.fixed_d) {
            (ModelClass::Artfima, None) | (ModelClass::Arfima, _) => Some(0),
            _ => None,
        }
    }

    pub fn lambda_index(&self) -> Option<usize> {
        match (self.class, self.fixed_d) {
            (ModelClass::Artfima, Some(_)) => Some(0),
            (ModelClass::Artfima, None) => Some(1),
            _ => None,
        }
    }

    /// Slot names, in order.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.len());
        if self.d_index().is_some() {
            names.push("d".to_string());
        }
        if self.lambda_index().is_some() {
            names.push("lambda".to_string());
        }
        names.extend((1..=self.p).map(|i| format!("phi{}", i)));
        names.extend((1..=self.q).map(|i| format!("theta{}", i)));
        names
    }

    /// Box limits per slot.
    pub fn bounds(&self, bounds: &Bounds) -> Vec<(f64, f64)> {
        let mut out = Vec::with_capacity(self.len());
        if self.d_index().is_some() {
            out.push(bounds.d_range(self.class));
        }
        if self.lambda_index().is_some() {
            out.push((bounds.lambda_min, bounds.lambda_max));
        }
        for _ in 0..(self.p + self.q) {
            out.push((-bounds.pacf_max, bounds.pacf_max));
        }
        out
    }

    /// Clamp a packed vector into the box.
    pub fn project(&self, beta: &[f64], bounds: &Bounds) -> Vec<f64> {
        beta.iter()
            .zip(self.bounds(bounds))
            .map(|(&x, (lo, hi))| x.clamp(lo, hi))
            .collect()
    }

    /// Decode a packed vector into coefficient form.
    pub fn unpack(&self, beta: &[f64]) -> Result<ParameterVector> {
        if beta.len() != self.len() {
            return Err(ArtfimaError::ParamLengthMismatch {
                expected: self.len(),
                got: beta.len(),
            });
        }
        let g = self.n_glp();
        let d = match self.class {
            ModelClass::Arma => None,
            _ => self.fixed_d.or_else(|| self.d_index().map(|i| beta[i])),
        };
        let lambda = self.lambda_index().map(|i| beta[i]);
        let phi = pacf_to_ar(&beta[g..g + self.p]);
        let theta = pacf_to_ar(&beta[g + self.p..]);
        Ok(ParameterVector { d, lambda, phi, theta })
    }

    /// Encode coefficient-form parameters into a packed vector.
    pub fn pack(&self, params: &ParameterVector) -> Result<Vec<f64>> {
        if params.p() != self.p {
            return Err(ArtfimaError::ParamLengthMismatch {
                expected: self.p,
                got: params.p(),
            });
        }
        if params.q() != self.q {
            return Err(ArtfimaError::ParamLengthMismatch {
                expected: self.q,
                got: params.q(),
            });
        }
        if !is_invertible(&params.phi) {
            return Err(ArtfimaError::InvalidModelSpec(
                "AR coefficients are not stationary".to_string(),
            ));
        }
        if !is_invertible(&params.theta) {
            return Err(ArtfimaError::InvalidModelSpec(
                "MA coefficients are not invertible".to_string(),
            ));
        }

        let mut beta = Vec::with_capacity(self.len());
        if self.d_index().is_some() {
            let d = params.d.ok_or_else(|| {
                ArtfimaError::InvalidModelSpec("start is missing d".to_string())
            })?;
            beta.push(d);
        }
        if self.lambda_index().is_some() {
            let lambda = params.lambda.ok_or_else(|| {
                ArtfimaError::InvalidModelSpec("start is missing lambda".to_string())
            })?;
            beta.push(lambda);
        }
        beta.extend(ar_to_pacf(&params.phi));
        beta.extend(ar_to_pacf(&params.theta));
        if beta.iter().any(|v| !v.is_finite()) {
            return Err(ArtfimaError::InvalidModelSpec(
                "start contains non-finite values".to_string(),
            ));
        }
        Ok(beta)
    }
}
