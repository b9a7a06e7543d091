//! Integer differencing applied before fitting and undone after forecasting.

/// Apply regular differencing `d0` times.
///
/// Returns the differenced series and the last level of every stage,
/// outermost first: `anchors[k]` is the final value of the series after
/// `k` differences.
pub fn difference(y: &[f64], d0: usize) -> (Vec<f64>, Vec<f64>) {
    let mut out = y.to_vec();
    let mut anchors = Vec::with_capacity(d0);
    for _ in 0..d0 {
        match out.last() {
            Some(&last) => anchors.push(last),
            None => break,
        }
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    (out, anchors)
}

/// Re-integrate forecasts of the `anchors.len()`-th difference back to the
/// original level by cumulative summation, innermost stage first.
pub fn integrate(forecasts: &[f64], anchors: &[f64]) -> Vec<f64> {
    let mut out = forecasts.to_vec();
    for &anchor in anchors.iter().rev() {
        let mut level = anchor;
        for v in out.iter_mut() {
            level += *v;
            *v = level;
        }
    }
    out
}
