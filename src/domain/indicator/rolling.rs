//! Shift and trailing-window extrema.

/// Value `periods` bars in the past; NaN for the first `periods` bars.
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i < periods { f64::NAN } else { values[i - periods] })
        .collect()
}

/// Minimum over the trailing `window` bars including the current one.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::min)
}

/// Maximum over the trailing `window` bars including the current one.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::max)
}

// A NaN anywhere in the window makes the result NaN.
fn rolling_fold(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    for (i, w) in values.windows(window).enumerate() {
        if w.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i + window - 1] = w.iter().copied().reduce(pick).unwrap_or(f64::NAN);
    }

    out
}
