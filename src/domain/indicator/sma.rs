//! Simple Moving Average indicator.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]).
//! Warmup: first (n-1) bars are NaN. A NaN anywhere in the window yields NaN.

pub fn calculate_sma(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }

    for (i, w) in values.windows(window).enumerate() {
        out[i + window - 1] = w.iter().sum::<f64>() / window as f64;
    }

    out
}
