//! RSI (Relative Strength Index) indicator implementation.
//!
//! Averages are simple means of the last n price changes:
//! - gain[i] = max(C[i] - C[i-1], 0), loss[i] = max(C[i-1] - C[i], 0)
//! - avg_gain, avg_loss = mean over the n changes ending at bar i
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 and avg_gain > 0: RSI = 100
//! If both are 0: NaN
//!
//! Warmup: first n bars are NaN (need n price changes).

pub fn calculate_rsi(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || values.len() <= window {
        return out;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    // changes[j] is the move into bar j + 1
    for (j, w) in changes.windows(window).enumerate() {
        if w.iter().any(|c| c.is_nan()) {
            continue;
        }
        let avg_gain = w.iter().map(|c| c.max(0.0)).sum::<f64>() / window as f64;
        let avg_loss = w.iter().map(|c| (-c).max(0.0)).sum::<f64>() / window as f64;
        out[j + window] = rsi_from_averages(avg_gain, avg_loss);
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { f64::NAN } else { 100.0 };
    }
    100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
}
