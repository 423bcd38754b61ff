//! Exponential Moving Average indicator.
//!
//! alpha = 2/(n+1), seeded with the first value of the series, then
//! EMA[i] = C[i]*alpha + EMA[i-1]*(1-alpha). No warmup: the recurrence starts
//! at bar 0 and never looks ahead. Leading NaNs stay NaN.
//!
//! A NaN after the seed carries the previous EMA forward, but the gap still
//! ages it: after `g` missing bars the old value weighs `(1-alpha)^(g+1)`
//! against `alpha` for the next observation.

pub fn calculate_ema(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if window == 0 {
        out.resize(values.len(), f64::NAN);
        return out;
    }

    let alpha = 2.0 / (window as f64 + 1.0);
    let mut ema: Option<f64> = None;
    let mut gap = 0i32;

    for &value in values {
        ema = match (ema, value.is_nan()) {
            (None, true) => None,
            (None, false) => Some(value),
            (Some(prev), true) => {
                gap += 1;
                Some(prev)
            }
            (Some(prev), false) => {
                let old_weight = (1.0 - alpha).powi(gap + 1);
                gap = 0;
                Some((old_weight * prev + alpha * value) / (old_weight + alpha))
            }
        };
        out.push(ema.unwrap_or(f64::NAN));
    }

    out
}
