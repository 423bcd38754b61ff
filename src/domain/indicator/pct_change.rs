//! Percentage change indicator.
//!
//! PCT_CHANGE(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! A zero base follows IEEE division (±inf, or NaN for 0/0).
//! Warmup: first n bars are NaN.

pub fn calculate_pct_change(values: &[f64], window: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, &curr)| {
            if i < window {
                f64::NAN
            } else {
                let prev = values[i - window];
                ((curr - prev) / prev) * 100.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pct_change_warmup() {
        let series = calculate_pct_change(&[100.0, 110.0, 121.0], 2);
        assert!(series[0].is_nan());
        assert!(series[1].is_nan());
        assert_relative_eq!(series[2], 21.0, epsilon = 1e-9);
    }

    #[test]
    fn pct_change_one_bar() {
        let series = calculate_pct_change(&[100.0, 110.0, 99.0], 1);
        assert_relative_eq!(series[1], 10.0, epsilon = 1e-9);
        assert_relative_eq!(series[2], -10.0, epsilon = 1e-9);
    }

    #[test]
    fn pct_change_zero_base() {
        let series = calculate_pct_change(&[0.0, 5.0, 0.0, 0.0], 1);
        assert!(series[1].is_infinite());
        assert!(series[3].is_nan());
    }
}
