//! OHLCV bar and price series representation.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// One of the five raw columns of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    /// Field names are case-sensitive: `close` parses, `Close` does not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Field::Open),
            "high" => Ok(Field::High),
            "low" => Ok(Field::Low),
            "close" => Ok(Field::Close),
            "volume" => Ok(Field::Volume),
            other => Err(format!(
                "expected price field (open, high, low, close, volume), found '{}'",
                other
            )),
        }
    }
}

/// Timestamp of a bar: its date when the source has one, else its row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarStamp {
    Date(NaiveDate),
    Index(usize),
}

impl fmt::Display for BarStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarStamp::Date(d) => write!(f, "{}", d),
            BarStamp::Index(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub stamp: BarStamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
        }
    }
}

/// Index-aligned sequence of bars. Every derived series has the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<OhlcvBar>) -> Self {
        Self { bars }
    }

    /// Series stamped by position, with every price column set to `closes`.
    pub fn from_closes(closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                stamp: BarStamp::Index(i),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect();
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column(&self, field: Field) -> Vec<f64> {
        self.bars.iter().map(|b| b.get(field)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            stamp: BarStamp::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn get_each_field() {
        let bar = sample_bar();
        assert_eq!(bar.get(Field::Open), 100.0);
        assert_eq!(bar.get(Field::High), 110.0);
        assert_eq!(bar.get(Field::Low), 90.0);
        assert_eq!(bar.get(Field::Close), 105.0);
        assert_eq!(bar.get(Field::Volume), 50_000.0);
    }

    #[test]
    fn field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), field);
        }
    }

    #[test]
    fn field_names_are_case_sensitive() {
        assert!("Close".parse::<Field>().is_err());
        assert!("price".parse::<Field>().is_err());
    }

    #[test]
    fn stamp_display() {
        let d = BarStamp::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(d.to_string(), "2024-03-05");
        assert_eq!(BarStamp::Index(7).to_string(), "7");
    }

    #[test]
    fn from_closes_is_index_stamped() {
        let series = PriceSeries::from_closes(&[1.0, 2.0, 3.0]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars[2].stamp, BarStamp::Index(2));
        assert_eq!(series.column(Field::Close), vec![1.0, 2.0, 3.0]);
    }
}
