//! CSV file price data adapter.
//!
//! Columns are matched by header name, case-insensitively. `close` is
//! required; `date` (`YYYY-MM-DD`) and the other price fields are optional.
//! Missing price columns load as NaN so comparisons over them never hold.

use crate::domain::error::DataError;
use crate::domain::ohlcv::{BarStamp, Field, OhlcvBar, PriceSeries};
use crate::ports::data_port::PriceSource;
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse a price table from any reader.
    pub fn read_series<R: Read>(reader: R) -> Result<PriceSeries, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column_of = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        };

        let date_col = column_of("date");
        let mut field_cols = [None; 5];
        for (slot, field) in field_cols.iter_mut().zip(Field::ALL) {
            *slot = column_of(field.as_str());
        }
        if column_of(Field::Close.as_str()).is_none() {
            return Err(DataError::MissingColumn {
                column: Field::Close.as_str().to_string(),
            });
        }
        for (col, field) in field_cols.iter().zip(Field::ALL) {
            if col.is_none() {
                warn!(column = field.as_str(), "price column missing, filling with NaN");
            }
        }

        let mut bars = Vec::new();
        for (index, result) in rdr.records().enumerate() {
            let record = result?;
            let row = index + 1;

            let stamp = match date_col {
                Some(col) => {
                    let raw = record.get(col).unwrap_or("");
                    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                        DataError::InvalidValue {
                            row,
                            column: "date".into(),
                            reason: format!("'{}': {}", raw, e),
                        }
                    })?;
                    BarStamp::Date(date)
                }
                None => BarStamp::Index(index),
            };

            let mut values = [f64::NAN; 5];
            for ((value, col), field) in values.iter_mut().zip(field_cols).zip(Field::ALL) {
                if let Some(col) = col {
                    *value = parse_value(record.get(col).unwrap_or(""), row, field)?;
                }
            }
            let [open, high, low, close, volume] = values;

            if !close.is_finite() {
                return Err(DataError::InvalidValue {
                    row,
                    column: Field::Close.as_str().into(),
                    reason: "close must be a finite number".into(),
                });
            }

            bars.push(OhlcvBar {
                stamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        debug!(bars = bars.len(), dated = date_col.is_some(), "loaded price series");
        Ok(PriceSeries::new(bars))
    }
}

/// An empty cell is NaN; anything else must parse as a float.
fn parse_value(raw: &str, row: usize, field: Field) -> Result<f64, DataError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|e| DataError::InvalidValue {
        row,
        column: field.as_str().into(),
        reason: format!("'{}': {}", raw, e),
    })
}

impl PriceSource for CsvAdapter {
    fn load(&self) -> Result<PriceSeries, DataError> {
        let file = File::open(&self.path)?;
        Self::read_series(file)
    }
}
