#![allow(dead_code)]

use chrono::NaiveDate;
use ruletrader::domain::backtest::BacktestConfig;
use ruletrader::domain::error::DataError;
pub use ruletrader::domain::ohlcv::{BarStamp, OhlcvBar, PriceSeries};
use ruletrader::ports::data_port::PriceSource;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// In-memory price source that counts how often it was loaded.
pub struct MockPriceSource {
    pub bars: Vec<OhlcvBar>,
    pub error: Option<String>,
    pub loads: Cell<usize>,
}

impl MockPriceSource {
    pub fn new(bars: Vec<OhlcvBar>) -> Self {
        Self {
            bars,
            error: None,
            loads: Cell::new(0),
        }
    }

    pub fn failing(column: &str) -> Self {
        Self {
            bars: Vec::new(),
            error: Some(column.to_string()),
            loads: Cell::new(0),
        }
    }
}

impl PriceSource for MockPriceSource {
    fn load(&self) -> Result<PriceSeries, DataError> {
        self.loads.set(self.loads.get() + 1);
        if let Some(column) = &self.error {
            return Err(DataError::MissingColumn {
                column: column.clone(),
            });
        }
        Ok(PriceSeries::new(self.bars.clone()))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        stamp: BarStamp::Date(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
    }
}

/// Consecutive daily bars starting at `start_date`, one per close.
pub fn bars_from_closes(start_date: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let day = start + chrono::Duration::days(i as i64);
            make_bar(&day.format("%Y-%m-%d").to_string(), close)
        })
        .collect()
}

pub fn no_commission() -> BacktestConfig {
    BacktestConfig {
        commission: 0.0,
        ..BacktestConfig::default()
    }
}

/// Render bars as a CSV price table with a full header.
pub fn bars_to_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for bar in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.stamp, bar.open, bar.high, bar.low, bar.close, bar.volume
        ));
    }
    out
}

/// A scratch directory holding fixture files for one test.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
