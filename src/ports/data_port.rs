//! Price data access port trait.

use crate::domain::error::DataError;
use crate::domain::ohlcv::PriceSeries;

/// A source of one bar series, in index order.
pub trait PriceSource {
    fn load(&self) -> Result<PriceSeries, DataError>;
}
