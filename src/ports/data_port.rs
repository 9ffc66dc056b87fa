//! Price data port trait.

use crate::domain::error::LotfolioError;
use crate::domain::price_table::PriceTable;

/// Supplies the daily price table a backtest runs over. Gap filling and
/// date alignment happen behind this port.
pub trait PriceSource {
    fn load_prices(&self) -> Result<PriceTable, LotfolioError>;
}
