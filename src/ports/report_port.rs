//! Report output port trait.

use crate::domain::error::LotfolioError;
use crate::domain::valuation::{TradeEvent, ValuationTable};

/// Port for writing backtest output.
pub trait ReportSink {
    fn write_valuation(&self, valuation: &ValuationTable) -> Result<(), LotfolioError>;

    /// Default implementation: event logs are optional for a sink.
    fn write_events(&self, _events: &[TradeEvent]) -> Result<(), LotfolioError> {
        Ok(())
    }
}
