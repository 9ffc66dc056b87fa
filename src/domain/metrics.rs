//! Performance metrics over a valuation table.

use chrono::NaiveDate;

use super::backtest::BacktestResult;
use super::valuation::{TradeKind, ValuationTable};

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Drawdown {
    /// Largest peak-to-trough loss in percent.
    pub percent: f64,
    pub peak: NaiveDate,
    pub trough: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: f64,
    pub end_value: f64,
    /// Fractional return from first to last row.
    pub total_return: f64,
    /// Compound annual growth over calendar years.
    pub cagr: f64,
    /// `None` when the value never fell below a previous high.
    pub max_drawdown: Option<Drawdown>,
    pub entries: usize,
    pub exits: usize,
    pub tax_paid: f64,
}

impl Metrics {
    pub fn compute(result: &BacktestResult) -> Option<Self> {
        let mut metrics = Self::from_valuation(&result.valuation)?;
        metrics.entries = result
            .events
            .iter()
            .filter(|e| e.kind == TradeKind::Entry)
            .count();
        metrics.exits = result
            .events
            .iter()
            .filter(|e| e.kind == TradeKind::Exit)
            .count();
        metrics.tax_paid = result.tax_paid;
        Some(metrics)
    }

    /// Value-only metrics. `None` for an empty table.
    pub fn from_valuation(valuation: &ValuationTable) -> Option<Self> {
        let first = valuation.first()?;
        let last = valuation.last()?;

        let total_return = if first.sum > 0.0 {
            (last.sum - first.sum) / first.sum
        } else {
            0.0
        };

        let years = (last.date - first.date).num_days() as f64 / DAYS_PER_YEAR;
        let cagr = if years > 0.0 && first.sum > 0.0 && last.sum > 0.0 {
            (last.sum / first.sum).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        Some(Metrics {
            start_date: first.date,
            end_date: last.date,
            start_value: first.sum,
            end_value: last.sum,
            total_return,
            cagr,
            max_drawdown: compute_drawdown(&valuation.sum_series()),
            entries: 0,
            exits: 0,
            tax_paid: 0.0,
        })
    }
}

fn compute_drawdown(series: &[(NaiveDate, f64)]) -> Option<Drawdown> {
    let (first_date, first_value) = *series.first()?;
    let mut peak = (first_date, first_value);
    let mut worst: Option<Drawdown> = None;

    for &(date, value) in series {
        if value > peak.1 {
            peak = (date, value);
        } else if peak.1 > 0.0 {
            let percent = 100.0 * (peak.1 - value) / peak.1;
            if percent > 0.0 && worst.as_ref().is_none_or(|w| percent > w.percent) {
                worst = Some(Drawdown {
                    percent,
                    peak: peak.0,
                    trough: date,
                });
            }
        }
    }

    worst
}
