//! Backtest settings, results, checkpoints and the per-run state shared by
//! both portfolio kinds.

use chrono::NaiveDate;
use log::debug;

use super::error::LotfolioError;
use super::leg::{total_weight, LegConfig};
use super::position::LegPosition;
use super::price_table::PriceTable;
use super::rebalance::{self, Holding};
use super::schedule::RebalanceSchedule;
use super::tax::TaxModel;
use super::valuation::{TradeEvent, ValuationTable};

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSettings {
    pub start_value: f64,
    pub rebalancing: Option<RebalanceSchedule>,
    /// Round-trip transaction cost as a fraction, split evenly between the
    /// buy and the sell side.
    pub spread: f64,
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        PortfolioSettings {
            start_value: 10_000.0,
            rebalancing: None,
            spread: 0.0,
        }
    }
}

impl PortfolioSettings {
    pub fn validate(&self) -> Result<(), LotfolioError> {
        if !self.start_value.is_finite() || self.start_value <= 0.0 {
            return Err(LotfolioError::ConfigInvalid {
                section: "portfolio".to_string(),
                key: "start_value".to_string(),
                reason: "start_value must be positive".to_string(),
            });
        }
        if !self.spread.is_finite() || self.spread < 0.0 || self.spread >= 1.0 {
            return Err(LotfolioError::ConfigInvalid {
                section: "portfolio".to_string(),
                key: "spread".to_string(),
                reason: "spread must be in [0, 1)".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LegSnapshot {
    pub name: String,
    pub position: LegPosition,
}

/// Everything needed to continue a run after `date`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortfolioSnapshot {
    /// Last simulated date.
    pub date: NaiveDate,
    pub next_rebalance: Option<NaiveDate>,
    pub open_tax: f64,
    pub legs: Vec<LegSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub valuation: ValuationTable,
    pub events: Vec<TradeEvent>,
    pub tax_paid: f64,
    pub snapshot: PortfolioSnapshot,
}

/// A portfolio that can be simulated over a price table.
pub trait Backtest {
    /// Runs from the first usable date to the end of `prices`.
    fn backtest(&self, prices: &PriceTable) -> Result<BacktestResult, LotfolioError>;

    /// Continues a previous run with the rows of `prices` after the
    /// snapshot date.
    fn resume(
        &self,
        snapshot: &PortfolioSnapshot,
        prices: &PriceTable,
    ) -> Result<BacktestResult, LotfolioError>;
}

/// Mutable state of one run. Owns its tax model, so runs never share one.
pub(crate) struct RunState<T> {
    pub holdings: Vec<Holding>,
    pub tax: T,
    pub schedule: Option<RebalanceSchedule>,
    pub next_rebalance: Option<NaiveDate>,
    pub valuation: ValuationTable,
    pub events: Vec<TradeEvent>,
    pub tax_paid: f64,
    pub last_date: Option<NaiveDate>,
}

impl<T: TaxModel> RunState<T> {
    pub fn new(
        legs: &[LegConfig],
        positions: Vec<LegPosition>,
        tax: T,
        settings: &PortfolioSettings,
        start: NaiveDate,
    ) -> Self {
        let total = total_weight(legs);
        let holdings = legs
            .iter()
            .zip(positions)
            .map(|(leg, position)| Holding {
                name: leg.name.clone(),
                share: leg.weight / total,
                position,
            })
            .collect();
        RunState {
            holdings,
            tax,
            schedule: settings.rebalancing,
            next_rebalance: settings.rebalancing.and_then(|s| s.first(start)),
            valuation: ValuationTable::new(legs.iter().map(|l| l.name.clone()).collect()),
            events: Vec::new(),
            tax_paid: 0.0,
            last_date: None,
        }
    }

    pub fn restore(
        legs: &[LegConfig],
        snapshot: &PortfolioSnapshot,
        mut tax: T,
        settings: &PortfolioSettings,
    ) -> Result<Self, LotfolioError> {
        let names: Vec<&str> = legs.iter().map(|l| l.name.as_str()).collect();
        let snap_names: Vec<&str> = snapshot.legs.iter().map(|l| l.name.as_str()).collect();
        if names != snap_names {
            return Err(LotfolioError::SnapshotMismatch {
                reason: format!("legs {:?} do not match snapshot legs {:?}", names, snap_names),
            });
        }
        if settings.rebalancing.is_none() && snapshot.next_rebalance.is_some() {
            return Err(LotfolioError::SnapshotMismatch {
                reason: "snapshot has a rebalancing date but the portfolio does not rebalance"
                    .to_string(),
            });
        }

        tax.restore(snapshot.open_tax);
        let positions = snapshot.legs.iter().map(|l| l.position.clone()).collect();
        let mut state = RunState::new(legs, positions, tax, settings, snapshot.date);
        state.next_rebalance = snapshot.next_rebalance;
        state.last_date = Some(snapshot.date);
        Ok(state)
    }

    /// Rebalances when `date` is on or past the scheduled date.
    pub fn rebalance_if_due(&mut self, date: NaiveDate, prices: &[f64], half_spread: f64) {
        let Some(due) = self.next_rebalance else {
            return;
        };
        if date < due {
            return;
        }
        rebalance::rebalance(
            date,
            &mut self.holdings,
            prices,
            half_spread,
            &mut self.tax,
            &mut self.events,
        );
        self.next_rebalance = self.schedule.and_then(|s| s.following(due));
    }

    pub fn settle(&mut self, date: NaiveDate, prices: &[f64]) {
        let paid = rebalance::settle_tax(
            date,
            &mut self.holdings,
            prices,
            &mut self.tax,
            &mut self.events,
        );
        if paid > 0.0 {
            debug!("paid {:.2} tax on {}", paid, date);
            self.tax_paid += paid;
        }
    }

    pub fn record(&mut self, date: NaiveDate, prices: &[f64]) {
        let values = self
            .holdings
            .iter()
            .zip(prices)
            .map(|(h, &p)| h.value(p))
            .collect();
        self.valuation.push(date, values);
        self.last_date = Some(date);
    }

    pub fn into_result(self, fallback_date: NaiveDate) -> BacktestResult {
        let snapshot = PortfolioSnapshot {
            date: self.last_date.unwrap_or(fallback_date),
            next_rebalance: self.next_rebalance,
            open_tax: self.tax.open_tax(),
            legs: self
                .holdings
                .into_iter()
                .map(|h| LegSnapshot {
                    name: h.name,
                    position: h.position,
                })
                .collect(),
        };
        BacktestResult {
            valuation: self.valuation,
            events: self.events,
            tax_paid: self.tax_paid,
            snapshot,
        }
    }
}

/// Mid prices of each leg's traded instrument on row `idx`.
pub(crate) fn leg_prices(columns: &[&[f64]], idx: usize) -> Vec<f64> {
    columns.iter().map(|c| c[idx]).collect()
}
