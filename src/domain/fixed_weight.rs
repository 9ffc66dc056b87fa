//! Static-weight portfolio with optional calendar rebalancing.
//!
//! Every leg is bought at the first date and stays invested. On scheduled
//! dates the legs are traded back to their target weights; realized gains
//! feed the tax model and the liability is settled by proportional sales.

use chrono::NaiveDate;
use log::info;

use super::backtest::{leg_prices, Backtest, BacktestResult, PortfolioSettings, PortfolioSnapshot, RunState};
use super::error::LotfolioError;
use super::leg::{validate_legs, LegConfig};
use super::lot_ledger::LotLedger;
use super::position::LegPosition;
use super::price_table::PriceTable;
use super::tax::{NullTaxModel, TaxModel};
use super::valuation::{TradeEvent, TradeKind};

#[derive(Debug, Clone)]
pub struct FixedWeightPortfolio<T = NullTaxModel> {
    legs: Vec<LegConfig>,
    settings: PortfolioSettings,
    tax_model: T,
}

impl<T: TaxModel + Clone> FixedWeightPortfolio<T> {
    /// Validates the configuration. Legs must be ungated and the spread
    /// zero; use a signal-gated portfolio for either.
    pub fn new(
        legs: Vec<LegConfig>,
        settings: PortfolioSettings,
        tax_model: T,
    ) -> Result<Self, LotfolioError> {
        validate_legs(&legs)?;
        settings.validate()?;
        if let Some(leg) = legs.iter().find(|l| l.is_gated()) {
            return Err(LotfolioError::ConfigInvalid {
                section: format!("leg.{}", leg.name),
                key: "ma_window".to_string(),
                reason: "fixed-weight portfolios do not gate legs".to_string(),
            });
        }
        if settings.spread != 0.0 {
            return Err(LotfolioError::ConfigInvalid {
                section: "portfolio".to_string(),
                key: "spread".to_string(),
                reason: "fixed-weight portfolios trade at mid price".to_string(),
            });
        }
        Ok(FixedWeightPortfolio {
            legs,
            settings,
            tax_model,
        })
    }

    pub fn legs(&self) -> &[LegConfig] {
        &self.legs
    }

    pub fn settings(&self) -> &PortfolioSettings {
        &self.settings
    }

    fn columns<'a>(&self, prices: &'a PriceTable) -> Result<Vec<&'a [f64]>, LotfolioError> {
        let names: Vec<&str> = self.legs.iter().map(|l| l.name.as_str()).collect();
        let found = prices.require(&names)?;
        Ok(names.iter().map(|n| found[*n]).collect())
    }

    fn run(&self, state: &mut RunState<T>, columns: &[&[f64]], dates: &[NaiveDate], from: usize) {
        for (idx, &date) in dates.iter().enumerate().skip(from) {
            let prices = leg_prices(columns, idx);
            state.rebalance_if_due(date, &prices, 0.0);
            state.settle(date, &prices);
            state.record(date, &prices);
        }
    }
}

impl<T: TaxModel + Clone> Backtest for FixedWeightPortfolio<T> {
    fn backtest(&self, prices: &PriceTable) -> Result<BacktestResult, LotfolioError> {
        let columns = self.columns(prices)?;
        let dates = prices.dates();
        let start = dates[0];
        info!(
            "backtest of fixed-weight portfolio {} from {} to {}",
            describe(&self.legs),
            start,
            dates[dates.len() - 1]
        );

        let mut opening = Vec::new();
        let positions = self
            .legs
            .iter()
            .zip(&columns)
            .map(|(leg, column)| {
                let mut ledger = LotLedger::new(&leg.name);
                let value = self.settings.start_value * leg.weight / 100.0;
                if value > 0.0 {
                    let price = column[0];
                    let amount = value / price;
                    ledger.buy(amount, price);
                    opening.push(TradeEvent {
                        date: start,
                        leg: leg.name.clone(),
                        kind: TradeKind::Open,
                        amount,
                        price,
                        value,
                        gain: 0.0,
                    });
                }
                LegPosition::Invested(ledger)
            })
            .collect();

        let mut state = RunState::new(
            &self.legs,
            positions,
            self.tax_model.clone(),
            &self.settings,
            start,
        );
        state.events = opening;
        self.run(&mut state, &columns, dates, 0);

        let result = state.into_result(start);
        if let Some(last) = result.valuation.last() {
            info!("final value {:.2} on {}", last.sum, last.date);
        }
        Ok(result)
    }

    fn resume(
        &self,
        snapshot: &PortfolioSnapshot,
        prices: &PriceTable,
    ) -> Result<BacktestResult, LotfolioError> {
        let columns = self.columns(prices)?;
        if let Some(leg) = snapshot.legs.iter().find(|l| !l.position.is_invested()) {
            return Err(LotfolioError::SnapshotMismatch {
                reason: format!("leg '{}' is parked in a fixed-weight snapshot", leg.name),
            });
        }

        let mut state =
            RunState::restore(&self.legs, snapshot, self.tax_model.clone(), &self.settings)?;
        let dates = prices.dates();
        let from = dates.partition_point(|d| *d <= snapshot.date);
        info!(
            "resuming fixed-weight portfolio {} after {}",
            describe(&self.legs),
            snapshot.date
        );
        self.run(&mut state, &columns, dates, from);
        Ok(state.into_result(snapshot.date))
    }
}

pub(crate) fn describe(legs: &[LegConfig]) -> String {
    let parts: Vec<String> = legs
        .iter()
        .map(|l| format!("{}% {}", l.weight, l.name))
        .collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::{CalendarOffset, RebalanceSchedule};
    use crate::domain::tax::FlatRateTaxModel;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily_table(start: NaiveDate, columns: Vec<(&str, Vec<f64>)>) -> PriceTable {
        let len = columns[0].1.len();
        let dates = (0..len)
            .map(|i| start + chrono::Days::new(i as u64))
            .collect();
        PriceTable::new(
            dates,
            columns
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        )
        .unwrap()
    }

    fn monthly() -> PortfolioSettings {
        PortfolioSettings {
            start_value: 10_000.0,
            rebalancing: Some(RebalanceSchedule::new(CalendarOffset::days(2), None).unwrap()),
            spread: 0.0,
        }
    }

    #[test]
    fn buy_and_hold_tracks_price() {
        let table = daily_table(d(2020, 1, 1), vec![("SPY", vec![100.0, 110.0, 99.0])]);
        let portfolio = FixedWeightPortfolio::new(
            vec![LegConfig::new("SPY", 100.0)],
            PortfolioSettings::default(),
            NullTaxModel,
        )
        .unwrap();

        let result = portfolio.backtest(&table).unwrap();

        assert_eq!(result.valuation.len(), 3);
        assert_relative_eq!(result.valuation.last().unwrap().sum, 9_900.0, epsilon = 1e-9);
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].kind, TradeKind::Open);
    }

    #[test]
    fn rebalances_on_schedule() {
        let table = daily_table(
            d(2020, 1, 1),
            vec![("A", vec![100.0, 150.0, 200.0, 200.0]), ("B", vec![100.0; 4])],
        );
        let portfolio = FixedWeightPortfolio::new(
            vec![LegConfig::new("A", 50.0), LegConfig::new("B", 50.0)],
            monthly(),
            NullTaxModel,
        )
        .unwrap();

        let result = portfolio.backtest(&table).unwrap();

        let row = result.valuation.row(d(2020, 1, 3)).unwrap();
        assert_relative_eq!(row.values[0], 7_500.0, epsilon = 1e-9);
        assert_relative_eq!(row.values[1], 7_500.0, epsilon = 1e-9);
        let sell = result
            .events
            .iter()
            .find(|e| e.kind == TradeKind::RebalanceSell)
            .unwrap();
        assert_relative_eq!(sell.gain, 1_250.0, epsilon = 1e-9);
    }

    #[test]
    fn weights_below_100_leave_residual_uninvested() {
        let table = daily_table(d(2020, 1, 1), vec![("A", vec![10.0, 10.0])]);
        let portfolio = FixedWeightPortfolio::new(
            vec![LegConfig::new("A", 60.0)],
            PortfolioSettings::default(),
            NullTaxModel,
        )
        .unwrap();

        let result = portfolio.backtest(&table).unwrap();
        assert_relative_eq!(result.valuation.first().unwrap().sum, 6_000.0);
    }

    #[test]
    fn tax_is_settled_after_rebalance() {
        let table = daily_table(
            d(2020, 1, 1),
            vec![("A", vec![100.0, 150.0, 200.0, 200.0]), ("B", vec![100.0; 4])],
        );
        let portfolio = FixedWeightPortfolio::new(
            vec![LegConfig::new("A", 50.0), LegConfig::new("B", 50.0)],
            monthly(),
            FlatRateTaxModel::new(25.0),
        )
        .unwrap();

        let result = portfolio.backtest(&table).unwrap();

        assert!(result.tax_paid > 312.5);
        assert!(result.snapshot.open_tax <= 1.0);
        let row = result.valuation.row(d(2020, 1, 3)).unwrap();
        assert_relative_eq!(row.sum, 15_000.0 - result.tax_paid, epsilon = 1e-6);
    }

    #[test]
    fn missing_column_is_reported() {
        let table = daily_table(d(2020, 1, 1), vec![("A", vec![1.0])]);
        let portfolio = FixedWeightPortfolio::new(
            vec![LegConfig::new("B", 100.0)],
            PortfolioSettings::default(),
            NullTaxModel,
        )
        .unwrap();
        assert!(matches!(
            portfolio.backtest(&table),
            Err(LotfolioError::MissingInstrument { .. })
        ));
    }

    #[test]
    fn gated_leg_rejected() {
        let result = FixedWeightPortfolio::new(
            vec![LegConfig::new("A", 100.0).with_moving_average(200, "A")],
            PortfolioSettings::default(),
            NullTaxModel,
        );
        assert!(matches!(result, Err(LotfolioError::ConfigInvalid { .. })));
    }

    #[test]
    fn spread_rejected() {
        let settings = PortfolioSettings {
            spread: 0.01,
            ..PortfolioSettings::default()
        };
        let result = FixedWeightPortfolio::new(vec![LegConfig::new("A", 100.0)], settings, NullTaxModel);
        assert!(matches!(result, Err(LotfolioError::ConfigInvalid { .. })));
    }

    #[test]
    fn resume_rejects_parked_snapshot() {
        let table = daily_table(d(2020, 1, 1), vec![("A", vec![1.0, 2.0])]);
        let portfolio = FixedWeightPortfolio::new(
            vec![LegConfig::new("A", 100.0)],
            PortfolioSettings::default(),
            NullTaxModel,
        )
        .unwrap();
        let snapshot = PortfolioSnapshot {
            date: d(2020, 1, 1),
            next_rebalance: None,
            open_tax: 0.0,
            legs: vec![crate::domain::backtest::LegSnapshot {
                name: "A".into(),
                position: LegPosition::Parked { cash: 5.0 },
            }],
        };
        assert!(matches!(
            portfolio.resume(&snapshot, &table),
            Err(LotfolioError::SnapshotMismatch { .. })
        ));
    }

    #[test]
    fn describe_lists_weights() {
        let legs = vec![LegConfig::new("UPRO", 55.0), LegConfig::new("TMF", 45.0)];
        assert_eq!(describe(&legs), "[55% UPRO, 45% TMF]");
    }
}
