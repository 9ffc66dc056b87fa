//! Trend-gated portfolio.
//!
//! Each leg starts parked with its allocation in cash. Once a day, after any
//! scheduled rebalance, every leg compares its reference price with that
//! reference's moving average: parked legs at or above the average buy in,
//! invested legs below it sell out. Tax is settled after all trades of the
//! day and the row is recorded last.
//!
//! The reference may differ from the traded instrument, e.g. a leveraged
//! fund timed by its unleveraged index.

use chrono::NaiveDate;
use log::{debug, info};
use std::mem;

use super::backtest::{leg_prices, Backtest, BacktestResult, PortfolioSettings, PortfolioSnapshot, RunState};
use super::error::LotfolioError;
use super::fixed_weight::describe;
use super::leg::{validate_legs, LegConfig};
use super::moving_average::simple_moving_average;
use super::position::LegPosition;
use super::price_table::PriceTable;
use super::tax::{NullTaxModel, TaxModel};
use super::valuation::{TradeEvent, TradeKind};

#[derive(Debug, Clone)]
pub struct SignalGatedPortfolio<T = NullTaxModel> {
    legs: Vec<LegConfig>,
    settings: PortfolioSettings,
    tax_model: T,
}

/// Price columns and moving averages resolved for one run.
struct Signals<'a> {
    traded: Vec<&'a [f64]>,
    reference: Vec<&'a [f64]>,
    averages: Vec<Vec<Option<f64>>>,
    /// First row on which every average is defined.
    warmup: usize,
}

impl<T: TaxModel + Clone> SignalGatedPortfolio<T> {
    pub fn new(
        legs: Vec<LegConfig>,
        settings: PortfolioSettings,
        tax_model: T,
    ) -> Result<Self, LotfolioError> {
        validate_legs(&legs)?;
        settings.validate()?;
        Ok(SignalGatedPortfolio {
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

    /// Rows consumed before the first simulated day.
    pub fn warmup(&self) -> usize {
        self.legs.iter().map(|l| l.window()).max().unwrap_or(1) - 1
    }

    fn signals<'a>(&self, prices: &'a PriceTable) -> Result<Signals<'a>, LotfolioError> {
        let mut names: Vec<&str> = Vec::new();
        for leg in &self.legs {
            names.push(&leg.name);
            names.push(leg.reference());
        }
        let found = prices.require(&names)?;

        let warmup = self.warmup();
        if warmup >= prices.len() {
            return Err(LotfolioError::PriceTable {
                reason: format!(
                    "moving-average warm-up needs more than {} rows, table has {}",
                    warmup,
                    prices.len()
                ),
            });
        }

        let traded = self.legs.iter().map(|l| found[l.name.as_str()]).collect();
        let reference: Vec<&[f64]> = self.legs.iter().map(|l| found[l.reference()]).collect();
        let averages = self
            .legs
            .iter()
            .zip(&reference)
            .map(|(leg, column)| simple_moving_average(column, leg.window()))
            .collect();

        Ok(Signals {
            traded,
            reference,
            averages,
            warmup,
        })
    }

    fn run(&self, state: &mut RunState<T>, signals: &Signals, dates: &[NaiveDate], from: usize) {
        let half_spread = self.settings.spread / 2.0;

        for (idx, &date) in dates.iter().enumerate().skip(from) {
            let prices = leg_prices(&signals.traded, idx);
            state.rebalance_if_due(date, &prices, half_spread);

            for (i, leg) in self.legs.iter().enumerate() {
                let Some(average) = signals.averages[i][idx] else {
                    continue;
                };
                let reference = signals.reference[i][idx];
                let price = prices[i];
                let holding = &mut state.holdings[i];
                let invested = holding.position.is_invested();

                if !invested && reference >= average {
                    let buy_price = price * (1.0 + half_spread);
                    let cash = holding.position.value(price);
                    debug!(
                        "{}: [{}] {:.2} >= MA({}) {:.2}, buy {} at {:.2}",
                        date,
                        leg.reference(),
                        reference,
                        leg.window(),
                        average,
                        leg.name,
                        buy_price
                    );
                    let parked = mem::replace(&mut holding.position, LegPosition::Parked { cash: 0.0 });
                    holding.position = parked.enter(&leg.name, buy_price);
                    state.events.push(TradeEvent {
                        date,
                        leg: leg.name.clone(),
                        kind: TradeKind::Entry,
                        amount: cash / buy_price,
                        price: buy_price,
                        value: cash,
                        gain: 0.0,
                    });
                } else if invested && reference < average {
                    let sell_price = price * (1.0 - half_spread);
                    debug!(
                        "{}: [{}] {:.2} < MA({}) {:.2}, sell {} at {:.2}",
                        date,
                        leg.reference(),
                        reference,
                        leg.window(),
                        average,
                        leg.name,
                        sell_price
                    );
                    let current = mem::replace(&mut holding.position, LegPosition::Parked { cash: 0.0 });
                    let amount = match &current {
                        LegPosition::Invested(ledger) => ledger.holding(),
                        LegPosition::Parked { .. } => 0.0,
                    };
                    let (parked, sale) = current.exit(sell_price);
                    holding.position = parked;
                    if let Some(sale) = sale {
                        state.tax.add_gain(&leg.name, sale.gain);
                        state.events.push(TradeEvent {
                            date,
                            leg: leg.name.clone(),
                            kind: TradeKind::Exit,
                            amount,
                            price: sell_price,
                            value: sale.proceeds,
                            gain: sale.gain,
                        });
                    }
                }
            }

            state.settle(date, &prices);
            state.record(date, &prices);
        }
    }
}

impl<T: TaxModel + Clone> Backtest for SignalGatedPortfolio<T> {
    fn backtest(&self, prices: &PriceTable) -> Result<BacktestResult, LotfolioError> {
        let signals = self.signals(prices)?;
        let dates = prices.dates();
        let start = dates[signals.warmup];
        info!(
            "backtest of signal-gated portfolio {} from {} to {}",
            describe(&self.legs),
            start,
            dates[dates.len() - 1]
        );

        let positions = self
            .legs
            .iter()
            .map(|leg| LegPosition::Parked {
                cash: self.settings.start_value * leg.weight / 100.0,
            })
            .collect();
        let mut state = RunState::new(
            &self.legs,
            positions,
            self.tax_model.clone(),
            &self.settings,
            start,
        );
        self.run(&mut state, &signals, dates, signals.warmup);

        let result = state.into_result(start);
        if let Some(last) = result.valuation.last() {
            info!(
                "final value {:.2} on {} after {} signal trades",
                last.sum,
                last.date,
                result
                    .events
                    .iter()
                    .filter(|e| matches!(e.kind, TradeKind::Entry | TradeKind::Exit))
                    .count()
            );
        }
        Ok(result)
    }

    fn resume(
        &self,
        snapshot: &PortfolioSnapshot,
        prices: &PriceTable,
    ) -> Result<BacktestResult, LotfolioError> {
        let signals = self.signals(prices)?;
        let mut state =
            RunState::restore(&self.legs, snapshot, self.tax_model.clone(), &self.settings)?;
        let dates = prices.dates();
        let from = dates
            .partition_point(|d| *d <= snapshot.date)
            .max(signals.warmup);
        info!(
            "resuming signal-gated portfolio {} after {}",
            describe(&self.legs),
            snapshot.date
        );
        self.run(&mut state, &signals, dates, from);
        Ok(state.into_result(snapshot.date))
    }
}
