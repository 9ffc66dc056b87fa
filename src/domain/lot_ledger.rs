//! FIFO lot ledger for a single instrument.
//!
//! Every buy appends a lot; sells consume the oldest lots first and report
//! the realized gain against each lot's own unit cost.

use log::debug;
use std::collections::VecDeque;

/// Lots whose remaining amount falls below this are discarded.
pub const TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lot {
    pub amount: f64,
    pub unit_cost: f64,
}

/// Outcome of [`LotLedger::sell`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleResult {
    pub proceeds: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LotLedger {
    name: String,
    lots: VecDeque<Lot>,
}

impl LotLedger {
    pub fn new(name: impl Into<String>) -> Self {
        LotLedger {
            name: name.into(),
            lots: VecDeque::new(),
        }
    }

    /// Rebuilds a ledger from lots in oldest-first order.
    pub fn from_lots(name: impl Into<String>, lots: Vec<Lot>) -> Self {
        LotLedger {
            name: name.into(),
            lots: lots.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Total amount held across all remaining lots.
    pub fn holding(&self) -> f64 {
        self.lots.iter().map(|lot| lot.amount).sum()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.holding() * price
    }

    /// Appends a lot and returns its cost.
    pub fn buy(&mut self, amount: f64, price: f64) -> f64 {
        assert!(amount > 0.0, "buy amount must be positive, got {amount}");
        assert!(price > 0.0, "buy price must be positive, got {price}");

        let cost = amount * price;
        debug!(
            "buy {:.4}x '{}' at {:.4} (total {:.2})",
            amount, self.name, price, cost
        );
        self.lots.push_back(Lot {
            amount,
            unit_cost: price,
        });
        cost
    }

    /// Sells `amount` oldest-first. Proceeds cover the amount actually
    /// taken from lots, which differs from `amount` only by an oversell
    /// within [`TOLERANCE`].
    ///
    /// Panics when the lots run out with more than [`TOLERANCE`] still to
    /// cover: callers size every sale from this ledger's own holding, so an
    /// oversell means their bookkeeping has drifted.
    pub fn sell(&mut self, amount: f64, price: f64) -> SaleResult {
        assert!(amount > 0.0, "sell amount must be positive, got {amount}");
        assert!(price > 0.0, "sell price must be positive, got {price}");

        let mut remaining = amount;
        let mut sold = 0.0;
        let mut gain = 0.0;
        loop {
            let Some(lot) = self.lots.front_mut() else {
                assert!(
                    remaining < TOLERANCE,
                    "cannot sell {amount} of '{}': holding exhausted with {remaining} left",
                    self.name
                );
                break;
            };
            let consumed = lot.amount.min(remaining);
            remaining -= consumed;
            sold += consumed;
            lot.amount -= consumed;
            gain += consumed * (price - lot.unit_cost);
            if lot.amount < TOLERANCE {
                self.lots.pop_front();
            }
            if remaining <= 0.0 {
                break;
            }
        }

        let proceeds = sold * price;
        debug!(
            "sell {:.4}x '{}' at {:.4} (total {:.2})",
            sold, self.name, price, proceeds
        );
        SaleResult { proceeds, gain }
    }

    /// Sells everything and leaves the ledger empty.
    pub fn sell_all(&mut self, price: f64) -> SaleResult {
        let holding = self.holding();
        if holding <= 0.0 {
            self.lots.clear();
            return SaleResult {
                proceeds: 0.0,
                gain: 0.0,
            };
        }
        let result = self.sell(holding, price);
        self.lots.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn buy_returns_cost_and_records_lot() {
        let mut ledger = LotLedger::new("UPRO");
        let cost = ledger.buy(10.0, 2.5);

        assert_relative_eq!(cost, 25.0);
        assert_relative_eq!(ledger.holding(), 10.0);
        assert_eq!(
            ledger.lots().collect::<Vec<_>>(),
            vec![&Lot {
                amount: 10.0,
                unit_cost: 2.5
            }]
        );
    }

    #[test]
    fn sell_consumes_oldest_lots_first() {
        let mut ledger = LotLedger::new("UPRO");
        ledger.buy(10.0, 1.0);
        ledger.buy(10.0, 2.0);

        let sale = ledger.sell(15.0, 3.0);

        assert_relative_eq!(sale.proceeds, 45.0);
        assert_relative_eq!(sale.gain, 25.0);
        let lots: Vec<_> = ledger.lots().cloned().collect();
        assert_eq!(lots.len(), 1);
        assert_relative_eq!(lots[0].amount, 5.0);
        assert_relative_eq!(lots[0].unit_cost, 2.0);
    }

    #[test]
    fn partial_sale_keeps_unit_cost() {
        let mut ledger = LotLedger::new("TMF");
        ledger.buy(8.0, 50.0);

        let sale = ledger.sell(3.0, 40.0);

        assert_relative_eq!(sale.gain, -30.0);
        let lot = ledger.lots().next().unwrap();
        assert_relative_eq!(lot.amount, 5.0);
        assert_relative_eq!(lot.unit_cost, 50.0);
    }

    #[test]
    fn near_zero_remnant_is_discarded() {
        let mut ledger = LotLedger::new("TMF");
        ledger.buy(1.0, 10.0);
        ledger.buy(1.0, 20.0);

        ledger.sell(0.9995, 10.0);

        assert_eq!(ledger.lots().count(), 1);
        assert_relative_eq!(ledger.holding(), 1.0);
    }

    #[test]
    fn oversell_within_tolerance_is_accepted() {
        let mut ledger = LotLedger::new("TMF");
        ledger.buy(2.0, 10.0);

        let sale = ledger.sell(2.0005, 10.0);

        assert!(ledger.is_empty());
        assert_relative_eq!(sale.gain, 0.0);
    }

    #[test]
    fn small_sale_at_high_price_reduces_holding() {
        let mut ledger = LotLedger::new("SPX");
        ledger.buy(2.0, 5000.0);

        let sale = ledger.sell(0.0005, 5000.0);

        assert_relative_eq!(sale.proceeds, 2.5, epsilon = 1e-9);
        assert_relative_eq!(ledger.holding(), 1.9995, epsilon = 1e-12);
        assert_relative_eq!(ledger.market_value(5000.0) + sale.proceeds, 10_000.0, epsilon = 1e-9);
    }

    #[test]
    fn oversell_within_tolerance_pays_only_for_held_units() {
        let mut ledger = LotLedger::new("SPX");
        ledger.buy(1.0, 4000.0);

        let sale = ledger.sell(1.0008, 5000.0);

        assert!(ledger.is_empty());
        assert_relative_eq!(sale.proceeds, 5000.0, epsilon = 1e-9);
        assert_relative_eq!(sale.gain, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn sub_tolerance_sale_spans_lots() {
        let mut ledger = LotLedger::new("SPX");
        ledger.buy(0.0003, 1000.0);
        ledger.buy(1.0, 2000.0);

        let sale = ledger.sell(0.0005, 3000.0);

        assert_relative_eq!(sale.proceeds, 1.5, epsilon = 1e-9);
        assert_relative_eq!(sale.gain, 0.0003 * 2000.0 + 0.0002 * 1000.0, epsilon = 1e-9);
        assert_eq!(ledger.lots().count(), 1);
        assert_relative_eq!(ledger.holding(), 0.9998, epsilon = 1e-12);
    }

    #[test]
    #[should_panic(expected = "holding exhausted")]
    fn oversell_panics() {
        let mut ledger = LotLedger::new("TMF");
        ledger.buy(2.0, 10.0);
        ledger.sell(3.0, 10.0);
    }

    #[test]
    #[should_panic(expected = "holding exhausted")]
    fn sell_from_empty_ledger_panics() {
        let mut ledger = LotLedger::new("TMF");
        ledger.sell(1.0, 10.0);
    }

    #[test]
    fn sell_all_empties_ledger() {
        let mut ledger = LotLedger::new("SPY");
        ledger.buy(4.0, 100.0);
        ledger.buy(6.0, 110.0);

        let sale = ledger.sell_all(120.0);

        assert!(ledger.is_empty());
        assert_relative_eq!(sale.proceeds, 1200.0);
        assert_relative_eq!(sale.gain, 4.0 * 20.0 + 6.0 * 10.0);
    }

    #[test]
    fn sell_all_on_empty_ledger_is_noop() {
        let mut ledger = LotLedger::new("SPY");
        let sale = ledger.sell_all(120.0);
        assert_relative_eq!(sale.proceeds, 0.0);
    }

    #[test]
    fn market_value_uses_holding() {
        let ledger = LotLedger::from_lots(
            "SPY",
            vec![
                Lot {
                    amount: 2.0,
                    unit_cost: 1.0,
                },
                Lot {
                    amount: 3.0,
                    unit_cost: 2.0,
                },
            ],
        );
        assert_relative_eq!(ledger.market_value(10.0), 50.0);
        assert_eq!(ledger.name(), "SPY");
    }
}
