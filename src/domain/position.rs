//! A leg's holding: either lots of the traded instrument or parked cash.

use super::lot_ledger::{LotLedger, SaleResult};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LegPosition {
    Invested(LotLedger),
    Parked { cash: f64 },
}

impl LegPosition {
    pub fn is_invested(&self) -> bool {
        matches!(self, LegPosition::Invested(_))
    }

    /// Mark-to-market value at the instrument's mid price.
    pub fn value(&self, price: f64) -> f64 {
        match self {
            LegPosition::Invested(ledger) => ledger.market_value(price),
            LegPosition::Parked { cash } => *cash,
        }
    }

    /// Moves from parked cash into lots bought at `execution_price`.
    /// Already-invested positions are returned unchanged.
    pub fn enter(self, name: &str, execution_price: f64) -> LegPosition {
        match self {
            LegPosition::Parked { cash } => {
                let mut ledger = LotLedger::new(name);
                if cash > 0.0 {
                    ledger.buy(cash / execution_price, execution_price);
                }
                LegPosition::Invested(ledger)
            }
            invested => invested,
        }
    }

    /// Sells every lot at `execution_price` and parks the proceeds.
    /// Returns the sale, or `None` when already parked.
    pub fn exit(self, execution_price: f64) -> (LegPosition, Option<SaleResult>) {
        match self {
            LegPosition::Invested(mut ledger) => {
                let sale = ledger.sell_all(execution_price);
                (
                    LegPosition::Parked {
                        cash: sale.proceeds,
                    },
                    Some(sale),
                )
            }
            parked => (parked, None),
        }
    }
}
