//! Rebalancing and tax settlement shared by both portfolio kinds.
//!
//! Both routines see the legs of one simulated day together with each leg's
//! mid price on that day, in the same order.

use chrono::NaiveDate;
use log::debug;

use super::position::LegPosition;
use super::tax::TaxModel;
use super::valuation::{TradeEvent, TradeKind};

/// Settlement runs while the open liability exceeds this.
pub const SETTLEMENT_THRESHOLD: f64 = 1.0;

/// Per-leg tax shares below this are skipped in a settlement pass.
pub const MIN_TAX_SALE: f64 = 0.1;

/// Upper bound on settlement passes in a single day.
pub const MAX_SETTLEMENT_PASSES: usize = 100;

/// Rebalance differences at or below this are not traded.
const MIN_REBALANCE_VALUE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Holding {
    pub name: String,
    /// Fraction of the portfolio this leg targets.
    pub share: f64,
    pub position: LegPosition,
}

impl Holding {
    pub fn value(&self, price: f64) -> f64 {
        self.position.value(price)
    }
}

pub(crate) fn total_value(holdings: &[Holding], prices: &[f64]) -> f64 {
    holdings
        .iter()
        .zip(prices)
        .map(|(h, &p)| h.value(p))
        .sum()
}

/// Trades every leg back to its target share of the pre-trade total.
///
/// Invested legs trade at the spread-adjusted price so that each trade's
/// cash value equals the leg's difference to target; parked legs move cash.
pub(crate) fn rebalance<T: TaxModel>(
    date: NaiveDate,
    holdings: &mut [Holding],
    prices: &[f64],
    half_spread: f64,
    tax: &mut T,
    events: &mut Vec<TradeEvent>,
) {
    let total = total_value(holdings, prices);
    debug!("rebalancing on {} (total {:.2})", date, total);

    for (holding, &price) in holdings.iter_mut().zip(prices) {
        let value = holding.value(price);
        let target = holding.share * total;
        let diff = value - target;
        debug!(
            " * {}: {:.2} ({:.2}%, target {:.2}%)",
            holding.name,
            value,
            100.0 * value / total,
            100.0 * holding.share
        );
        if diff.abs() <= MIN_REBALANCE_VALUE {
            continue;
        }

        match &mut holding.position {
            LegPosition::Invested(ledger) if diff > 0.0 => {
                let sell_price = price * (1.0 - half_spread);
                // The spread can put a near-zero target below what selling
                // the whole holding raises; the leg then sells out.
                let held = ledger.holding();
                let amount = (diff / sell_price).min(held);
                if amount < diff / sell_price {
                    debug!(
                        "   => {} sells out: {:.2} short of target",
                        holding.name,
                        diff - amount * sell_price
                    );
                }
                let sale = ledger.sell(amount, sell_price);
                tax.add_gain(&holding.name, sale.gain);
                events.push(TradeEvent {
                    date,
                    leg: holding.name.clone(),
                    kind: TradeKind::RebalanceSell,
                    amount,
                    price: sell_price,
                    value: sale.proceeds,
                    gain: sale.gain,
                });
            }
            LegPosition::Invested(ledger) => {
                let buy_price = price * (1.0 + half_spread);
                let amount = -diff / buy_price;
                let cost = ledger.buy(amount, buy_price);
                events.push(TradeEvent {
                    date,
                    leg: holding.name.clone(),
                    kind: TradeKind::RebalanceBuy,
                    amount,
                    price: buy_price,
                    value: cost,
                    gain: 0.0,
                });
            }
            LegPosition::Parked { cash } => {
                *cash -= diff;
                debug!("   => reallocate {:.2} of cash for {}", -diff, holding.name);
                events.push(TradeEvent {
                    date,
                    leg: holding.name.clone(),
                    kind: TradeKind::RebalanceTransfer,
                    amount: 0.0,
                    price,
                    value: -diff,
                    gain: 0.0,
                });
            }
        }
    }
}

/// Pays the open liability by selling every leg in proportion to its value,
/// repeating while gains from those sales leave more than the threshold
/// open. Returns the total paid.
///
/// Leg shares below [`MIN_TAX_SALE`] are skipped unless every share is, in
/// which case the largest leg pays the whole amount.
///
/// Panics if a pass makes no progress or the pass cap is exceeded.
pub(crate) fn settle_tax<T: TaxModel>(
    date: NaiveDate,
    holdings: &mut [Holding],
    prices: &[f64],
    tax: &mut T,
    events: &mut Vec<TradeEvent>,
) -> f64 {
    let mut paid = 0.0;
    let mut passes = 0;

    while tax.open_tax() > SETTLEMENT_THRESHOLD {
        passes += 1;
        assert!(
            passes <= MAX_SETTLEMENT_PASSES,
            "tax settlement on {date} did not converge within {MAX_SETTLEMENT_PASSES} passes \
             ({:.2} still open)",
            tax.open_tax()
        );

        let open = tax.open_tax();
        let total = total_value(holdings, prices);
        assert!(
            total > 0.0,
            "cannot settle {open:.2} of tax on {date} from an empty portfolio"
        );
        debug!("selling to raise {:.2} for tax on {}", open, date);

        let targets = tax_targets(open, total, holdings, prices);
        for ((holding, &price), leg_target) in holdings.iter_mut().zip(prices).zip(targets) {
            if leg_target <= 0.0 {
                continue;
            }

            let raised = match &mut holding.position {
                LegPosition::Invested(ledger) => {
                    let amount = leg_target / price;
                    let sale = ledger.sell(amount, price);
                    tax.pay_tax(&holding.name, sale.proceeds);
                    tax.add_gain(&holding.name, sale.gain);
                    events.push(TradeEvent {
                        date,
                        leg: holding.name.clone(),
                        kind: TradeKind::TaxSale,
                        amount,
                        price,
                        value: sale.proceeds,
                        gain: sale.gain,
                    });
                    sale.proceeds
                }
                LegPosition::Parked { cash } => {
                    assert!(
                        *cash >= leg_target,
                        "parked cash {cash:.2} of {} cannot cover {leg_target:.2} tax",
                        holding.name
                    );
                    *cash -= leg_target;
                    tax.pay_tax(&holding.name, leg_target);
                    events.push(TradeEvent {
                        date,
                        leg: holding.name.clone(),
                        kind: TradeKind::TaxSale,
                        amount: 0.0,
                        price,
                        value: leg_target,
                        gain: 0.0,
                    });
                    leg_target
                }
            };
            paid += raised;
        }

        assert!(
            tax.open_tax() < open,
            "tax settlement on {date} made no progress ({open:.2} open)"
        );
    }

    paid
}

/// Value each leg sells in one settlement pass, in leg order.
fn tax_targets(open: f64, total: f64, holdings: &[Holding], prices: &[f64]) -> Vec<f64> {
    let values: Vec<f64> = holdings.iter().zip(prices).map(|(h, &p)| h.value(p)).collect();
    let mut targets: Vec<f64> = values.iter().map(|v| open * v / total).collect();

    if targets.iter().all(|&t| t < MIN_TAX_SALE) {
        let largest = values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        targets.iter_mut().for_each(|t| *t = 0.0);
        if let Some(i) = largest {
            targets[i] = open.min(values[i]);
        }
        return targets;
    }

    for (target, holding) in targets.iter_mut().zip(holdings) {
        if *target < MIN_TAX_SALE {
            debug!(
                "skip tax sale of {:.2} from {}: too small",
                target, holding.name
            );
            *target = 0.0;
        }
    }
    targets
}
