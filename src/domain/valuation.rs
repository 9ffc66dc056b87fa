//! Daily valuation output and the trade event log.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValuationRow {
    pub date: NaiveDate,
    /// One value per leg, in leg order.
    pub values: Vec<f64>,
    pub sum: f64,
}

/// Mark-to-market value per leg and in total, one row per simulated day.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValuationTable {
    legs: Vec<String>,
    rows: Vec<ValuationRow>,
}

impl ValuationTable {
    pub fn new(legs: Vec<String>) -> Self {
        ValuationTable {
            legs,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, date: NaiveDate, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.legs.len());
        debug_assert!(self.rows.last().is_none_or(|r| r.date < date));
        let sum = values.iter().sum();
        self.rows.push(ValuationRow { date, values, sum });
    }

    /// Appends the rows of a table that continues this one.
    pub fn extend(&mut self, other: ValuationTable) {
        debug_assert_eq!(self.legs, other.legs);
        self.rows.extend(other.rows);
    }

    pub fn legs(&self) -> &[String] {
        &self.legs
    }

    pub fn rows(&self) -> &[ValuationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&ValuationRow> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&ValuationRow> {
        self.rows.last()
    }

    pub fn row(&self, date: NaiveDate) -> Option<&ValuationRow> {
        self.rows
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Values of one leg over time.
    pub fn column(&self, leg: &str) -> Option<Vec<(NaiveDate, f64)>> {
        let idx = self.legs.iter().position(|l| l == leg)?;
        Some(self.rows.iter().map(|r| (r.date, r.values[idx])).collect())
    }

    pub fn sum_series(&self) -> Vec<(NaiveDate, f64)> {
        self.rows.iter().map(|r| (r.date, r.sum)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TradeKind {
    /// Initial purchase at the start of a run.
    Open,
    /// Trend signal turned on: parked cash bought back in.
    Entry,
    /// Trend signal turned off: holding sold to cash.
    Exit,
    RebalanceBuy,
    RebalanceSell,
    /// Cash moved into or out of a parked leg during rebalancing.
    RebalanceTransfer,
    TaxSale,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeEvent {
    pub date: NaiveDate,
    pub leg: String,
    pub kind: TradeKind,
    /// Units traded; zero for cash transfers.
    pub amount: f64,
    pub price: f64,
    /// Cash value of the trade; signed for transfers (positive into the leg).
    pub value: f64,
    pub gain: f64,
}
