#![allow(dead_code)]

use chrono::NaiveDate;
use lotfolio::domain::error::LotfolioError;
use lotfolio::domain::price_table::PriceTable;
use lotfolio::ports::data_port::PriceSource;
use std::cell::Cell;

/// Price source over an in-memory table that counts how often it is read.
pub struct MockPriceSource {
    pub table: Option<PriceTable>,
    pub error: Option<String>,
    pub loads: Cell<usize>,
}

impl MockPriceSource {
    pub fn new(table: PriceTable) -> Self {
        Self {
            table: Some(table),
            error: None,
            loads: Cell::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            table: None,
            error: Some(reason.to_string()),
            loads: Cell::new(0),
        }
    }
}

impl PriceSource for MockPriceSource {
    fn load_prices(&self) -> Result<PriceTable, LotfolioError> {
        self.loads.set(self.loads.get() + 1);
        if let Some(reason) = &self.error {
            return Err(LotfolioError::PriceTable {
                reason: reason.clone(),
            });
        }
        self.table.clone().ok_or_else(|| LotfolioError::PriceTable {
            reason: "no table".to_string(),
        })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Consecutive calendar days starting at `start`.
pub fn daily_dates(start: NaiveDate, len: usize) -> Vec<NaiveDate> {
    (0..len)
        .map(|i| start + chrono::Days::new(i as u64))
        .collect()
}

pub fn daily_table(start: NaiveDate, columns: &[(&str, Vec<f64>)]) -> PriceTable {
    let len = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
    PriceTable::new(
        daily_dates(start, len),
        columns
            .iter()
            .map(|(name, values)| (name.to_string(), values.clone()))
            .collect(),
    )
    .unwrap()
}

/// Deterministic random walk: `len` prices from `start`, one daily step per
/// entry of `steps` (cycled), each a fractional change.
pub fn walk(start: f64, steps: &[f64], len: usize) -> Vec<f64> {
    let mut price = start;
    (0..len)
        .map(|i| {
            if i > 0 {
                price *= 1.0 + steps[(i - 1) % steps.len()];
            }
            price
        })
        .collect()
}

pub fn prices_csv(table: &PriceTable) -> String {
    let mut out = String::from("date");
    for name in table.names() {
        out.push(',');
        out.push_str(name);
    }
    out.push('\n');
    for (i, d) in table.dates().iter().enumerate() {
        out.push_str(&d.format("%Y-%m-%d").to_string());
        for name in table.names() {
            out.push_str(&format!(",{}", table.column(name).unwrap()[i]));
        }
        out.push('\n');
    }
    out
}
