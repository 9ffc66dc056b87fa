//! CSV price table reader and valuation writer.
//!
//! Price files are wide: a `date` column (`%Y-%m-%d`) followed by one
//! column of prices per instrument, one row per date.

use crate::domain::error::LotfolioError;
use crate::domain::price_table::PriceTable;
use crate::domain::valuation::{TradeEvent, TradeKind, ValuationTable};
use crate::ports::data_port::PriceSource;
use crate::ports::report_port::ReportSink;
use chrono::NaiveDate;
use log::info;
use std::io;
use std::path::PathBuf;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn table_error(&self, reason: impl std::fmt::Display) -> LotfolioError {
        LotfolioError::PriceTable {
            reason: format!("{}: {}", self.path.display(), reason),
        }
    }
}

impl PriceSource for CsvPriceAdapter {
    fn load_prices(&self) -> Result<PriceTable, LotfolioError> {
        let file = std::fs::File::open(&self.path)?;
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let headers = rdr.headers().map_err(|e| self.table_error(e))?.clone();
        if headers.get(0).is_none_or(|h| !h.eq_ignore_ascii_case("date")) {
            return Err(self.table_error("first column must be 'date'"));
        }
        let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
        if names.is_empty() {
            return Err(self.table_error("no instrument columns"));
        }

        let mut dates = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.table_error(e))?;
            let date_str = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
                self.table_error(format!("row {}: invalid date '{}': {}", line + 1, date_str, e))
            })?;

            for (i, column) in columns.iter_mut().enumerate() {
                let cell = record.get(i + 1).unwrap_or_default();
                let price: f64 = cell.parse().map_err(|_| {
                    self.table_error(format!(
                        "row {}: invalid price '{}' for {}",
                        line + 1,
                        cell,
                        names[i]
                    ))
                })?;
                column.push(price);
            }
            dates.push(date);
        }

        info!(
            "loaded {} rows of {} instruments from {}",
            dates.len(),
            names.len(),
            self.path.display()
        );
        PriceTable::new(dates, names.into_iter().zip(columns).collect())
    }
}

/// Writes the valuation table, to a file or stdout, and optionally the
/// trade log as CSV.
pub struct CsvReportAdapter {
    valuation_path: Option<PathBuf>,
    events_path: Option<PathBuf>,
}

impl CsvReportAdapter {
    pub fn new(valuation_path: PathBuf) -> Self {
        Self {
            valuation_path: Some(valuation_path),
            events_path: None,
        }
    }

    pub fn stdout() -> Self {
        Self {
            valuation_path: None,
            events_path: None,
        }
    }

    pub fn with_events(mut self, events_path: PathBuf) -> Self {
        self.events_path = Some(events_path);
        self
    }
}

impl ReportSink for CsvReportAdapter {
    fn write_valuation(&self, valuation: &ValuationTable) -> Result<(), LotfolioError> {
        match &self.valuation_path {
            Some(path) => {
                let mut wtr = csv::Writer::from_path(path).map_err(io::Error::other)?;
                write_valuation_records(&mut wtr, valuation)?;
                wtr.flush()?;
                info!(
                    "wrote {} valuation rows to {}",
                    valuation.len(),
                    path.display()
                );
            }
            None => {
                let mut wtr = csv::Writer::from_writer(io::stdout());
                write_valuation_records(&mut wtr, valuation)?;
                wtr.flush()?;
            }
        }
        Ok(())
    }

    fn write_events(&self, events: &[TradeEvent]) -> Result<(), LotfolioError> {
        let Some(path) = &self.events_path else {
            return Ok(());
        };
        let mut wtr = csv::Writer::from_path(path).map_err(io::Error::other)?;
        wtr.write_record(["date", "leg", "kind", "amount", "price", "value", "gain"])
            .map_err(io::Error::other)?;
        for event in events {
            wtr.write_record([
                event.date.format(DATE_FORMAT).to_string(),
                event.leg.clone(),
                kind_label(event.kind).to_string(),
                event.amount.to_string(),
                event.price.to_string(),
                event.value.to_string(),
                event.gain.to_string(),
            ])
            .map_err(io::Error::other)?;
        }
        wtr.flush()?;
        info!("wrote {} trade events to {}", events.len(), path.display());
        Ok(())
    }
}

/// Header `date, <legs...>, sum`, then one record per row.
pub fn write_valuation_records<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    valuation: &ValuationTable,
) -> Result<(), LotfolioError> {
    let mut header = vec!["date".to_string()];
    header.extend(valuation.legs().iter().cloned());
    header.push("sum".to_string());
    wtr.write_record(&header).map_err(io::Error::other)?;

    for row in valuation.rows() {
        let mut record = Vec::with_capacity(row.values.len() + 2);
        record.push(row.date.format(DATE_FORMAT).to_string());
        record.extend(row.values.iter().map(|v| format!("{v:.6}")));
        record.push(format!("{:.6}", row.sum));
        wtr.write_record(&record).map_err(io::Error::other)?;
    }
    Ok(())
}

fn kind_label(kind: TradeKind) -> &'static str {
    match kind {
        TradeKind::Open => "open",
        TradeKind::Entry => "entry",
        TradeKind::Exit => "exit",
        TradeKind::RebalanceBuy => "rebalance_buy",
        TradeKind::RebalanceSell => "rebalance_sell",
        TradeKind::RebalanceTransfer => "rebalance_transfer",
        TradeKind::TaxSale => "tax_sale",
    }
}
