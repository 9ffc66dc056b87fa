//! Daily price table: one row per date, one column per instrument.

use super::error::LotfolioError;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Price of the synthetic cash column.
pub const CASH_PRICE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
}

impl PriceTable {
    /// Builds a table from strictly ascending dates and equally long columns.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, LotfolioError> {
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(LotfolioError::PriceTable {
                reason: format!(
                    "dates must be strictly ascending, found {} followed by {}",
                    pair[0], pair[1]
                ),
            });
        }

        let mut names = Vec::with_capacity(columns.len());
        let mut map = HashMap::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != dates.len() {
                return Err(LotfolioError::PriceTable {
                    reason: format!(
                        "column '{}' has {} values for {} dates",
                        name,
                        values.len(),
                        dates.len()
                    ),
                });
            }
            if map.contains_key(&name) {
                return Err(LotfolioError::PriceTable {
                    reason: format!("duplicate column '{}'", name),
                });
            }
            names.push(name.clone());
            map.insert(name, values);
        }

        Ok(PriceTable {
            dates,
            names,
            columns: map,
        })
    }

    /// Adds a column with the same price on every date.
    pub fn with_constant_column(mut self, name: &str, price: f64) -> Self {
        if !self.columns.contains_key(name) {
            self.names.push(name.to_string());
        }
        self.columns
            .insert(name.to_string(), vec![price; self.dates.len()]);
        self
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Rows up to and including `date`.
    pub fn truncate_after(&self, date: NaiveDate) -> PriceTable {
        let end = self.dates.partition_point(|d| *d <= date);
        PriceTable {
            dates: self.dates[..end].to_vec(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[..end].to_vec()))
                .collect(),
        }
    }

    /// Looks up the named columns, failing on the first one that is missing
    /// or holds a non-finite or non-positive price.
    pub fn require<'a>(
        &'a self,
        names: &[&str],
    ) -> Result<HashMap<String, &'a [f64]>, LotfolioError> {
        if self.dates.is_empty() {
            return Err(LotfolioError::PriceTable {
                reason: "price table has no rows".to_string(),
            });
        }
        let mut found = HashMap::new();
        for &name in names {
            let values = self
                .column(name)
                .ok_or_else(|| LotfolioError::MissingInstrument {
                    name: name.to_string(),
                })?;
            if let Some((i, &price)) = values
                .iter()
                .enumerate()
                .find(|(_, p)| !p.is_finite() || **p <= 0.0)
            {
                return Err(LotfolioError::InvalidPrice {
                    name: name.to_string(),
                    date: self.dates[i],
                    price,
                });
            }
            found.insert(name.to_string(), values);
        }
        Ok(found)
    }
}
