//! Configuration access port trait.
//!
//! Keys are addressed as `[section] key`. Leg settings live in sections
//! named `leg.<NAME>`. Implementors supply raw strings; the typed getters
//! parse them and report malformed values instead of falling back.

use crate::domain::error::LotfolioError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Comma-separated list with blank entries dropped. `None` when the key
    /// is absent.
    fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get_string(section, key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Finite number, `None` when the key is absent.
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, LotfolioError> {
        let Some(raw) = self.get_string(section, key) else {
            return Ok(None);
        };
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, format!("'{}' is not a number", raw.trim()))),
        }
    }

    /// Non-negative integer, `None` when the key is absent.
    fn get_count(&self, section: &str, key: &str) -> Result<Option<usize>, LotfolioError> {
        let Some(raw) = self.get_string(section, key) else {
            return Ok(None);
        };
        raw.trim().parse::<usize>().map(Some).map_err(|_| {
            invalid(
                section,
                key,
                format!("'{}' is not a positive integer", raw.trim()),
            )
        })
    }
}

fn invalid(section: &str, key: &str, reason: String) -> LotfolioError {
    LotfolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}
