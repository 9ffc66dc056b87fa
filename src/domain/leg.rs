//! Per-leg portfolio configuration.

use super::error::LotfolioError;
use super::tax::AssetClass;
use std::collections::HashSet;

/// Trend gate applied to a leg.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Gating {
    /// Always invested.
    Always,
    /// Invested while `reference` trades at or above its `window`-day mean.
    MovingAverage { window: usize, reference: String },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LegConfig {
    pub name: String,
    /// Target weight in percent.
    pub weight: f64,
    pub gating: Gating,
    pub asset_class: AssetClass,
}

impl LegConfig {
    /// An ungated leg.
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        LegConfig {
            name: name.into(),
            weight,
            gating: Gating::Always,
            asset_class: AssetClass::Other,
        }
    }

    /// Gates the leg on a moving average of `reference`. A window of 1 never
    /// gates and is stored as [`Gating::Always`].
    pub fn with_moving_average(mut self, window: usize, reference: impl Into<String>) -> Self {
        self.gating = if window == 1 {
            Gating::Always
        } else {
            Gating::MovingAverage {
                window,
                reference: reference.into(),
            }
        };
        self
    }

    pub fn with_asset_class(mut self, class: AssetClass) -> Self {
        self.asset_class = class;
        self
    }

    /// Moving-average window; 1 when ungated.
    pub fn window(&self) -> usize {
        match &self.gating {
            Gating::Always => 1,
            Gating::MovingAverage { window, .. } => *window,
        }
    }

    /// Instrument the trend signal is read from.
    pub fn reference(&self) -> &str {
        match &self.gating {
            Gating::Always => &self.name,
            Gating::MovingAverage { reference, .. } => reference,
        }
    }

    pub fn is_gated(&self) -> bool {
        matches!(self.gating, Gating::MovingAverage { .. })
    }
}

/// Checks the leg set once before any simulation starts.
pub fn validate_legs(legs: &[LegConfig]) -> Result<(), LotfolioError> {
    if legs.is_empty() {
        return Err(LotfolioError::NoLegs);
    }

    let mut seen = HashSet::new();
    for leg in legs {
        if !seen.insert(leg.name.as_str()) {
            return Err(LotfolioError::DuplicateLeg {
                name: leg.name.clone(),
            });
        }
        if !leg.weight.is_finite() || leg.weight < 0.0 || leg.weight > 100.0 {
            return Err(LotfolioError::ConfigInvalid {
                section: format!("leg.{}", leg.name),
                key: "weight".to_string(),
                reason: format!("weight must be between 0 and 100, got {}", leg.weight),
            });
        }
        if let Gating::MovingAverage { window, reference } = &leg.gating {
            if *window == 0 {
                return Err(LotfolioError::ConfigInvalid {
                    section: format!("leg.{}", leg.name),
                    key: "ma_window".to_string(),
                    reason: "ma_window must be at least 1".to_string(),
                });
            }
            if reference.trim().is_empty() {
                return Err(LotfolioError::ConfigInvalid {
                    section: format!("leg.{}", leg.name),
                    key: "ma_reference".to_string(),
                    reason: "ma_reference must not be empty".to_string(),
                });
            }
        }
    }

    let total = total_weight(legs);
    if total > 100.0 + 1e-9 {
        return Err(LotfolioError::AllocationExceeded { total });
    }
    if total <= 0.0 {
        return Err(LotfolioError::ConfigInvalid {
            section: "portfolio".to_string(),
            key: "legs".to_string(),
            reason: "total weight must be positive".to_string(),
        });
    }
    Ok(())
}

pub fn total_weight(legs: &[LegConfig]) -> f64 {
    legs.iter().map(|leg| leg.weight).sum()
}
