//! Configuration validation.
//!
//! Reads the `[portfolio]`, `[tax]` and `[leg.NAME]` sections into a
//! [`PortfolioPlan`], rejecting every invalid field before a backtest runs.

use log::debug;

use crate::domain::backtest::{Backtest, BacktestResult, PortfolioSettings, PortfolioSnapshot};
use crate::domain::error::LotfolioError;
use crate::domain::fixed_weight::FixedWeightPortfolio;
use crate::domain::leg::{validate_legs, LegConfig};
use crate::domain::price_table::{PriceTable, CASH_PRICE};
use crate::domain::schedule::{CalendarOffset, RebalanceSchedule};
use crate::domain::signal_gated::SignalGatedPortfolio;
use crate::domain::tax::{AssetClass, FlatRateTaxModel, TaxRegime, DEFAULT_FLAT_RATE};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortfolioKind {
    FixedWeight,
    SignalGated,
}

/// A validated portfolio ready to run against a price table.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioPlan {
    pub settings: PortfolioSettings,
    pub legs: Vec<LegConfig>,
    pub tax: TaxRegime,
    pub kind: PortfolioKind,
    /// Name of the synthetic constant-price column, if any.
    pub cash_column: Option<String>,
}

impl PortfolioPlan {
    /// Adds the synthetic cash column when one is configured.
    pub fn prepare(&self, prices: PriceTable) -> PriceTable {
        match &self.cash_column {
            Some(name) => prices.with_constant_column(name, CASH_PRICE),
            None => prices,
        }
    }

    pub fn backtest(&self, prices: &PriceTable) -> Result<BacktestResult, LotfolioError> {
        self.portfolio()?.backtest(prices)
    }

    pub fn resume(
        &self,
        snapshot: &PortfolioSnapshot,
        prices: &PriceTable,
    ) -> Result<BacktestResult, LotfolioError> {
        self.portfolio()?.resume(snapshot, prices)
    }

    fn portfolio(&self) -> Result<Box<dyn Backtest>, LotfolioError> {
        let legs = self.legs.clone();
        let settings = self.settings.clone();
        let tax = self.tax.clone();
        Ok(match self.kind {
            PortfolioKind::FixedWeight => Box::new(FixedWeightPortfolio::new(legs, settings, tax)?),
            PortfolioKind::SignalGated => Box::new(SignalGatedPortfolio::new(legs, settings, tax)?),
        })
    }
}

pub fn build_plan(config: &dyn ConfigPort) -> Result<PortfolioPlan, LotfolioError> {
    let settings = parse_settings(config)?;
    let legs = parse_legs(config)?;
    validate_legs(&legs)?;
    let tax = parse_tax(config, &legs)?;

    let kind = if settings.spread > 0.0 || legs.iter().any(|l| l.is_gated()) {
        PortfolioKind::SignalGated
    } else {
        PortfolioKind::FixedWeight
    };
    let cash_column = config
        .get_string("portfolio", "cash_column")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    debug!("configured {:?} portfolio with {} legs", kind, legs.len());
    Ok(PortfolioPlan {
        settings,
        legs,
        tax,
        kind,
        cash_column,
    })
}

fn parse_settings(config: &dyn ConfigPort) -> Result<PortfolioSettings, LotfolioError> {
    let defaults = PortfolioSettings::default();
    let start_value = config.get_double("portfolio", "start_value")?.unwrap_or(defaults.start_value);
    let spread = config.get_double("portfolio", "spread")?.unwrap_or(defaults.spread);

    let period = get_offset(config, "portfolio", "rebalancing")?;
    let offset = get_offset(config, "portfolio", "rebalancing_offset")?;
    let rebalancing = match (period, offset) {
        (Some(period), offset) => Some(RebalanceSchedule::new(period, offset)?),
        (None, Some(_)) => {
            return Err(LotfolioError::ConfigInvalid {
                section: "portfolio".to_string(),
                key: "rebalancing_offset".to_string(),
                reason: "rebalancing_offset requires rebalancing".to_string(),
            });
        }
        (None, None) => None,
    };

    let settings = PortfolioSettings {
        start_value,
        rebalancing,
        spread,
    };
    settings.validate()?;
    Ok(settings)
}

fn parse_legs(config: &dyn ConfigPort) -> Result<Vec<LegConfig>, LotfolioError> {
    let names = config
        .get_list("portfolio", "legs")
        .ok_or_else(|| LotfolioError::ConfigMissing {
            section: "portfolio".to_string(),
            key: "legs".to_string(),
        })?;
    if names.is_empty() {
        return Err(LotfolioError::NoLegs);
    }

    names.iter().map(|name| parse_leg(config, name)).collect()
}

fn parse_leg(config: &dyn ConfigPort, name: &str) -> Result<LegConfig, LotfolioError> {
    let section = format!("leg.{name}");
    let weight = config.get_double(&section, "weight")?.ok_or_else(|| {
        LotfolioError::ConfigMissing {
            section: section.clone(),
            key: "weight".to_string(),
        }
    })?;
    let mut leg = LegConfig::new(name, weight);

    if let Some(window) = config.get_count(&section, "ma_window")? {
        let reference = config
            .get_string(&section, "ma_reference")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| name.to_string());
        leg = leg.with_moving_average(window, reference);
    } else if config.get_string(&section, "ma_reference").is_some() {
        return Err(LotfolioError::ConfigInvalid {
            section,
            key: "ma_reference".to_string(),
            reason: "ma_reference requires ma_window".to_string(),
        });
    }

    if let Some(class) = config.get_string(&section, "asset_class") {
        let parsed = AssetClass::parse(&class).ok_or_else(|| LotfolioError::ConfigInvalid {
            section: section.clone(),
            key: "asset_class".to_string(),
            reason: format!("unknown asset class '{}', expected equity or other", class.trim()),
        })?;
        leg = leg.with_asset_class(parsed);
    }

    Ok(leg)
}

fn parse_tax(config: &dyn ConfigPort, legs: &[LegConfig]) -> Result<TaxRegime, LotfolioError> {
    let model = config
        .get_string("tax", "model")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "none".to_string());

    match model.as_str() {
        "none" => Ok(TaxRegime::default()),
        "flat" => {
            let rate = config.get_double("tax", "rate")?.unwrap_or(DEFAULT_FLAT_RATE);
            if !(0.0..=100.0).contains(&rate) {
                return Err(LotfolioError::ConfigInvalid {
                    section: "tax".to_string(),
                    key: "rate".to_string(),
                    reason: "rate must be between 0 and 100".to_string(),
                });
            }
            let model = legs.iter().fold(FlatRateTaxModel::new(rate), |m, leg| {
                m.with_asset_class(leg.name.clone(), leg.asset_class)
            });
            Ok(TaxRegime::FlatRate(model))
        }
        other => Err(LotfolioError::ConfigInvalid {
            section: "tax".to_string(),
            key: "model".to_string(),
            reason: format!("unknown tax model '{other}', expected none or flat"),
        }),
    }
}

fn get_offset(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<CalendarOffset>, LotfolioError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<CalendarOffset>()
        .map(Some)
        .map_err(|reason| LotfolioError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::leg::Gating;
    use crate::domain::tax::TaxModel;
    use std::collections::HashMap;

    struct MockConfig {
        data: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let data = entries
                .iter()
                .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                .collect();
            MockConfig { data }
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.data
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }
    }

    fn two_leg() -> Vec<Entry> {
        vec![
            ("portfolio", "legs", "UPRO, TMF"),
            ("leg.UPRO", "weight", "55"),
            ("leg.TMF", "weight", "45"),
        ]
    }

    type Entry = (&'static str, &'static str, &'static str);

    fn with(mut base: Vec<Entry>, extra: &[Entry]) -> MockConfig {
        base.extend_from_slice(extra);
        MockConfig::new(&base)
    }

    #[test]
    fn non_numeric_weight_rejected() {
        let config = MockConfig::new(&[
            ("portfolio", "legs", "SPY"),
            ("leg.SPY", "weight", "lots"),
        ]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigInvalid { key, .. }) if key == "weight"
        ));
    }

    #[test]
    fn minimal_config_is_fixed_weight() {
        let plan = build_plan(&MockConfig::new(&two_leg())).unwrap();
        assert_eq!(plan.kind, PortfolioKind::FixedWeight);
        assert_eq!(plan.legs.len(), 2);
        assert_eq!(plan.legs[0].name, "UPRO");
        assert_eq!(plan.settings, PortfolioSettings::default());
        assert_eq!(plan.tax, TaxRegime::default());
        assert!(plan.cash_column.is_none());
    }

    #[test]
    fn rebalancing_and_offset_parsed() {
        let config = with(
            two_leg(),
            &[
                ("portfolio", "rebalancing", "3m"),
                ("portfolio", "rebalancing_offset", "-6d"),
            ],
        );
        let plan = build_plan(&config).unwrap();
        let schedule = plan.settings.rebalancing.unwrap();
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(schedule.first(start), chrono::NaiveDate::from_ymd_opt(2020, 3, 26));
    }

    #[test]
    fn offset_without_period_rejected() {
        let config = with(two_leg(), &[("portfolio", "rebalancing_offset", "-6d")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigInvalid { key, .. }) if key == "rebalancing_offset"
        ));
    }

    #[test]
    fn gated_leg_selects_signal_gated() {
        let config = with(
            two_leg(),
            &[
                ("leg.UPRO", "ma_window", "200"),
                ("leg.UPRO", "ma_reference", "SPY"),
            ],
        );
        let plan = build_plan(&config).unwrap();
        assert_eq!(plan.kind, PortfolioKind::SignalGated);
        assert_eq!(
            plan.legs[0].gating,
            Gating::MovingAverage {
                window: 200,
                reference: "SPY".to_string()
            }
        );
    }

    #[test]
    fn reference_defaults_to_leg() {
        let config = with(two_leg(), &[("leg.TMF", "ma_window", "50")]);
        let plan = build_plan(&config).unwrap();
        assert_eq!(plan.legs[1].reference(), "TMF");
    }

    #[test]
    fn spread_selects_signal_gated() {
        let config = with(two_leg(), &[("portfolio", "spread", "0.002")]);
        let plan = build_plan(&config).unwrap();
        assert_eq!(plan.kind, PortfolioKind::SignalGated);
        assert_eq!(plan.settings.spread, 0.002);
    }

    #[test]
    fn missing_legs_key() {
        let config = MockConfig::new(&[("portfolio", "start_value", "100")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigMissing { key, .. }) if key == "legs"
        ));
    }

    #[test]
    fn empty_leg_list() {
        let config = MockConfig::new(&[("portfolio", "legs", " , ")]);
        assert!(matches!(build_plan(&config), Err(LotfolioError::NoLegs)));
    }

    #[test]
    fn missing_weight() {
        let config = MockConfig::new(&[("portfolio", "legs", "SPY")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigMissing { section, .. }) if section == "leg.SPY"
        ));
    }

    #[test]
    fn duplicate_leg_rejected() {
        let config = MockConfig::new(&[
            ("portfolio", "legs", "SPY, SPY"),
            ("leg.SPY", "weight", "50"),
        ]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::DuplicateLeg { .. })
        ));
    }

    #[test]
    fn overallocation_rejected() {
        let config = MockConfig::new(&[
            ("portfolio", "legs", "A, B"),
            ("leg.A", "weight", "60"),
            ("leg.B", "weight", "50"),
        ]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::AllocationExceeded { .. })
        ));
    }

    #[test]
    fn non_numeric_values_rejected() {
        let config = with(two_leg(), &[("portfolio", "start_value", "lots")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigInvalid { key, .. }) if key == "start_value"
        ));

        let config = with(two_leg(), &[("leg.UPRO", "ma_window", "-3")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigInvalid { key, .. }) if key == "ma_window"
        ));
    }

    #[test]
    fn bad_interval_rejected() {
        let config = with(two_leg(), &[("portfolio", "rebalancing", "quarterly")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigInvalid { key, .. }) if key == "rebalancing"
        ));
    }

    #[test]
    fn flat_tax_with_asset_class() {
        let config = with(
            two_leg(),
            &[
                ("tax", "model", "flat"),
                ("leg.UPRO", "asset_class", "equity"),
            ],
        );
        let plan = build_plan(&config).unwrap();
        let TaxRegime::FlatRate(model) = &plan.tax else {
            panic!("expected flat-rate tax");
        };
        assert_eq!(model.rate(), DEFAULT_FLAT_RATE);
        assert_eq!(model.asset_class("UPRO"), AssetClass::EquityFund);
        assert_eq!(model.asset_class("TMF"), AssetClass::Other);

        let mut tax = plan.tax.clone();
        tax.add_gain("UPRO", 1000.0);
        assert!((tax.open_tax() - 1000.0 * 0.7 * 0.26375).abs() < 1e-9);
    }

    #[test]
    fn unknown_tax_model_rejected() {
        let config = with(two_leg(), &[("tax", "model", "progressive")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigInvalid { section, .. }) if section == "tax"
        ));
    }

    #[test]
    fn unknown_asset_class_rejected() {
        let config = with(two_leg(), &[("leg.TMF", "asset_class", "crypto")]);
        assert!(matches!(
            build_plan(&config),
            Err(LotfolioError::ConfigInvalid { key, .. }) if key == "asset_class"
        ));
    }

    #[test]
    fn cash_column_added_to_prices() {
        let config = MockConfig::new(&[
            ("portfolio", "legs", "SPY, cash"),
            ("portfolio", "cash_column", "cash"),
            ("leg.SPY", "weight", "60"),
            ("leg.cash", "weight", "40"),
        ]);
        let plan = build_plan(&config).unwrap();
        let dates = vec![
            chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
        ];
        let prices = PriceTable::new(dates, vec![("SPY".to_string(), vec![10.0, 20.0])]).unwrap();
        let prices = plan.prepare(prices);
        assert_eq!(prices.column("cash"), Some(&[100.0, 100.0][..]));

        let result = plan.backtest(&prices).unwrap();
        assert!((result.valuation.last().unwrap().sum - 16_000.0).abs() < 1e-9);
    }
}
