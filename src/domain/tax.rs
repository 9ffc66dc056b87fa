//! Deferred capital-gains tax models.
//!
//! A tax model keeps a single liability bucket for the whole portfolio.
//! Portfolios report realized gains into it and settle it through forced
//! sales, reporting each settled amount back with [`TaxModel::pay_tax`].

use log::debug;
use std::collections::HashMap;

/// Flat capital-gains rate (percent), including the solidarity surcharge.
pub const DEFAULT_FLAT_RATE: f64 = 26.375;

/// Share of an equity-fund gain that remains taxable.
pub const EQUITY_FUND_TAXABLE_SHARE: f64 = 0.7;

/// Capability consumed by the portfolio engines.
pub trait TaxModel {
    /// Adds tax on a realized gain. Losses are ignored.
    fn add_gain(&mut self, instrument: &str, gain: f64);

    /// Reduces the liability by a settled amount.
    fn pay_tax(&mut self, instrument: &str, value: f64);

    /// Current outstanding liability.
    fn open_tax(&self) -> f64;

    /// Restores the liability from a checkpoint.
    fn restore(&mut self, open_tax: f64);
}

/// Tax treatment class of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssetClass {
    /// Equity fund with partial exemption of gains.
    EquityFund,
    #[default]
    Other,
}

impl AssetClass {
    pub fn taxable_share(self) -> f64 {
        match self {
            AssetClass::EquityFund => EQUITY_FUND_TAXABLE_SHARE,
            AssetClass::Other => 1.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "equity" | "equity_fund" => Some(AssetClass::EquityFund),
            "other" => Some(AssetClass::Other),
            _ => None,
        }
    }
}

/// Ignores all tax effects.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NullTaxModel;

impl TaxModel for NullTaxModel {
    fn add_gain(&mut self, _instrument: &str, _gain: f64) {}

    fn pay_tax(&mut self, _instrument: &str, _value: f64) {}

    fn open_tax(&self) -> f64 {
        0.0
    }

    fn restore(&mut self, _open_tax: f64) {}
}

/// Flat rate on every gain, with equity funds partially exempt.
///
/// No loss carry-forward, no holding-period rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRateTaxModel {
    rate: f64,
    asset_classes: HashMap<String, AssetClass>,
    bucket: f64,
}

impl FlatRateTaxModel {
    /// `rate` is in percent.
    pub fn new(rate: f64) -> Self {
        FlatRateTaxModel {
            rate,
            asset_classes: HashMap::new(),
            bucket: 0.0,
        }
    }

    pub fn with_asset_class(mut self, instrument: impl Into<String>, class: AssetClass) -> Self {
        self.asset_classes.insert(instrument.into(), class);
        self
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn asset_class(&self, instrument: &str) -> AssetClass {
        self.asset_classes
            .get(instrument)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for FlatRateTaxModel {
    fn default() -> Self {
        FlatRateTaxModel::new(DEFAULT_FLAT_RATE)
    }
}

impl TaxModel for FlatRateTaxModel {
    fn add_gain(&mut self, instrument: &str, gain: f64) {
        if gain <= 0.0 {
            return;
        }
        let taxable = gain * self.asset_class(instrument).taxable_share();
        self.bucket += taxable * self.rate / 100.0;
        debug!(
            "gain {:.2} on '{}', tax bucket now {:.2}",
            gain, instrument, self.bucket
        );
    }

    fn pay_tax(&mut self, instrument: &str, value: f64) {
        self.bucket -= value;
        debug!(
            "paid {:.2} tax from '{}', tax bucket now {:.2}",
            value, instrument, self.bucket
        );
    }

    fn open_tax(&self) -> f64 {
        self.bucket
    }

    fn restore(&mut self, open_tax: f64) {
        self.bucket = open_tax;
    }
}

/// The shipped tax models, selectable from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum TaxRegime {
    Untaxed(NullTaxModel),
    FlatRate(FlatRateTaxModel),
}

impl Default for TaxRegime {
    fn default() -> Self {
        TaxRegime::Untaxed(NullTaxModel)
    }
}

impl TaxModel for TaxRegime {
    fn add_gain(&mut self, instrument: &str, gain: f64) {
        match self {
            TaxRegime::Untaxed(m) => m.add_gain(instrument, gain),
            TaxRegime::FlatRate(m) => m.add_gain(instrument, gain),
        }
    }

    fn pay_tax(&mut self, instrument: &str, value: f64) {
        match self {
            TaxRegime::Untaxed(m) => m.pay_tax(instrument, value),
            TaxRegime::FlatRate(m) => m.pay_tax(instrument, value),
        }
    }

    fn open_tax(&self) -> f64 {
        match self {
            TaxRegime::Untaxed(m) => m.open_tax(),
            TaxRegime::FlatRate(m) => m.open_tax(),
        }
    }

    fn restore(&mut self, open_tax: f64) {
        match self {
            TaxRegime::Untaxed(m) => m.restore(open_tax),
            TaxRegime::FlatRate(m) => m.restore(open_tax),
        }
    }
}
