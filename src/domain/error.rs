//! Domain error types.
//!
//! Only recoverable conditions live here. Ledger oversells and a tax
//! settlement that does not converge are invariant violations and panic.

/// Top-level error type for lotfolio.
#[derive(Debug, thiserror::Error)]
pub enum LotfolioError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("duplicate leg '{name}' in portfolio")]
    DuplicateLeg { name: String },

    #[error("portfolio allocation of {total}% exceeds 100%")]
    AllocationExceeded { total: f64 },

    #[error("portfolio needs at least one leg")]
    NoLegs,

    #[error("instrument '{name}' does not exist in the price table")]
    MissingInstrument { name: String },

    #[error("invalid price for '{name}' on {date}: {price}")]
    InvalidPrice {
        name: String,
        date: chrono::NaiveDate,
        price: f64,
    },

    #[error("price table error: {reason}")]
    PriceTable { reason: String },

    #[error("snapshot does not match portfolio: {reason}")]
    SnapshotMismatch { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LotfolioError {
    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            LotfolioError::Io(_) => 1,
            LotfolioError::ConfigParse { .. }
            | LotfolioError::ConfigMissing { .. }
            | LotfolioError::ConfigInvalid { .. }
            | LotfolioError::DuplicateLeg { .. }
            | LotfolioError::AllocationExceeded { .. }
            | LotfolioError::NoLegs => 2,
            LotfolioError::MissingInstrument { .. }
            | LotfolioError::InvalidPrice { .. }
            | LotfolioError::PriceTable { .. } => 3,
            LotfolioError::SnapshotMismatch { .. } => 4,
        }
    }
}

impl From<&LotfolioError> for std::process::ExitCode {
    fn from(err: &LotfolioError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
