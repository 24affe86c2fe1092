use chrono::{DateTime, NaiveDate, Utc};

/// Errors that abort a staking income run.
///
/// None of these are recovered from locally: a report must never be built
/// from substituted prices or rewards.
#[derive(Debug, thiserror::Error)]
pub enum IncomeError {
    #[error("failed to fetch prices: {0}")]
    Fetch(String),
    #[error(
        "price history before {earliest} is not available from the price API \
         (requested from {requested}); supply a saved price file with --prices"
    )]
    DataUnavailable {
        requested: NaiveDate,
        earliest: NaiveDate,
    },
    #[error("tax year {year} is not supported: {reason}")]
    UnsupportedYear { year: i32, reason: String },
    #[error("malformed row {row}: {message}")]
    Parse { row: u64, message: String },
    #[error("rpc request failed: {0}")]
    Rpc(String),
    #[error("no price available for reward at {timestamp}")]
    PriceUnavailable { timestamp: DateTime<Utc> },
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IncomeError {
    /// Build a parse error from a csv error, using the record position when known.
    pub(crate) fn from_csv(err: csv::Error) -> Self {
        let row = err.position().map_or(0, |pos| pos.line());
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => IncomeError::Io(io),
            _ => IncomeError::Parse { row, message },
        }
    }
}
