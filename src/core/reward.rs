use super::IncomeError;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;

/// A single staking reward payment, in native units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEvent {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    /// Epoch the reward was paid for, when the source knows it
    pub epoch: Option<u64>,
}

impl RewardEvent {
    pub fn new(timestamp: DateTime<Utc>, amount: Decimal) -> Self {
        RewardEvent {
            timestamp,
            amount,
            epoch: None,
        }
    }

    /// Calendar year (UTC) the reward was received in
    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }
}

/// Anything that can produce the reward events for an address or export.
///
/// Events may be returned in any order and may include rewards from outside
/// the tax year being reported.
pub trait RewardSource {
    fn rewards(&mut self) -> Result<Vec<RewardEvent>, IncomeError>;
}
