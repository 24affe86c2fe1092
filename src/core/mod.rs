pub mod clock;
pub mod error;
pub mod income;
pub mod price;
pub mod protocol;
pub mod reward;

// Flat public surface for domain types and functions.
pub use clock::{Clock, SystemClock};
pub use error::IncomeError;
pub use income::{calculate_staking_income, IncomeReport, MatchedReward, YearlyTotal};
pub use price::{DateRange, PricePoint, PriceSeries};
pub use protocol::Protocol;
pub use reward::{RewardEvent, RewardSource};
