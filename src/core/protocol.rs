use super::IncomeError;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Staking protocol (asset) an income report is computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Solana,
}

impl Protocol {
    /// Coin id used by the CoinGecko API
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            Protocol::Solana => "solana",
        }
    }

    /// Ticker of the native unit
    pub fn symbol(&self) -> &'static str {
        match self {
            Protocol::Solana => "SOL",
        }
    }

    /// Number of base units (e.g. lamports) in one native unit
    pub fn base_units(&self) -> Decimal {
        match self {
            Protocol::Solana => Decimal::from(1_000_000_000u64),
        }
    }
}

impl FromStr for Protocol {
    type Err = IncomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solana" | "sol" => Ok(Protocol::Solana),
            _ => Err(IncomeError::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Solana => write!(f, "solana"),
        }
    }
}
