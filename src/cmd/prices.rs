//! Prices command - save daily USD prices for later offline runs

use crate::coingecko::{self, CoinGeckoClient, COINGECKO_API_BASE};
use crate::core::{Protocol, SystemClock};
use clap::Args;
use std::io;

#[derive(Args, Debug)]
pub struct PricesCommand {
    /// Tax year (calendar year, UTC)
    #[arg(short, long)]
    year: i32,

    /// Staking protocol (e.g., solana)
    #[arg(short, long)]
    protocol: String,

    /// Base URL of the price API
    #[arg(long, default_value = COINGECKO_API_BASE)]
    price_api: String,
}

impl PricesCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let protocol: Protocol = self.protocol.parse()?;
        let range = coingecko::available_range(self.year, &SystemClock)?;
        let prices = CoinGeckoClient::new(&self.price_api).fetch_daily_prices(protocol, range)?;
        prices.write_csv(io::stdout())
    }
}
