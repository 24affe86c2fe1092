//! Income command - staking reward income for a tax year, valued in USD

use crate::coingecko::{self, CoinGeckoClient, COINGECKO_API_BASE};
use crate::config::{PacingConfig, PriceSourceConfig, RewardSourceConfig, RunConfig};
use crate::core::{
    calculate_staking_income, Clock, IncomeReport, PriceSeries, Protocol, RewardSource,
    SystemClock,
};
use crate::sources::{
    BatchPacer, FixedEpochSchedule, HttpTransport, LinearEpochSchedule, SolanaRpcRewards, SolscanCsv,
    SOLANA_MAINNET_RPC,
};
use anyhow::Context;
use clap::Args;
use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct IncomeCommand {
    /// Tax year (calendar year, UTC)
    #[arg(short, long)]
    year: i32,

    /// Staking protocol (e.g., solana)
    #[arg(short, long)]
    protocol: String,

    /// CSV export of staking rewards
    #[arg(short, long, required_unless_present = "address", conflicts_with = "address")]
    reward_file: Option<PathBuf>,

    /// Stake account address to query rewards for over RPC
    #[arg(short, long)]
    address: Option<String>,

    /// RPC node used with --address
    #[arg(long, default_value = SOLANA_MAINNET_RPC)]
    rpc_url: String,

    /// CSV of epoch start times (epoch,start) used to date RPC rewards
    #[arg(long, requires = "address")]
    epoch_schedule: Option<PathBuf>,

    /// Requests sent to the RPC node before pausing
    #[arg(long, default_value_t = PacingConfig::default().batch_size)]
    batch_size: usize,

    /// Pause between batches of RPC requests, in seconds
    #[arg(long, default_value_t = PacingConfig::default().cooldown.as_secs())]
    cooldown_secs: u64,

    /// Retries of a rate limited RPC request
    #[arg(long, default_value_t = PacingConfig::default().max_retries)]
    max_retries: u32,

    /// CSV file of daily USD prices (date,usd_price) to use instead of the price API
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Base URL of the price API
    #[arg(long, default_value = COINGECKO_API_BASE)]
    price_api: String,

    /// List every reward with its matched price
    #[arg(long)]
    details: bool,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// Income data for JSON output
#[derive(Debug, Serialize, JsonSchema)]
pub struct IncomeSummary {
    /// Tax year (calendar year, UTC)
    pub year: i32,
    pub protocol: String,
    /// Ticker of the native unit
    pub symbol: String,
    /// Rewards received in the year
    pub reward_count: usize,
    /// Total rewards in native units
    pub total_native: String,
    /// Total USD value at time of receipt, to 2 decimal places
    pub total_usd: String,
}

/// Row for the rewards table output
#[derive(Debug, Clone, Tabled)]
struct RewardRow {
    #[tabled(rename = "Received (UTC)")]
    received: String,
    #[tabled(rename = "Epoch")]
    epoch: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Price Date")]
    price_date: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl IncomeCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = self.run_config()?;
        log::info!(
            "Calculating {} staking income for {}",
            config.protocol,
            config.year
        );
        let report = run(&config, &SystemClock)?;

        if self.json {
            print_json(&config, &report)
        } else {
            if self.details {
                print_rewards(&config, &report);
            }
            print_summary(&config, &report);
            Ok(())
        }
    }

    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let protocol: Protocol = self.protocol.parse()?;

        let rewards = match (&self.reward_file, &self.address) {
            (Some(path), _) => RewardSourceConfig::Csv { path: path.clone() },
            (None, Some(address)) => RewardSourceConfig::Rpc {
                url: self.rpc_url.clone(),
                address: address.clone(),
                epoch_schedule: self.epoch_schedule.clone(),
                pacing: PacingConfig {
                    batch_size: self.batch_size,
                    cooldown: Duration::from_secs(self.cooldown_secs),
                    max_retries: self.max_retries,
                },
            },
            (None, None) => anyhow::bail!("Either --address or --reward-file must be provided"),
        };

        let prices = match &self.prices {
            Some(path) => PriceSourceConfig::File { path: path.clone() },
            None => PriceSourceConfig::Api {
                base_url: self.price_api.clone(),
            },
        };

        Ok(RunConfig {
            year: self.year,
            protocol,
            rewards,
            prices,
        })
    }
}

/// Load prices and rewards for the configured year and total them
pub fn run(config: &RunConfig, clock: &impl Clock) -> anyhow::Result<IncomeReport> {
    let prices = load_prices(config, clock)?;
    let mut source = reward_source(config)?;
    let rewards = source.rewards().context("Failed to load staking rewards")?;
    log::info!("Loaded {} rewards", rewards.len());

    let report = calculate_staking_income(rewards, &prices, config.year)?;
    Ok(report)
}

fn load_prices(config: &RunConfig, clock: &impl Clock) -> anyhow::Result<PriceSeries> {
    match &config.prices {
        PriceSourceConfig::File { path } => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open price file {}", path.display()))?;
            let prices = PriceSeries::read_csv(file)
                .with_context(|| format!("Failed to read price file {}", path.display()))?;
            Ok(prices)
        }
        PriceSourceConfig::Api { base_url } => {
            let range = coingecko::available_range(config.year, clock)?;
            log::info!(
                "Fetching USD prices for {} from {} to {}",
                config.protocol,
                range.start,
                range.end
            );
            let prices = CoinGeckoClient::new(base_url).fetch_daily_prices(config.protocol, range)?;
            Ok(prices)
        }
    }
}

fn reward_source(config: &RunConfig) -> anyhow::Result<Box<dyn RewardSource>> {
    let (url, address, epoch_schedule, pacing) = match &config.rewards {
        RewardSourceConfig::Csv { path } => return Ok(Box::new(SolscanCsv::new(path))),
        RewardSourceConfig::Rpc {
            url,
            address,
            epoch_schedule,
            pacing,
        } => (url, address, epoch_schedule, pacing),
    };
    let transport = HttpTransport::new(url);
    let pacer = BatchPacer::new(pacing.batch_size, pacing.cooldown);

    match epoch_schedule {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open epoch schedule {}", path.display()))?;
            let schedule = FixedEpochSchedule::read_csv(file)
                .with_context(|| format!("Failed to read epoch schedule {}", path.display()))?;
            Ok(Box::new(
                SolanaRpcRewards::new(transport, schedule, pacer, address, config.year)
                    .with_max_retries(pacing.max_retries),
            ))
        }
        None => {
            log::warn!("Reward times are estimated from epoch numbers and may be off by days");
            Ok(Box::new(
                SolanaRpcRewards::new(
                    transport,
                    LinearEpochSchedule::mainnet(),
                    pacer,
                    address,
                    config.year,
                )
                .with_max_retries(pacing.max_retries),
            ))
        }
    }
}

fn summary(config: &RunConfig, report: &IncomeReport) -> IncomeSummary {
    IncomeSummary {
        year: report.total.year,
        protocol: config.protocol.to_string(),
        symbol: config.protocol.symbol().to_string(),
        reward_count: report.rewards.len(),
        total_native: report.total.total_native.normalize().to_string(),
        total_usd: format!("{:.2}", cents(report.total.total_usd)),
    }
}

fn print_summary(config: &RunConfig, report: &IncomeReport) {
    let summary = summary(config, report);
    println!();
    println!(
        "STAKING INCOME ({}, {})",
        summary.year,
        summary.protocol.to_uppercase()
    );
    println!("  Rewards: {}", summary.reward_count);
    println!("  Total {}: {}", summary.symbol, summary.total_native);
    println!("  Total USD: {}", format_usd(report.total.total_usd));
    println!();
}

fn print_json(config: &RunConfig, report: &IncomeReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&summary(config, report))?);
    Ok(())
}

fn print_rewards(config: &RunConfig, report: &IncomeReport) {
    if report.rewards.is_empty() {
        println!("No rewards received in {}", config.year);
        return;
    }

    let mut rewards: Vec<_> = report.rewards.iter().collect();
    rewards.sort_by_key(|r| r.event.timestamp);
    let rows = rewards.into_iter().map(|reward| RewardRow {
        received: reward.event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        epoch: reward
            .event
            .epoch
            .map_or_else(|| "-".to_string(), |e| e.to_string()),
        amount: format!("{} {}", reward.event.amount.normalize(), config.protocol.symbol()),
        price_date: reward.price.date.to_string(),
        price: format_usd(reward.price.usd_price),
        value: format_usd(reward.value_usd()),
    });

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

/// Round to cents, halves away from zero
fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn format_usd(amount: Decimal) -> String {
    format!("${:.2}", cents(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::IncomeError;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("stakc-{}-{}", std::process::id(), name));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn csv_config(year: i32, rewards: PathBuf, prices: PriceSourceConfig) -> RunConfig {
        RunConfig {
            year,
            protocol: Protocol::Solana,
            rewards: RewardSourceConfig::Csv { path: rewards },
            prices,
        }
    }

    #[test]
    fn transfer_rows_excluded_from_totals() {
        let rewards = write_temp(
            "transfer-rewards.csv",
            "Effective Time Unix,Rewad Type,Reward Amount\n\
             2024-06-01T00:00:00Z,Staking,1.5\n\
             2024-06-01T00:00:00Z,Transfer,2.0\n",
        );
        let prices = write_temp("transfer-prices.csv", "date,usd_price\n2024-06-01,150.00\n");
        let config = csv_config(2024, rewards, PriceSourceConfig::File { path: prices });
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

        let report = run(&config, &clock).unwrap();
        assert_eq!(report.total.total_native, dec!(1.5));
        assert_eq!(report.total.total_usd, dec!(225.00));

        let summary = summary(&config, &report);
        assert_eq!(summary.total_native, "1.5");
        assert_eq!(summary.total_usd, "225.00");
    }

    #[test]
    fn api_prices_for_old_year_are_unavailable() {
        let rewards = write_temp(
            "old-rewards.csv",
            "Effective Time Unix,Rewad Type,Reward Amount\n1704067200,Staking,1\n",
        );
        // never contacted: the retention check fails first
        let prices = PriceSourceConfig::Api {
            base_url: "http://127.0.0.1:9".to_string(),
        };
        let config = csv_config(2024, rewards, prices);
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());

        let err = run(&config, &clock).unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<IncomeError>(),
                Some(IncomeError::DataUnavailable { .. })
            ),
            "{err:?}"
        );
    }

    #[test]
    fn usd_formatted_to_cents() {
        assert_eq!(format_usd(dec!(225)), "$225.00");
        assert_eq!(format_usd(dec!(0.125)), "$0.13");
    }
}
