mod cmd;
mod coingecko;
mod config;
mod core;
mod sources;

use clap::{Parser, Subcommand};
use cmd::{income::IncomeCommand, prices::PricesCommand, schema::SchemaCommand};

#[derive(Parser, Debug)]
#[command(name = "stakc", version, about = "Staking reward income for a tax year")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Total staking rewards received in a year and their USD value
    Income(IncomeCommand),
    /// Fetch daily USD prices for a year and write them as CSV
    Prices(PricesCommand),
    /// Describe the accepted input files and the JSON report
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Income(income) => income.exec(),
        Command::Prices(prices) => prices.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
