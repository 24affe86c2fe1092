//! Schema command - print expected input and output formats

use crate::cmd::income::IncomeSummary;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// What to describe
    #[arg(value_enum, default_value = "rewards-csv")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// Columns read from a rewards CSV export
    RewardsCsv,
    /// Columns of a price file
    PricesCsv,
    /// JSON Schema of the `income --json` report
    JsonReport,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::RewardsCsv => print_fields("Rewards CSV (Solscan export)", REWARD_FIELDS),
            SchemaFormat::PricesCsv => print_fields("Price CSV", PRICE_FIELDS),
            SchemaFormat::JsonReport => {
                let schema = schema_for!(IncomeSummary);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
        }
        Ok(())
    }
}

fn print_fields(title: &str, fields: &[(&str, &str)]) {
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
    println!();
    for (name, description) in fields {
        println!("{:22}  {}", name, description);
    }
    println!();
    println!("Other columns are ignored.");
}

const REWARD_FIELDS: &[(&str, &str)] = &[
    (
        "Effective Time Unix",
        "When the reward was received: unix seconds, RFC 3339, or YYYY-MM-DD HH:MM:SS (UTC)",
    ),
    (
        "Rewad Type",
        "Only 'Staking' rows are counted (also read from 'Reward Type')",
    ),
    ("Reward Amount", "Reward in native units (e.g. SOL)"),
];

const PRICE_FIELDS: &[(&str, &str)] = &[
    ("date", "Calendar day, YYYY-MM-DD (price at 00:00 UTC)"),
    ("usd_price", "USD price of one native unit"),
];
