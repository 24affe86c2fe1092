use crate::core::{IncomeError, RewardEvent, RewardSource};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::str::FromStr;

// Solscan stake account reward export, e.g.
// Epoch,Effective Time Unix,Effective Time,Rewad Type,Reward Amount,Post Balance,Commission
// 612,1717200000,2024-06-01 00:00:00,Staking,0.0123,100.0123,7

/// Reward type of a staking payout (the export spells the column "Rewad Type")
const STAKING_REWARD_TYPE: &str = "Staking";

#[derive(Debug, Deserialize, Clone)]
struct Record {
    #[serde(rename = "Effective Time Unix")]
    effective_time: String,
    #[serde(rename = "Rewad Type", alias = "Reward Type")]
    reward_type: String,
    #[serde(rename = "Reward Amount")]
    amount: String,
}

impl Record {
    fn is_staking(&self) -> bool {
        self.reward_type.eq_ignore_ascii_case(STAKING_REWARD_TYPE)
    }

    fn into_reward(self, row: u64) -> Result<RewardEvent, IncomeError> {
        let parse_error = |message: String| IncomeError::Parse { row, message };
        let timestamp = parse_timestamp(&self.effective_time)
            .ok_or_else(|| parse_error(format!("invalid timestamp '{}'", self.effective_time)))?;
        let amount = Decimal::from_str(&self.amount)
            .map_err(|e| parse_error(format!("invalid amount '{}': {}", self.amount, e)))?;
        Ok(RewardEvent::new(timestamp, amount))
    }
}

/// Accepts unix seconds, RFC 3339, or `YYYY-MM-DD HH:MM:SS` in UTC
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Read staking rewards from a Solscan export, skipping other reward types
pub fn read_rewards<R: Read>(reader: R) -> Result<Vec<RewardEvent>, IncomeError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers().map_err(IncomeError::from_csv)?.clone();

    let mut rewards = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result.map_err(IncomeError::from_csv)?;
        let row = record.position().map_or(0, |pos| pos.line());
        let record: Record = record
            .deserialize(Some(&headers))
            .map_err(|e| IncomeError::Parse {
                row,
                message: e.to_string(),
            })?;
        if record.is_staking() {
            rewards.push(record.into_reward(row)?);
        } else {
            log::debug!("Skipping {} reward on row {}", record.reward_type, row);
            skipped += 1;
        }
    }

    log::info!(
        "Read {} staking rewards, skipped {} other rows",
        rewards.len(),
        skipped
    );
    Ok(rewards)
}

/// Reward events from a Solscan CSV export on disk
#[derive(Debug, Clone)]
pub struct SolscanCsv {
    path: PathBuf,
}

impl SolscanCsv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SolscanCsv { path: path.into() }
    }
}

impl RewardSource for SolscanCsv {
    fn rewards(&mut self) -> Result<Vec<RewardEvent>, IncomeError> {
        log::info!("Loading rewards from {}", self.path.display());
        let file = File::open(&self.path).map_err(|e| {
            io::Error::new(e.kind(), format!("{}: {}", self.path.display(), e))
        })?;
        read_rewards(io::BufReader::new(file))
    }
}
