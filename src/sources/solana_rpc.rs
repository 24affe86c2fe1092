//! Staking rewards queried epoch by epoch from a Solana JSON-RPC node.
//!
//! The node reports rewards per epoch, not per instant, so the time each
//! reward was received comes from an [`EpochSchedule`] supplied by the caller.

use super::pacing::Pacer;
use crate::core::{IncomeError, Protocol, RewardEvent, RewardSource};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::ops::RangeInclusive;

pub const SOLANA_MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";

/// Extra epochs queried either side of the year, to absorb schedule estimate drift
const EPOCH_BUFFER: u64 = 14;

#[derive(Debug, thiserror::Error)]
pub enum RpcCallError {
    #[error("rate limited by node")]
    RateLimited,
    #[error("{0}")]
    Failed(String),
}

/// Sends a single JSON-RPC request and returns its `result`
pub trait RpcTransport {
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcCallError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 over HTTP
pub struct HttpTransport {
    agent: ureq::Agent,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("stakc/", env!("CARGO_PKG_VERSION")))
            .build();
        HttpTransport {
            agent,
            url: url.into(),
        }
    }
}

impl RpcTransport for HttpTransport {
    fn call(&self, method: &str, params: Value) -> Result<Value, RpcCallError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = match self.agent.post(&self.url).send_json(payload) {
            Ok(response) => response,
            Err(ureq::Error::Status(429, _)) => return Err(RpcCallError::RateLimited),
            Err(e) => return Err(RpcCallError::Failed(e.to_string())),
        };
        let body: RpcResponse = response
            .into_json()
            .map_err(|e| RpcCallError::Failed(format!("invalid response: {e}")))?;

        match body.error {
            Some(RpcErrorObject { code: 429, .. }) => Err(RpcCallError::RateLimited),
            Some(err) => Err(RpcCallError::Failed(format!(
                "{} (code {})",
                err.message, err.code
            ))),
            None => Ok(body.result),
        }
    }
}

/// Maps epoch numbers to wall clock time
pub trait EpochSchedule {
    /// When `epoch` started
    fn epoch_start(&self, epoch: u64) -> Result<DateTime<Utc>, IncomeError>;

    /// Epoch in progress at `at`, if the schedule covers it
    fn epoch_at(&self, at: DateTime<Utc>) -> Option<u64>;

    /// Epochs whose start time is known, or `None` when any epoch can be dated
    fn known_epochs(&self) -> Option<RangeInclusive<u64>> {
        None
    }
}

/// Estimates epoch times assuming every epoch lasts the same time.
///
/// Real epochs drift from this, so timestamps are approximate.
#[derive(Debug, Clone, Copy)]
pub struct LinearEpochSchedule {
    anchor_epoch: u64,
    anchor_start: i64,
    epoch_secs: i64,
}

impl LinearEpochSchedule {
    /// Mainnet epoch 100 began at 2020-10-21 04:22:21 UTC; epochs last ~2.5 days
    pub fn mainnet() -> Self {
        LinearEpochSchedule {
            anchor_epoch: 100,
            anchor_start: 1_603_254_141,
            epoch_secs: 216_000,
        }
    }
}

impl EpochSchedule for LinearEpochSchedule {
    fn epoch_start(&self, epoch: u64) -> Result<DateTime<Utc>, IncomeError> {
        let offset = epoch as i64 - self.anchor_epoch as i64;
        DateTime::from_timestamp(self.anchor_start + offset * self.epoch_secs, 0)
            .ok_or_else(|| IncomeError::Rpc(format!("epoch {epoch} is out of range")))
    }

    fn epoch_at(&self, at: DateTime<Utc>) -> Option<u64> {
        let epochs_since = (at.timestamp() - self.anchor_start).div_euclid(self.epoch_secs);
        u64::try_from(self.anchor_epoch as i64 + epochs_since).ok()
    }
}

/// Explicit table of epoch start times
#[derive(Debug, Clone, Default)]
pub struct FixedEpochSchedule {
    starts: BTreeMap<u64, DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct EpochStartRecord {
    epoch: u64,
    /// RFC 3339
    start: DateTime<Utc>,
}

impl FixedEpochSchedule {
    pub fn new(starts: impl IntoIterator<Item = (u64, DateTime<Utc>)>) -> Self {
        FixedEpochSchedule {
            starts: starts.into_iter().collect(),
        }
    }

    /// Read an `epoch,start` CSV of known epoch start times
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, IncomeError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let records = rdr
            .deserialize::<EpochStartRecord>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(IncomeError::from_csv)?;
        log::info!("Read start times of {} epochs", records.len());
        Ok(Self::new(records.into_iter().map(|r| (r.epoch, r.start))))
    }
}

impl EpochSchedule for FixedEpochSchedule {
    fn epoch_start(&self, epoch: u64) -> Result<DateTime<Utc>, IncomeError> {
        self.starts
            .get(&epoch)
            .copied()
            .ok_or_else(|| IncomeError::Rpc(format!("start time of epoch {epoch} is unknown")))
    }

    fn epoch_at(&self, at: DateTime<Utc>) -> Option<u64> {
        self.starts
            .iter()
            .take_while(|(_, start)| **start <= at)
            .last()
            .map(|(epoch, _)| *epoch)
    }

    fn known_epochs(&self) -> Option<RangeInclusive<u64>> {
        // empty when no epochs are known
        let first = self.starts.keys().next().copied().unwrap_or(1);
        let last = self.starts.keys().next_back().copied().unwrap_or(0);
        Some(first..=last)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpochInfo {
    epoch: u64,
}

#[derive(Debug, Deserialize)]
struct InflationReward {
    epoch: u64,
    /// lamports
    amount: u64,
}

fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_opt(23, 59, 59)?;
    Some((start.and_utc(), end.and_utc()))
}

/// Inflation rewards of a stake account, fetched from a node
pub struct SolanaRpcRewards<T, S, P> {
    transport: T,
    schedule: S,
    pacer: P,
    address: String,
    year: i32,
    max_retries: u32,
}

impl<T, S, P> SolanaRpcRewards<T, S, P>
where
    T: RpcTransport,
    S: EpochSchedule,
    P: Pacer,
{
    pub fn new(transport: T, schedule: S, pacer: P, address: impl Into<String>, year: i32) -> Self {
        SolanaRpcRewards {
            transport,
            schedule,
            pacer,
            address: address.into(),
            year,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn request(&mut self, method: &str, params: Value) -> Result<Value, IncomeError> {
        let mut attempt = 0;
        loop {
            self.pacer.before_request();
            match self.transport.call(method, params.clone()) {
                Ok(result) => return Ok(result),
                Err(RpcCallError::RateLimited) if attempt < self.max_retries => {
                    attempt += 1;
                    self.pacer.before_retry(attempt);
                }
                Err(e) => return Err(IncomeError::Rpc(format!("{method}: {e}"))),
            }
        }
    }

    fn current_epoch(&mut self) -> Result<u64, IncomeError> {
        let result = self.request("getEpochInfo", json!([]))?;
        let info: EpochInfo = serde_json::from_value(result)
            .map_err(|e| IncomeError::Rpc(format!("getEpochInfo: unexpected result: {e}")))?;
        log::info!("Current epoch: {}", info.epoch);
        Ok(info.epoch)
    }

    /// Completed epochs whose rewards may have been paid during the year.
    ///
    /// Fails when the schedule cannot date every reward that could fall in the year.
    fn epoch_range(&self, current_epoch: u64) -> Result<Option<RangeInclusive<u64>>, IncomeError> {
        let Some((year_start, year_end)) = year_bounds(self.year) else {
            return Ok(None);
        };
        // the current epoch has no rewards yet
        let Some(mut last) = current_epoch.checked_sub(1) else {
            return Ok(None);
        };
        let mut first = 0;

        if let Some(known) = self.schedule.known_epochs() {
            if known.is_empty() {
                return Err(IncomeError::Rpc("epoch schedule is empty".to_string()));
            }
            let (first_known, last_known) = (*known.start(), *known.end());
            let first_start = self.schedule.epoch_start(first_known)?;
            if first_known > 0 && first_start > year_start {
                return Err(IncomeError::Rpc(format!(
                    "epoch schedule starts at epoch {first_known} ({first_start}), after the start of {}",
                    self.year
                )));
            }
            let last_start = self.schedule.epoch_start(last_known)?;
            if last_known < current_epoch && last_start <= year_end {
                return Err(IncomeError::Rpc(format!(
                    "epoch schedule ends at epoch {last_known} ({last_start}), before the end of {}",
                    self.year
                )));
            }
            // a reward is dated by the start of the following epoch
            first = first_known.saturating_sub(1);
            let Some(last_datable) = last_known.checked_sub(1) else {
                return Ok(None);
            };
            last = last.min(last_datable);
        }

        let Some(last_in_year) = self.schedule.epoch_at(year_end) else {
            return Ok(None);
        };
        let first_in_year = self.schedule.epoch_at(year_start).unwrap_or(0);
        let start = first_in_year.saturating_sub(EPOCH_BUFFER).max(first);
        let end = (last_in_year + EPOCH_BUFFER).min(last);
        Ok((start <= end).then_some(start..=end))
    }

    fn epoch_rewards(&mut self, epoch: u64) -> Result<Option<InflationReward>, IncomeError> {
        let params = json!([[self.address], { "epoch": epoch }]);
        let result = self.request("getInflationReward", params)?;
        let rewards: Vec<Option<InflationReward>> = serde_json::from_value(result).map_err(|e| {
            IncomeError::Rpc(format!("getInflationReward: unexpected result for epoch {epoch}: {e}"))
        })?;
        // one entry per requested address
        rewards
            .into_iter()
            .next()
            .ok_or_else(|| IncomeError::Rpc(format!("no data returned for epoch {epoch}")))
    }
}

impl<T, S, P> RewardSource for SolanaRpcRewards<T, S, P>
where
    T: RpcTransport,
    S: EpochSchedule,
    P: Pacer,
{
    fn rewards(&mut self) -> Result<Vec<RewardEvent>, IncomeError> {
        let current_epoch = self.current_epoch()?;
        let Some(epochs) = self.epoch_range(current_epoch)? else {
            log::warn!("No completed epochs fall within {}", self.year);
            return Ok(Vec::new());
        };
        log::info!(
            "Fetching rewards for {} in epochs {}..={}",
            self.address,
            epochs.start(),
            epochs.end()
        );

        let lamports_per_sol = Protocol::Solana.base_units();
        let mut rewards = Vec::new();
        for epoch in epochs {
            let Some(reward) = self.epoch_rewards(epoch)? else {
                log::debug!("No reward for epoch {}", epoch);
                continue;
            };
            // rewards earned in an epoch are credited as the next one starts
            let timestamp = self.schedule.epoch_start(reward.epoch + 1)?;
            rewards.push(RewardEvent {
                timestamp,
                amount: Decimal::from(reward.amount) / lamports_per_sol,
                epoch: Some(reward.epoch),
            });
        }

        log::info!("Fetched {} rewards for {}", rewards.len(), self.address);
        Ok(rewards)
    }
}
