use crate::core::Protocol;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a single income run needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub year: i32,
    pub protocol: Protocol,
    pub rewards: RewardSourceConfig,
    pub prices: PriceSourceConfig,
}

#[derive(Debug, Clone)]
pub enum RewardSourceConfig {
    /// Exported rewards CSV
    Csv { path: PathBuf },
    /// Query a node for the rewards of a stake account
    Rpc {
        url: String,
        address: String,
        /// `epoch,start` CSV of known epoch start times; estimated when absent
        epoch_schedule: Option<PathBuf>,
        pacing: PacingConfig,
    },
}

#[derive(Debug, Clone)]
pub enum PriceSourceConfig {
    /// Public price API
    Api { base_url: String },
    /// Previously saved price CSV
    File { path: PathBuf },
}

#[derive(Debug, Clone, Copy)]
pub struct PacingConfig {
    pub batch_size: usize,
    pub cooldown: Duration,
    pub max_retries: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            batch_size: 38,
            cooldown: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}
