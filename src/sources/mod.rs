pub mod pacing;
pub mod solana_rpc;
pub mod solscan;

pub use pacing::BatchPacer;
pub use solana_rpc::{
    FixedEpochSchedule, HttpTransport, LinearEpochSchedule, SolanaRpcRewards, SOLANA_MAINNET_RPC,
};
pub use solscan::SolscanCsv;
