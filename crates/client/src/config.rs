//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChainError;

pub const DEFAULT_API_URL: &str = "https://api.explorer.provable.com/v1";
pub const DEFAULT_NETWORK: &str = "testnet";
pub const DEFAULT_PROGRAM_ID: &str = "aloe_auction_v2.aleo";
pub const CREDITS_PROGRAM_ID: &str = "credits.aleo";

/// Average ledger block time.
pub const BLOCK_TIME_SECONDS: u64 = 10;

/// Configuration for the chain reader, pollers and local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the ledger explorer API
    pub api_url: String,
    /// Network path segment (`testnet`, `mainnet`)
    pub network: String,
    /// Auction program id
    pub program_id: String,
    /// System program used for shielding credits
    pub credits_program_id: String,
    /// Polling interval, matched to the ledger's block time
    pub block_time_secs: u64,
    pub request_timeout_ms: u64,
    /// Attempts per request for connect/timeout/5xx failures
    pub retry_max: u32,
    /// Directory holding the local sled database
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            credits_program_id: CREDITS_PROGRAM_ID.to_string(),
            block_time_secs: BLOCK_TIME_SECONDS,
            request_timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            retry_max: Self::DEFAULT_RETRY_MAX,
            data_dir: PathBuf::from("./auction-data"),
        }
    }
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_RETRY_MAX: u32 = 2;

    /// Defaults overridden by `AUCTION_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("AUCTION_API_URL").unwrap_or(defaults.api_url);
        let network = std::env::var("AUCTION_NETWORK").unwrap_or(defaults.network);
        let program_id = std::env::var("AUCTION_PROGRAM_ID").unwrap_or(defaults.program_id);
        let block_time_secs = std::env::var("AUCTION_BLOCK_TIME_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.block_time_secs);
        let request_timeout_ms = std::env::var("AUCTION_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.request_timeout_ms);
        let retry_max = std::env::var("AUCTION_RETRY_MAX")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.retry_max);
        let data_dir = std::env::var("AUCTION_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Self {
            api_url,
            network,
            program_id,
            credits_program_id: defaults.credits_program_id,
            block_time_secs,
            request_timeout_ms,
            retry_max,
            data_dir,
        }
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.api_url.trim().is_empty() {
            return Err(ChainError::Config("api_url is empty".to_string()));
        }
        if self.network.trim().is_empty() {
            return Err(ChainError::Config("network is empty".to_string()));
        }
        if !self.program_id.ends_with(".aleo") {
            return Err(ChainError::Config(format!(
                "program_id `{}` must end with .aleo",
                self.program_id
            )));
        }
        if self.block_time_secs == 0 {
            return Err(ChainError::Config("block_time_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.block_time_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
