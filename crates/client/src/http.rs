//! [`ChainReader`] over the ledger explorer's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, warn};

use auction_types::{AuctionId, OnChainAuction};

use crate::config::ClientConfig;
use crate::decode::{
    decode_auction, decode_bid_count, decode_block_height, decode_highest_bid, decode_mapping_body,
};
use crate::error::ChainError;
use crate::query::ChainReader;

pub const AUCTIONS_MAPPING: &str = "auctions";
pub const HIGHEST_BIDS_MAPPING: &str = "highest_bids";
pub const BID_COUNTS_MAPPING: &str = "bid_counts";

#[derive(Clone)]
pub struct HttpChainReader {
    api_url: String,
    network: String,
    program_id: String,
    retry_max: u32,
    client: reqwest::Client,
}

impl HttpChainReader {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ChainError> {
        cfg.validate()?;
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| ChainError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            api_url: cfg.api_url.clone(),
            network: cfg.network.clone(),
            program_id: cfg.program_id.clone(),
            retry_max: cfg.retry_max,
            client,
        })
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    fn join(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{}/{path}", self.network)
    }

    pub fn block_height_url(&self) -> String {
        self.join("block/height/latest")
    }

    pub fn mapping_url(&self, mapping: &str, key: &str) -> String {
        self.join(&format!(
            "program/{}/mapping/{mapping}/{key}",
            self.program_id
        ))
    }

    /// Mapping value as plaintext, `None` when the key is absent.
    pub async fn mapping_value(
        &self,
        mapping: &'static str,
        key: &str,
    ) -> Result<Option<String>, ChainError> {
        let url = self.mapping_url(mapping, key);
        match self.get_text_optional(mapping, &url).await? {
            Some(body) => Ok(decode_mapping_body(&body)?),
            None => Ok(None),
        }
    }

    /// Like [`ChainReader::auction_struct`], but a malformed struct is an error.
    pub async fn auction_struct_strict(
        &self,
        id: &AuctionId,
    ) -> Result<Option<OnChainAuction>, ChainError> {
        let Some(text) = self.mapping_value(AUCTIONS_MAPPING, &id.literal()).await? else {
            return Ok(None);
        };
        let auction = decode_auction(&text)?;
        debug!(auction_id = %id, status = ?auction.status, "auction decoded");
        Ok(Some(auction))
    }

    async fn get_text_optional(
        &self,
        op: &'static str,
        url: &str,
    ) -> Result<Option<String>, ChainError> {
        let attempts = self.retry_max.max(1);
        for attempt in 1..=attempts {
            debug!(operation = op, attempt, url = %url, "sending request");
            let resp = match self.client.get(url).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    warn!(operation = op, attempt, error = %err, "request error");
                    if attempt == attempts || !is_retryable(&err) {
                        return Err(map_reqwest_error(err));
                    }
                    backoff(op, attempt).await;
                    continue;
                }
            };
            if resp.status() == StatusCode::NOT_FOUND {
                debug!(operation = op, "not found");
                return Ok(None);
            }
            match Self::read_body(op, resp).await {
                Ok(body) => return Ok(Some(body)),
                Err(err) => {
                    let server_error =
                        matches!(err, ChainError::HttpStatus { status, .. } if status >= 500);
                    if attempt == attempts || !server_error {
                        return Err(err);
                    }
                    backoff(op, attempt).await;
                }
            }
        }
        Err(ChainError::Config(
            "retry loop exhausted unexpectedly".to_string(),
        ))
    }

    async fn read_body(op: &'static str, resp: reqwest::Response) -> Result<String, ChainError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ChainError::Network(format!("{e}")))?;
        if !status.is_success() {
            warn!(operation = op, status = status.as_u16(), body = %body, "non-success status");
            return Err(ChainError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn current_block_height(&self) -> Result<u32, ChainError> {
        let url = self.block_height_url();
        let body = self
            .get_text_optional("block_height", &url)
            .await?
            .ok_or_else(|| ChainError::HttpStatus {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: String::new(),
            })?;
        Ok(decode_block_height(&body)?)
    }

    async fn auction_struct(&self, id: &AuctionId) -> Result<Option<OnChainAuction>, ChainError> {
        match self.auction_struct_strict(id).await {
            Err(ChainError::Decode(err)) => {
                warn!(auction_id = %id, error = %err, "malformed auction struct, treating as absent");
                Ok(None)
            }
            other => other,
        }
    }

    async fn highest_bid(&self, id: &AuctionId) -> Result<u64, ChainError> {
        match self.mapping_value(HIGHEST_BIDS_MAPPING, &id.literal()).await? {
            Some(value) => Ok(decode_highest_bid(&value)?),
            None => Ok(0),
        }
    }

    async fn bid_count(&self, id: &AuctionId) -> Result<u32, ChainError> {
        match self.mapping_value(BID_COUNTS_MAPPING, &id.literal()).await? {
            Some(value) => Ok(decode_bid_count(&value)?),
            None => Ok(0),
        }
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn map_reqwest_error(err: reqwest::Error) -> ChainError {
    ChainError::Network(err.to_string())
}

async fn backoff(op: &str, attempt: u32) {
    let delay_ms = backoff_delay_ms(attempt);
    warn!(operation = op, attempt, delay_ms, "retrying after backoff");
    sleep(Duration::from_millis(delay_ms)).await;
}

/// Exponential, capped at 2s, no jitter.
fn backoff_delay_ms(attempt: u32) -> u64 {
    let exp = attempt.saturating_sub(1);
    100u64.saturating_mul(2u64.saturating_pow(exp)).min(2_000)
}
