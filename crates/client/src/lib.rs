//! Client engine for commit-reveal sealed-bid auctions.
//!
//! This crate provides:
//! - Local persistence of bid secrets (amount, salt, deposit)
//! - Read access to auction state on the ledger
//! - Phase derivation from status codes and block-height deadlines
//! - Pre-flight eligibility checks for reveal, settlement and refunds
//! - Builders for every program call the auction lifecycle needs
//! - A local auction cache, block-time pollers and a workflow engine

pub mod builder;
pub mod cache;
pub mod config;
pub mod decode;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod format;
pub mod http;
pub mod inflight;
pub mod phase;
pub mod poller;
pub mod query;
pub mod secrets;
pub mod wallet;

pub use builder::{
    BidOpening, CreateAuctionParams, OperationBuilder, PlaceBidParams, SettleParams,
    ShieldCreditsParams,
};
pub use cache::AuctionCache;
pub use config::ClientConfig;
pub use eligibility::{
    check_refund_eligibility, check_reveal_eligibility, check_settle_eligibility,
    EligibilityResult, Ineligible,
};
pub use engine::AuctionClient;
pub use error::{
    BuildError, ChainError, ClientError, ClientResult, DecodeError, SecretError, StoreError,
    WalletError,
};
pub use http::HttpChainReader;
pub use inflight::{InFlight, InFlightToken};
pub use phase::{blocks_remaining, derive_phase};
pub use poller::{spawn_auction_poller, spawn_block_height_poller, spawn_poller, PollHandle};
pub use query::{ChainReader, MockChain};
pub use secrets::{KeyValueStore, MemoryStore, SecretStore, SledStore};
pub use wallet::{MockWallet, WalletExecutor};
