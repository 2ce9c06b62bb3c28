//! Client error types.

use thiserror::Error;

use auction_crypto::CryptoError;
use auction_types::{AuctionId, BidSecret, EncodingError, TransactionId};

use crate::eligibility::Ineligible;

/// Ledger data that does not match the expected schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Expected a struct literal, got: {0}")]
    NotAStruct(String),

    #[error("Malformed struct entry: {0}")]
    MalformedEntry(String),

    #[error("Duplicate struct field `{0}`")]
    DuplicateField(String),

    #[error("Missing struct field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid value for `{field}`: {source}")]
    InvalidValue {
        field: &'static str,
        #[source]
        source: EncodingError,
    },

    #[error("Unknown auction status code {0}")]
    UnknownStatus(u8),

    #[error("Unexpected response body: {0}")]
    UnexpectedBody(String),
}

/// Failures talking to the remote ledger API.
///
/// "Not found" is never an error: readers return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("http status {status} body={body}")]
    HttpStatus { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Key-value backend failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Secret store failures.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Deposit {deposit} is below bid {bid}")]
    DepositBelowBid { bid: u64, deposit: u64 },

    #[error("Secret for auction {got} stored under key for auction {expected}")]
    AuctionMismatch { expected: AuctionId, got: AuctionId },

    #[error("No bid secret stored locally for auction {0}")]
    NotFound(AuctionId),
}

/// Invalid operation parameters.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Deposit {deposit} is below bid {bid}")]
    DepositBelowBid { bid: u64, deposit: u64 },

    #[error("Bid amount must be greater than zero")]
    ZeroBid,

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Minimum bid {min_bid} is below the floor of {floor} microcredits")]
    MinBidTooLow { min_bid: u64, floor: u64 },

    #[error("{0} must be at least one block")]
    ZeroDuration(&'static str),

    #[error(transparent)]
    Salt(#[from] CryptoError),
}

/// Wallet execution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The wallet or the ledger refused the transaction. The message is kept
    /// verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// Workflow errors surfaced by [`crate::engine::AuctionClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Another operation is already in flight for {0}")]
    Busy(String),

    #[error("Bid data not found locally for auction {0}; reveal and refund must be done from the client that placed the bid")]
    SecretNotFound(AuctionId),

    #[error("{0}")]
    Ineligible(Ineligible),

    #[error("Auction {0} not found on-chain; it may not be confirmed yet")]
    NotFound(AuctionId),

    #[error("Auction {0} is already in the local cache")]
    AlreadyImported(AuctionId),

    #[error("Auction {0} has no recorded highest bid; refusing to settle with zero")]
    NoHighestBid(AuctionId),

    #[error("Auction {0} has no known auctioneer")]
    MissingAuctioneer(AuctionId),

    #[error("Auction {auction_id} is not accepting bids ({phase})")]
    NotAcceptingBids {
        auction_id: AuctionId,
        phase: &'static str,
    },

    #[error("Bid {bid} is below the minimum of {min_bid}")]
    BelowMinimum { bid: u64, min_bid: u64 },

    #[error("A bid for auction {0} is already stored locally")]
    AlreadyBid(AuctionId),

    /// The bid left the client but its opening could not be written locally.
    /// `secret` is the only remaining copy.
    #[error("Bid was submitted in {tx} but its secret could not be stored: {source}")]
    SecretNotPersisted {
        tx: TransactionId,
        secret: Box<BidSecret>,
        #[source]
        source: SecretError,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

pub type ClientResult<T> = Result<T, ClientError>;
