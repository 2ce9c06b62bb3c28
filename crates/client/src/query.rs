//! Read access to authoritative auction state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use auction_types::{Address, AuctionId, AuctionStatus, OnChainAuction};

use crate::error::ChainError;

/// Query interface for auction data held by the ledger.
///
/// Absence is `Ok(None)` (or zero for the counters); transport and decode
/// failures are `Err`. Callers decide whether a failure is fatal.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Latest block height.
    async fn current_block_height(&self) -> Result<u32, ChainError>;

    /// Auction struct by id; `None` if unknown or not yet confirmed.
    async fn auction_struct(&self, id: &AuctionId) -> Result<Option<OnChainAuction>, ChainError>;

    /// Highest committed bid, 0 if none recorded.
    async fn highest_bid(&self, id: &AuctionId) -> Result<u64, ChainError>;

    /// Number of bids placed, 0 if none recorded.
    async fn bid_count(&self, id: &AuctionId) -> Result<u32, ChainError>;
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for std::sync::Arc<T> {
    async fn current_block_height(&self) -> Result<u32, ChainError> {
        (**self).current_block_height().await
    }

    async fn auction_struct(&self, id: &AuctionId) -> Result<Option<OnChainAuction>, ChainError> {
        (**self).auction_struct(id).await
    }

    async fn highest_bid(&self, id: &AuctionId) -> Result<u64, ChainError> {
        (**self).highest_bid(id).await
    }

    async fn bid_count(&self, id: &AuctionId) -> Result<u32, ChainError> {
        (**self).bid_count(id).await
    }
}

#[derive(Default)]
struct MockState {
    block_height: u32,
    auctions: HashMap<AuctionId, OnChainAuction>,
    highest_bids: HashMap<AuctionId, u64>,
    bid_counts: HashMap<AuctionId, u32>,
    fail_all: bool,
    fail_highest_bid: bool,
}

/// In-memory ledger for tests.
#[derive(Default)]
pub struct MockChain {
    state: RwLock<MockState>,
    reads: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_height(block_height: u32) -> Self {
        let chain = Self::new();
        chain.set_height(block_height);
        chain
    }

    pub fn set_height(&self, block_height: u32) {
        self.state.write().block_height = block_height;
    }

    /// Advance the chain by `blocks` blocks.
    pub fn advance(&self, blocks: u32) {
        let mut state = self.state.write();
        state.block_height = state.block_height.saturating_add(blocks);
    }

    pub fn insert_auction(&self, id: AuctionId, auction: OnChainAuction) {
        self.state.write().auctions.insert(id, auction);
    }

    /// Register an active auction with the given deadlines.
    pub fn open_auction(
        &self,
        id: AuctionId,
        auctioneer: Option<Address>,
        commit_deadline: u32,
        reveal_deadline: u32,
    ) {
        self.insert_auction(
            id,
            OnChainAuction {
                auctioneer,
                item_id: None,
                min_bid: Some(1_000),
                commit_deadline,
                reveal_deadline,
                status: AuctionStatus::Active,
                winner: None,
                winning_bid: None,
            },
        );
    }

    pub fn set_status(&self, id: &AuctionId, status: AuctionStatus) {
        if let Some(auction) = self.state.write().auctions.get_mut(id) {
            auction.status = status;
        }
    }

    /// Record a settlement as the program would.
    pub fn settle(&self, id: &AuctionId, winner: Option<Address>, winning_bid: u64) {
        if let Some(auction) = self.state.write().auctions.get_mut(id) {
            auction.status = AuctionStatus::Ended;
            auction.winner = winner;
            auction.winning_bid = Some(winning_bid);
        }
    }

    pub fn set_highest_bid(&self, id: AuctionId, amount: u64) {
        self.state.write().highest_bids.insert(id, amount);
    }

    pub fn set_bid_count(&self, id: AuctionId, count: u32) {
        self.state.write().bid_counts.insert(id, count);
    }

    /// Make every read fail with a network error.
    pub fn fail_reads(&self, fail: bool) {
        self.state.write().fail_all = fail;
    }

    /// Make only `highest_bid` fail.
    pub fn fail_highest_bid(&self, fail: bool) {
        self.state.write().fail_highest_bid = fail;
    }

    /// Total reads served (including failed ones).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn begin_read(&self) -> Result<(), ChainError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.state.read().fail_all {
            return Err(ChainError::Network("mock chain unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn current_block_height(&self) -> Result<u32, ChainError> {
        self.begin_read()?;
        Ok(self.state.read().block_height)
    }

    async fn auction_struct(&self, id: &AuctionId) -> Result<Option<OnChainAuction>, ChainError> {
        self.begin_read()?;
        Ok(self.state.read().auctions.get(id).cloned())
    }

    async fn highest_bid(&self, id: &AuctionId) -> Result<u64, ChainError> {
        self.begin_read()?;
        let state = self.state.read();
        if state.fail_highest_bid {
            return Err(ChainError::Network("highest_bids unavailable".to_string()));
        }
        Ok(state.highest_bids.get(id).copied().unwrap_or(0))
    }

    async fn bid_count(&self, id: &AuctionId) -> Result<u32, ChainError> {
        self.begin_read()?;
        Ok(self.state.read().bid_counts.get(id).copied().unwrap_or(0))
    }
}
