//! Local auction cache.
//!
//! An injectable, cloneable view of the auctions this client knows about.
//! Entries are hints for listing and display; phase decisions always go back
//! to the chain.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use auction_types::{Address, AuctionId, AuctionRecord, AuctionStatus, OnChainAuction, Phase};

use crate::error::StoreError;
use crate::phase::derive_phase;
use crate::secrets::KeyValueStore;

/// Store key of the serialized cache.
pub const CACHE_KEY: &str = "auctions";

#[derive(Debug, Clone, Default)]
pub struct AuctionCache {
    // Newest first
    records: Arc<RwLock<Vec<AuctionRecord>>>,
}

impl AuctionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front. Returns `false` if the id is already cached.
    pub fn add(&self, record: AuctionRecord) -> bool {
        let mut records = self.records.write();
        if records.iter().any(|r| r.id == record.id) {
            return false;
        }
        debug!(auction_id = %record.id, imported = record.imported, "cached auction");
        records.insert(0, record);
        true
    }

    /// Apply `f` to the cached record. Returns `false` if not cached.
    pub fn update(&self, id: &AuctionId, f: impl FnOnce(&mut AuctionRecord)) -> bool {
        match self.records.write().iter_mut().find(|r| &r.id == id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &AuctionId) -> Option<AuctionRecord> {
        let mut records = self.records.write();
        let index = records.iter().position(|r| &r.id == id)?;
        Some(records.remove(index))
    }

    pub fn get(&self, id: &AuctionId) -> Option<AuctionRecord> {
        self.records.read().iter().find(|r| &r.id == id).cloned()
    }

    pub fn contains(&self, id: &AuctionId) -> bool {
        self.records.read().iter().any(|r| &r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn list(&self) -> Vec<AuctionRecord> {
        self.records.read().clone()
    }

    pub fn by_status(&self, status: AuctionStatus) -> Vec<AuctionRecord> {
        self.filter(|r| r.status == status)
    }

    pub fn by_creator(&self, creator: &Address) -> Vec<AuctionRecord> {
        self.filter(|r| r.auctioneer.as_ref() == Some(creator))
    }

    /// Auctions still taking bids or reveals at `current_block`, judged from
    /// cached deadlines.
    pub fn active(&self, current_block: u32) -> Vec<AuctionRecord> {
        self.filter(|r| {
            matches!(
                cached_phase(r, Some(current_block)),
                Phase::Commit | Phase::Reveal
            )
        })
    }

    fn filter(&self, keep: impl Fn(&AuctionRecord) -> bool) -> Vec<AuctionRecord> {
        self.records.read().iter().filter(|r| keep(r)).cloned().collect()
    }

    /// Overwrite chain-derived fields with authoritative data.
    pub fn reconcile(&self, id: &AuctionId, on_chain: &OnChainAuction, bid_count: u32) -> bool {
        self.update(id, |record| {
            record.status = on_chain.status;
            record.commit_deadline = Some(on_chain.commit_deadline);
            record.reveal_deadline = Some(on_chain.reveal_deadline);
            record.winner = on_chain.winner.clone();
            record.winning_bid = on_chain.winning_bid;
            record.bid_count = bid_count;
            if let Some(auctioneer) = &on_chain.auctioneer {
                record.auctioneer = Some(auctioneer.clone());
            }
            if let Some(min_bid) = on_chain.min_bid {
                record.min_bid = min_bid;
            }
        })
    }

    /// Count a bid placed from this client.
    pub fn record_bid(&self, id: &AuctionId) -> bool {
        self.update(id, |record| record.bid_count = record.bid_count.saturating_add(1))
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&*self.records.read())?;
        store.set(CACHE_KEY, &bytes)
    }

    /// Load a saved cache; an empty cache if nothing was saved.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let records = match store.get(CACHE_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        Ok(Self {
            records: Arc::new(RwLock::new(records)),
        })
    }
}

/// Phase from cached fields only. Display hint, never used to gate actions.
pub fn cached_phase(record: &AuctionRecord, current_block: Option<u32>) -> Phase {
    derive_phase(
        Some(record.status),
        current_block,
        record.commit_deadline,
        record.reveal_deadline,
    )
}
