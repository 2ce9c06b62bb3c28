//! Local persistence of bid secrets.
//!
//! A bid's amount, salt and deposit exist only on the client that placed it.
//! They are written after the wallet accepted the `place_bid` transaction and
//! are required again to reveal and to claim a refund. Losing the store (a
//! wiped data directory, a different machine) makes pending reveals and
//! refunds impossible from this client; there is no recovery path.
//!
//! Operations are key-level atomic only. The engine guarantees that at most
//! one operation per auction is in flight, so no further locking is done here.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use auction_types::{AuctionId, BidSecret, FieldElement};

use crate::error::{SecretError, StoreError};

/// Key prefix for bid secrets: `bid_<auction id digits>`.
pub const SECRET_KEY_PREFIX: &str = "bid_";

/// Minimal durable key-value interface.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).keys_with_prefix(prefix)
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry, as a user clearing local data would.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// sled-backed durable store. Every write is flushed before returning.
#[derive(Debug, Clone)]
pub struct SledStore {
    tree: sled::Tree,
}

impl SledStore {
    pub const TREE: &'static str = "auction_client";

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let tree = db.open_tree(Self::TREE)?;
        Ok(Self { tree })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.tree.insert(key.as_bytes(), value)?;
        self.tree.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.tree.remove(key.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.tree
            .scan_prefix(prefix.as_bytes())
            .keys()
            .map(|k| {
                k.map(|k| String::from_utf8_lossy(&k).into_owned())
                    .map_err(StoreError::from)
            })
            .collect()
    }
}

/// On-disk shape. `deposit` is absent in records written before deposits
/// could differ from the bid; those decode with `deposit = bid_amount`.
#[derive(Serialize, Deserialize)]
struct StoredSecret {
    auction_id: AuctionId,
    bid_amount: u64,
    salt: FieldElement,
    #[serde(default)]
    deposit: Option<u64>,
    #[serde(default)]
    revealed: bool,
    #[serde(default)]
    timestamp: u64,
}

impl From<&BidSecret> for StoredSecret {
    fn from(secret: &BidSecret) -> Self {
        Self {
            auction_id: secret.auction_id.clone(),
            bid_amount: secret.bid_amount,
            salt: secret.salt.clone(),
            deposit: Some(secret.deposit),
            revealed: secret.revealed,
            timestamp: secret.timestamp,
        }
    }
}

impl From<StoredSecret> for BidSecret {
    fn from(stored: StoredSecret) -> Self {
        Self {
            deposit: stored.deposit.unwrap_or(stored.bid_amount),
            auction_id: stored.auction_id,
            bid_amount: stored.bid_amount,
            salt: stored.salt,
            revealed: stored.revealed,
            timestamp: stored.timestamp,
        }
    }
}

/// Bid secrets keyed by auction id.
#[derive(Debug, Clone)]
pub struct SecretStore<S> {
    store: S,
}

impl<S: KeyValueStore> SecretStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn key(auction_id: &AuctionId) -> String {
        format!("{SECRET_KEY_PREFIX}{}", auction_id.digits())
    }

    /// Store (or overwrite) the secret for an auction.
    pub fn put(&self, auction_id: &AuctionId, secret: &BidSecret) -> Result<(), SecretError> {
        if &secret.auction_id != auction_id {
            return Err(SecretError::AuctionMismatch {
                expected: auction_id.clone(),
                got: secret.auction_id.clone(),
            });
        }
        if !secret.is_consistent() {
            return Err(SecretError::DepositBelowBid {
                bid: secret.bid_amount,
                deposit: secret.deposit,
            });
        }

        let bytes = serde_json::to_vec(&StoredSecret::from(secret)).map_err(StoreError::from)?;
        self.store.set(&Self::key(auction_id), &bytes)?;
        debug!(auction_id = %auction_id, revealed = secret.revealed, "stored bid secret");
        Ok(())
    }

    pub fn get(&self, auction_id: &AuctionId) -> Result<Option<BidSecret>, SecretError> {
        let Some(bytes) = self.store.get(&Self::key(auction_id))? else {
            return Ok(None);
        };
        let stored: StoredSecret = serde_json::from_slice(&bytes).map_err(StoreError::from)?;
        let secret = BidSecret::from(stored);
        if !secret.is_consistent() {
            return Err(SecretError::DepositBelowBid {
                bid: secret.bid_amount,
                deposit: secret.deposit,
            });
        }
        Ok(Some(secret))
    }

    /// Remove the secret. Removing a missing secret is a no-op.
    pub fn delete(&self, auction_id: &AuctionId) -> Result<(), SecretError> {
        self.store.remove(&Self::key(auction_id))?;
        debug!(auction_id = %auction_id, "deleted bid secret");
        Ok(())
    }

    /// Flag the secret as revealed and return the updated record.
    pub fn mark_revealed(&self, auction_id: &AuctionId) -> Result<BidSecret, SecretError> {
        let mut secret = self
            .get(auction_id)?
            .ok_or_else(|| SecretError::NotFound(auction_id.clone()))?;
        if !secret.revealed {
            secret.revealed = true;
            self.put(auction_id, &secret)?;
        }
        Ok(secret)
    }

    /// Auctions this client holds a secret for.
    pub fn auction_ids(&self) -> Result<Vec<AuctionId>, SecretError> {
        Ok(self
            .store
            .keys_with_prefix(SECRET_KEY_PREFIX)?
            .iter()
            .filter_map(|k| k.strip_prefix(SECRET_KEY_PREFIX))
            .filter_map(|digits| AuctionId::from_decimal(digits).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> AuctionId {
        AuctionId::from(n)
    }

    fn secret(n: u64, bid: u64, deposit: u64) -> BidSecret {
        BidSecret::new(id(n), bid, FieldElement::from(1234u64), deposit, 1_700_000_000_000)
    }

    #[test]
    fn test_put_get_delete() {
        let store = SecretStore::new(MemoryStore::new());
        assert!(store.get(&id(1)).unwrap().is_none());

        store.put(&id(1), &secret(1, 500, 500)).unwrap();
        assert_eq!(store.get(&id(1)).unwrap(), Some(secret(1, 500, 500)));

        store.delete(&id(1)).unwrap();
        assert!(store.get(&id(1)).unwrap().is_none());
        store.delete(&id(1)).unwrap();
    }

    #[test]
    fn test_put_overwrites() {
        let store = SecretStore::new(MemoryStore::new());
        store.put(&id(1), &secret(1, 500, 500)).unwrap();
        store.put(&id(1), &secret(1, 700, 800)).unwrap();

        let stored = store.get(&id(1)).unwrap().unwrap();
        assert_eq!(stored.bid_amount, 700);
        assert_eq!(stored.deposit, 800);
    }

    #[test]
    fn test_put_rejects_deposit_below_bid() {
        let store = SecretStore::new(MemoryStore::new());
        let result = store.put(&id(1), &secret(1, 500, 499));
        assert!(matches!(
            result,
            Err(SecretError::DepositBelowBid { bid: 500, deposit: 499 })
        ));
        assert!(store.get(&id(1)).unwrap().is_none());
    }

    #[test]
    fn test_put_rejects_mismatched_key() {
        let store = SecretStore::new(MemoryStore::new());
        let result = store.put(&id(2), &secret(1, 500, 500));
        assert!(matches!(result, Err(SecretError::AuctionMismatch { .. })));
    }

    #[test]
    fn test_mark_revealed() {
        let store = SecretStore::new(MemoryStore::new());
        store.put(&id(3), &secret(3, 10, 10)).unwrap();

        let updated = store.mark_revealed(&id(3)).unwrap();
        assert!(updated.revealed);
        assert!(store.get(&id(3)).unwrap().unwrap().revealed);

        // Idempotent
        assert!(store.mark_revealed(&id(3)).unwrap().revealed);

        assert!(matches!(
            store.mark_revealed(&id(4)),
            Err(SecretError::NotFound(_))
        ));
    }

    #[test]
    fn test_record_without_deposit_defaults_to_bid() {
        let kv = MemoryStore::new();
        kv.set(
            "bid_9",
            br#"{"auction_id":"9field","bid_amount":250,"salt":"77field","timestamp":1}"#,
        )
        .unwrap();

        let store = SecretStore::new(kv);
        let secret = store.get(&id(9)).unwrap().unwrap();
        assert_eq!(secret.deposit, 250);
        assert!(!secret.revealed);
    }

    #[test]
    fn test_auction_ids_lists_only_secrets() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("auctions", b"[]").unwrap();
        let store = SecretStore::new(Arc::clone(&kv));
        store.put(&id(5), &secret(5, 1, 1)).unwrap();
        store.put(&id(6), &secret(6, 1, 1)).unwrap();

        let mut ids = store.auction_ids().unwrap();
        ids.sort_by_key(|i| i.to_u128());
        assert_eq!(ids, vec![id(5), id(6)]);
    }

    #[test]
    fn test_cleared_store_loses_secrets() {
        let kv = Arc::new(MemoryStore::new());
        let store = SecretStore::new(Arc::clone(&kv));
        store.put(&id(7), &secret(7, 1, 1)).unwrap();

        kv.clear();
        assert!(store.get(&id(7)).unwrap().is_none());
    }

    #[test]
    fn test_sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SecretStore::new(SledStore::open(dir.path()).unwrap());
            store.put(&id(8), &secret(8, 42, 50)).unwrap();
        }

        let store = SecretStore::new(SledStore::open(dir.path()).unwrap());
        let secret = store.get(&id(8)).unwrap().unwrap();
        assert_eq!(secret.bid_amount, 42);
        assert_eq!(secret.deposit, 50);
        assert_eq!(store.auction_ids().unwrap(), vec![id(8)]);
    }
}
