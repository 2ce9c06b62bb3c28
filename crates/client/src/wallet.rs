//! Wallet execution seam.
//!
//! Signing and submission happen outside this crate. The engine only needs
//! to know whether the wallet accepted a payload for delivery.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use auction_types::{OperationPayload, TransactionId};

use crate::error::WalletError;

/// Prefix of transaction ids issued by the ledger.
pub const TRANSACTION_ID_PREFIX: &str = "at1";

#[async_trait]
pub trait WalletExecutor: Send + Sync {
    /// Sign and submit. `Ok` means accepted for delivery, not finalized.
    async fn execute(&self, payload: &OperationPayload) -> Result<TransactionId, WalletError>;
}

#[async_trait]
impl<T: WalletExecutor + ?Sized> WalletExecutor for std::sync::Arc<T> {
    async fn execute(&self, payload: &OperationPayload) -> Result<TransactionId, WalletError> {
        (**self).execute(payload).await
    }
}

/// Records payloads instead of submitting them.
#[derive(Default)]
pub struct MockWallet {
    submitted: Mutex<Vec<OperationPayload>>,
    reject_with: Mutex<Option<String>>,
    counter: AtomicU64,
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following payload with `message`.
    pub fn reject_with(&self, message: impl Into<String>) {
        *self.reject_with.lock() = Some(message.into());
    }

    pub fn accept(&self) {
        *self.reject_with.lock() = None;
    }

    pub fn submitted(&self) -> Vec<OperationPayload> {
        self.submitted.lock().clone()
    }

    pub fn last(&self) -> Option<OperationPayload> {
        self.submitted.lock().last().cloned()
    }
}

#[async_trait]
impl WalletExecutor for MockWallet {
    async fn execute(&self, payload: &OperationPayload) -> Result<TransactionId, WalletError> {
        if let Some(message) = self.reject_with.lock().clone() {
            return Err(WalletError::Rejected(message));
        }
        self.submitted.lock().push(payload.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(TransactionId(format!("{TRANSACTION_ID_PREFIX}mock{n:08}")))
    }
}
