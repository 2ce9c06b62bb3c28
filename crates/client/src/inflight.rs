//! At most one in-flight operation per key.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or `None` if an operation already holds it.
    pub fn try_begin(&self, key: impl Into<String>) -> Option<InFlightToken> {
        let key = key.into();
        if !self.keys.lock().insert(key.clone()) {
            return None;
        }
        Some(InFlightToken {
            keys: Arc::clone(&self.keys),
            key,
        })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.keys.lock().contains(key)
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct InFlightToken {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightToken {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}
