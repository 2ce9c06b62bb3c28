//! Block-time polling of chain state.
//!
//! A poller fetches once immediately, then on every tick, and publishes the
//! latest value through a `watch` channel. Failed polls are logged and
//! skipped; the next tick retries. The [`PollHandle`] owns the task: dropping
//! it stops the loop, and a fetch that was already in flight when the handle
//! went away is discarded instead of published.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use auction_types::{AuctionId, OnChainAuction, Phase};

use crate::error::ChainError;
use crate::phase::phase_of;
use crate::query::ChainReader;

/// Shortest interval a poller ticks at; shorter requests are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Owner of a running poller.
pub struct PollHandle<T> {
    latest: watch::Receiver<Option<T>>,
    relevant: Arc<AtomicBool>,
    _cancel: watch::Sender<bool>,
}

impl<T: Clone> PollHandle<T> {
    /// Most recent successful poll, `None` before the first one.
    pub fn latest(&self) -> Option<T> {
        self.latest.borrow().clone()
    }

    /// Receiver notified on every published value.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.latest.clone()
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.relevant.store(false, Ordering::SeqCst);
    }
}

/// Spawn a poller running `fetch` every `interval`.
pub fn spawn_poller<T, E, F, Fut>(
    name: &'static str,
    interval: Duration,
    mut fetch: F,
) -> PollHandle<T>
where
    T: Send + Sync + 'static,
    E: Display + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    if interval < MIN_POLL_INTERVAL {
        warn!(
            poller = name,
            interval_ms = interval.as_millis() as u64,
            "poll interval too short, clamping"
        );
    }
    let interval = interval.max(MIN_POLL_INTERVAL);
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    let (value_tx, value_rx) = watch::channel(None);
    let relevant = Arc::new(AtomicBool::new(true));
    let still_relevant = Arc::clone(&relevant);

    tokio::spawn(async move {
        debug!(poller = name, interval_ms = interval.as_millis() as u64, "starting poller");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match fetch().await {
                        Ok(value) => {
                            if !still_relevant.load(Ordering::SeqCst) {
                                debug!(poller = name, "discarding result for closed view");
                                break;
                            }
                            if value_tx.send(Some(value)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(poller = name, error = %e, "poll failed"),
                    }
                }
                _ = cancel_rx.changed() => break,
            }
        }
        debug!(poller = name, "poller stopped");
    });

    PollHandle {
        latest: value_rx,
        relevant,
        _cancel: cancel_tx,
    }
}

pub fn spawn_block_height_poller<R>(reader: Arc<R>, interval: Duration) -> PollHandle<u32>
where
    R: ChainReader + ?Sized + 'static,
{
    spawn_poller("block_height", interval, move || {
        let reader = Arc::clone(&reader);
        async move { reader.current_block_height().await }
    })
}

/// One poll of an auction's timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionSnapshot {
    pub block_height: u32,
    pub auction: Option<OnChainAuction>,
    pub phase: Phase,
}

pub fn spawn_auction_poller<R>(
    reader: Arc<R>,
    auction_id: AuctionId,
    interval: Duration,
) -> PollHandle<AuctionSnapshot>
where
    R: ChainReader + ?Sized + 'static,
{
    spawn_poller("auction", interval, move || {
        let reader = Arc::clone(&reader);
        let auction_id = auction_id.clone();
        async move {
            let (height, auction) = tokio::join!(
                reader.current_block_height(),
                reader.auction_struct(&auction_id)
            );
            let (block_height, auction) = (height?, auction?);
            let phase = auction
                .as_ref()
                .map(|a| phase_of(a, Some(block_height)))
                .unwrap_or(Phase::Unknown);
            Ok::<_, ChainError>(AuctionSnapshot {
                block_height,
                auction,
                phase,
            })
        }
    })
}
