//! Pre-flight eligibility checks against authoritative chain state.
//!
//! These checks only exist to avoid paying fees for transactions the program
//! is certain to reject. The ledger stays the final arbiter, so a transient
//! read failure lets the action through (fail-open) instead of blocking the
//! user. Absent auctions are never fail-open.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use auction_types::{Address, AuctionId, AuctionStatus, OnChainAuction, Phase};

use crate::error::ChainError;
use crate::phase::phase_of;
use crate::query::ChainReader;

/// Why an action is not allowed right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Ineligible {
    #[error("Auction not found on-chain; it may not be confirmed yet")]
    NotFound,

    #[error("Auction is not active (status: {status:?})")]
    NotActive { status: AuctionStatus },

    #[error("Commit phase is still open; reveals open in {blocks} blocks")]
    CommitPhaseOpen { blocks: u32 },

    #[error("Reveal phase closed at block {reveal_deadline}")]
    RevealClosed { reveal_deadline: u32 },

    #[error("Reveal phase is still open; settlement possible in {blocks} blocks")]
    RevealNotOver { blocks: u32 },

    #[error("Auction is already settled")]
    AlreadySettled,

    #[error("Auction was cancelled")]
    Cancelled,

    #[error("Auction is not settled yet; refunds open after settlement")]
    NotSettled,

    #[error("Winners cannot claim refunds")]
    WinnerCannotRefund,
}

/// Verdict of a pre-flight check, with the chain data it was based on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityResult {
    pub ok: bool,
    pub reason: Option<String>,
    pub ineligible: Option<Ineligible>,
    /// Set when the verdict is `ok` only because chain data was unavailable
    pub fail_open: bool,
    pub phase: Option<Phase>,
    pub block_height: Option<u32>,
    pub commit_deadline: Option<u32>,
    pub reveal_deadline: Option<u32>,
}

impl EligibilityResult {
    fn allowed(block_height: u32, auction: &OnChainAuction) -> Self {
        Self {
            ok: true,
            reason: None,
            ineligible: None,
            fail_open: false,
            phase: Some(phase_of(auction, Some(block_height))),
            block_height: Some(block_height),
            commit_deadline: Some(auction.commit_deadline),
            reveal_deadline: Some(auction.reveal_deadline),
        }
    }

    fn denied(
        ineligible: Ineligible,
        block_height: Option<u32>,
        auction: Option<&OnChainAuction>,
    ) -> Self {
        Self {
            ok: false,
            reason: Some(ineligible.to_string()),
            phase: auction.map(|a| phase_of(a, block_height)),
            ineligible: Some(ineligible),
            fail_open: false,
            block_height,
            commit_deadline: auction.map(|a| a.commit_deadline),
            reveal_deadline: auction.map(|a| a.reveal_deadline),
        }
    }

    fn fail_open(check: &'static str, auction_id: &AuctionId, err: &ChainError) -> Self {
        warn!(check, auction_id = %auction_id, error = %err, "chain read failed, allowing action");
        Self {
            ok: true,
            reason: None,
            ineligible: None,
            fail_open: true,
            phase: None,
            block_height: None,
            commit_deadline: None,
            reveal_deadline: None,
        }
    }

    /// `Err` with the reason when the action is not allowed.
    pub fn into_result(self) -> Result<Self, Ineligible> {
        match self.ineligible {
            Some(ineligible) => Err(ineligible),
            None => Ok(self),
        }
    }
}

/// Fetch block height and auction struct concurrently.
async fn fetch<R: ChainReader + ?Sized>(
    reader: &R,
    auction_id: &AuctionId,
) -> Result<(u32, Option<OnChainAuction>), ChainError> {
    let (height, auction) = tokio::join!(
        reader.current_block_height(),
        reader.auction_struct(auction_id)
    );
    Ok((height?, auction?))
}

/// Reveals are accepted only in the reveal window.
pub async fn check_reveal_eligibility<R: ChainReader + ?Sized>(
    reader: &R,
    auction_id: &AuctionId,
) -> EligibilityResult {
    let (block, auction) = match fetch(reader, auction_id).await {
        Ok(data) => data,
        Err(err) => return EligibilityResult::fail_open("reveal", auction_id, &err),
    };
    let Some(auction) = auction else {
        return EligibilityResult::denied(Ineligible::NotFound, Some(block), None);
    };

    let ineligible = if auction.status != AuctionStatus::Active {
        Some(Ineligible::NotActive {
            status: auction.status,
        })
    } else {
        match phase_of(&auction, Some(block)) {
            Phase::Reveal => None,
            Phase::Commit => Some(Ineligible::CommitPhaseOpen {
                blocks: auction.commit_deadline.saturating_sub(block).saturating_add(1),
            }),
            _ => Some(Ineligible::RevealClosed {
                reveal_deadline: auction.reveal_deadline,
            }),
        }
    };

    verdict("reveal", auction_id, block, &auction, ineligible)
}

/// Settlement requires an active auction strictly past its reveal deadline.
pub async fn check_settle_eligibility<R: ChainReader + ?Sized>(
    reader: &R,
    auction_id: &AuctionId,
) -> EligibilityResult {
    let (block, auction) = match fetch(reader, auction_id).await {
        Ok(data) => data,
        Err(err) => return EligibilityResult::fail_open("settle", auction_id, &err),
    };
    let Some(auction) = auction else {
        return EligibilityResult::denied(Ineligible::NotFound, Some(block), None);
    };

    let ineligible = match auction.status {
        AuctionStatus::Ended => Some(Ineligible::AlreadySettled),
        AuctionStatus::Cancelled => Some(Ineligible::Cancelled),
        AuctionStatus::Created => Some(Ineligible::NotActive {
            status: auction.status,
        }),
        AuctionStatus::Active if block <= auction.reveal_deadline => {
            Some(Ineligible::RevealNotOver {
                blocks: auction.reveal_deadline.saturating_sub(block).saturating_add(1),
            })
        }
        AuctionStatus::Active => None,
    };

    verdict("settle", auction_id, block, &auction, ineligible)
}

/// Refunds are open to every bidder except the winner once settled.
pub async fn check_refund_eligibility<R: ChainReader + ?Sized>(
    reader: &R,
    auction_id: &AuctionId,
    caller: &Address,
) -> EligibilityResult {
    let (block, auction) = match fetch(reader, auction_id).await {
        Ok(data) => data,
        Err(err) => return EligibilityResult::fail_open("refund", auction_id, &err),
    };
    let Some(auction) = auction else {
        return EligibilityResult::denied(Ineligible::NotFound, Some(block), None);
    };

    let ineligible = match auction.status {
        AuctionStatus::Created | AuctionStatus::Active => Some(Ineligible::NotSettled),
        AuctionStatus::Cancelled => Some(Ineligible::Cancelled),
        AuctionStatus::Ended if auction.winner.as_ref() == Some(caller) => {
            Some(Ineligible::WinnerCannotRefund)
        }
        AuctionStatus::Ended => None,
    };

    verdict("refund", auction_id, block, &auction, ineligible)
}

fn verdict(
    check: &'static str,
    auction_id: &AuctionId,
    block: u32,
    auction: &OnChainAuction,
    ineligible: Option<Ineligible>,
) -> EligibilityResult {
    match ineligible {
        None => {
            debug!(check, auction_id = %auction_id, block, "eligible");
            EligibilityResult::allowed(block, auction)
        }
        Some(ineligible) => {
            debug!(check, auction_id = %auction_id, block, reason = %ineligible, "not eligible");
            EligibilityResult::denied(ineligible, Some(block), Some(auction))
        }
    }
}
