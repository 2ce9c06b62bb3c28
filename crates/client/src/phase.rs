//! Lifecycle phase derivation.
//!
//! The program stores one status code for the whole bidding period, so the
//! commit and reveal windows are told apart by block height alone. Both
//! deadlines are inclusive: at `block == commit_deadline` bids are still
//! accepted, at `block == reveal_deadline` reveals are still accepted.

use auction_types::{AuctionStatus, OnChainAuction, Phase};

/// Derive the true phase of an auction.
///
/// Pure and total. `None` inputs mean "not known"; an unknown status yields
/// [`Phase::Unknown`], never an error.
pub fn derive_phase(
    status: Option<AuctionStatus>,
    current_block: Option<u32>,
    commit_deadline: Option<u32>,
    reveal_deadline: Option<u32>,
) -> Phase {
    let status = match status {
        Some(status) => status,
        None => return Phase::Unknown,
    };

    match status {
        AuctionStatus::Ended => Phase::Ended,
        AuctionStatus::Cancelled => Phase::Cancelled,
        AuctionStatus::Created => Phase::Created,
        AuctionStatus::Active => {
            let (Some(block), Some(commit)) = (current_block, commit_deadline) else {
                return Phase::Unknown;
            };
            if block <= commit {
                return Phase::Commit;
            }
            match reveal_deadline {
                Some(reveal) if block > reveal => Phase::Ended,
                _ => Phase::Reveal,
            }
        }
    }
}

/// Phase of a decoded on-chain auction at `current_block`.
pub fn phase_of(auction: &OnChainAuction, current_block: Option<u32>) -> Phase {
    derive_phase(
        Some(auction.status),
        current_block,
        Some(auction.commit_deadline),
        Some(auction.reveal_deadline),
    )
}

/// Blocks left until the current phase closes, `None` for phases without a
/// deadline.
pub fn blocks_remaining(
    phase: Phase,
    current_block: u32,
    commit_deadline: Option<u32>,
    reveal_deadline: Option<u32>,
) -> Option<u32> {
    let deadline = match phase {
        Phase::Commit => commit_deadline?,
        Phase::Reveal => reveal_deadline?,
        _ => return None,
    };
    Some(deadline.saturating_sub(current_block))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: Option<AuctionStatus> = Some(AuctionStatus::Active);

    fn active(block: u32) -> Phase {
        derive_phase(ACTIVE, Some(block), Some(100), Some(200))
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(active(0), Phase::Commit);
        assert_eq!(active(100), Phase::Commit);
        assert_eq!(active(101), Phase::Reveal);
        assert_eq!(active(200), Phase::Reveal);
        assert_eq!(active(201), Phase::Ended);
    }

    #[test]
    fn test_scenario_blocks_150_and_250() {
        assert_eq!(active(150), Phase::Reveal);
        assert_eq!(active(250), Phase::Ended);
    }

    #[test]
    fn test_terminal_statuses_ignore_blocks() {
        for block in [None, Some(0), Some(150), Some(u32::MAX)] {
            assert_eq!(
                derive_phase(Some(AuctionStatus::Ended), block, Some(100), Some(200)),
                Phase::Ended
            );
            assert_eq!(
                derive_phase(Some(AuctionStatus::Cancelled), block, None, None),
                Phase::Cancelled
            );
            assert_eq!(
                derive_phase(Some(AuctionStatus::Created), block, None, None),
                Phase::Created
            );
        }
    }

    #[test]
    fn test_missing_data_is_unknown() {
        assert_eq!(derive_phase(None, Some(150), Some(100), Some(200)), Phase::Unknown);
        assert_eq!(derive_phase(ACTIVE, None, Some(100), Some(200)), Phase::Unknown);
        assert_eq!(derive_phase(ACTIVE, Some(150), None, Some(200)), Phase::Unknown);
    }

    #[test]
    fn test_unknown_reveal_deadline_past_commit_is_reveal() {
        assert_eq!(derive_phase(ACTIVE, Some(50), Some(100), None), Phase::Commit);
        assert_eq!(derive_phase(ACTIVE, Some(5_000), Some(100), None), Phase::Reveal);
    }

    #[test]
    fn test_total_and_deterministic() {
        let statuses = [
            None,
            Some(AuctionStatus::Created),
            ACTIVE,
            Some(AuctionStatus::Ended),
            Some(AuctionStatus::Cancelled),
        ];
        let values = [None, Some(0), Some(100), Some(101), Some(200), Some(201), Some(u32::MAX)];
        for status in statuses {
            for block in values {
                for commit in values {
                    for reveal in values {
                        let first = derive_phase(status, block, commit, reveal);
                        assert_eq!(first, derive_phase(status, block, commit, reveal));
                    }
                }
            }
        }
    }

    #[test]
    fn test_blocks_remaining() {
        assert_eq!(blocks_remaining(Phase::Commit, 40, Some(100), Some(200)), Some(60));
        assert_eq!(blocks_remaining(Phase::Reveal, 150, Some(100), Some(200)), Some(50));
        assert_eq!(blocks_remaining(Phase::Reveal, 150, Some(100), None), None);
        assert_eq!(blocks_remaining(Phase::Ended, 250, Some(100), Some(200)), None);
    }
}
