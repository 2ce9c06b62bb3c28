//! Core type definitions for the sealed-bid auction client.
//!
//! This crate provides the shared data structures used across the client,
//! including ledger literal encoding, bid secrets, cached auction records and
//! operation payloads.

use serde::{Deserialize, Serialize};

pub mod encoding;

pub use encoding::{
    parse_u32_literal, parse_u64_literal, parse_u8_literal, u32_literal, u64_literal, Address,
    EncodingError, FieldElement, ZERO_ADDRESS,
};

/// Auctions are identified on-chain by a field element.
pub type AuctionId = FieldElement;

// =========================
// AUCTION LIFECYCLE
// =========================

/// Coarse status code stored in the program's `auctions` mapping.
///
/// The program uses a single code for both the commit and the reveal window;
/// the actual phase has to be derived from block-height deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// Registered, not yet open for bids
    Created,
    /// Open: commit or reveal window, depending on block height
    Active,
    /// Settled on-chain
    Ended,
    /// Cancelled by the auctioneer
    Cancelled,
}

impl AuctionStatus {
    pub const CODE_CREATED: u8 = 0;
    pub const CODE_ACTIVE: u8 = 1;
    /// Reserved reveal code from earlier program versions; never written by
    /// the current program and treated as `Active`.
    pub const CODE_LEGACY_REVEAL: u8 = 2;
    pub const CODE_ENDED: u8 = 3;
    pub const CODE_CANCELLED: u8 = 4;

    /// Map a ledger status code to a status, `None` for unknown codes.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            Self::CODE_CREATED => Some(Self::Created),
            Self::CODE_ACTIVE | Self::CODE_LEGACY_REVEAL => Some(Self::Active),
            Self::CODE_ENDED => Some(Self::Ended),
            Self::CODE_CANCELLED => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Created => Self::CODE_CREATED,
            Self::Active => Self::CODE_ACTIVE,
            Self::Ended => Self::CODE_ENDED,
            Self::Cancelled => Self::CODE_CANCELLED,
        }
    }
}

/// Lifecycle phase derived from status, deadlines and current block height.
///
/// Never stored: block height moves continuously.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Commit,
    Reveal,
    Ended,
    Cancelled,
    /// Not enough data to tell commit from reveal; callers must not act yet.
    Unknown,
}

impl Phase {
    /// Short label shown next to an auction.
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Commit => "Accepting Bids",
            Self::Reveal => "Reveal Phase",
            Self::Ended => "Ended",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Pending",
        }
    }

    pub fn accepts_bids(self) -> bool {
        self == Self::Commit
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

// =========================
// CHAIN STATE
// =========================

/// Auction struct as stored in the program's `auctions` mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainAuction {
    pub auctioneer: Option<Address>,
    pub item_id: Option<FieldElement>,
    pub min_bid: Option<u64>,
    pub commit_deadline: u32,
    pub reveal_deadline: u32,
    pub status: AuctionStatus,
    /// `None` until settlement records a winner
    pub winner: Option<Address>,
    pub winning_bid: Option<u64>,
}

// =========================
// LOCAL STATE
// =========================

/// Secret opening of a sealed bid, kept only on the client that placed it.
///
/// Without this record the bid can be neither revealed nor refunded from
/// this client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSecret {
    pub auction_id: AuctionId,
    pub bid_amount: u64,
    pub salt: FieldElement,
    /// Locked with the bid; always `>= bid_amount`
    pub deposit: u64,
    pub revealed: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl BidSecret {
    pub fn new(
        auction_id: AuctionId,
        bid_amount: u64,
        salt: FieldElement,
        deposit: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            auction_id,
            bid_amount,
            salt,
            deposit,
            revealed: false,
            timestamp,
        }
    }

    /// Whether the deposit covers the bid.
    pub fn is_consistent(&self) -> bool {
        self.deposit >= self.bid_amount
    }
}

/// Locally cached view of an auction. Never authoritative for phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub id: AuctionId,
    pub item_id: FieldElement,
    pub auctioneer: Option<Address>,
    pub min_bid: u64,

    // Timing (blocks)
    pub commit_duration: Option<u32>,
    pub reveal_duration: Option<u32>,
    pub commit_deadline: Option<u32>,
    pub reveal_deadline: Option<u32>,

    pub status: AuctionStatus,
    pub bid_count: u32,
    pub winner: Option<Address>,
    pub winning_bid: Option<u64>,

    /// Program the auction was created under
    pub program_version: String,
    /// Pulled from chain by id rather than created here
    pub imported: bool,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl AuctionRecord {
    /// Build a cache entry for an auction discovered on-chain.
    pub fn from_chain(
        id: AuctionId,
        on_chain: &OnChainAuction,
        bid_count: u32,
        program_version: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            item_id: on_chain.item_id.clone().unwrap_or_else(|| id.clone()),
            id,
            auctioneer: on_chain.auctioneer.clone(),
            min_bid: on_chain.min_bid.unwrap_or(0),
            commit_duration: None,
            reveal_duration: None,
            commit_deadline: Some(on_chain.commit_deadline),
            reveal_deadline: Some(on_chain.reveal_deadline),
            status: on_chain.status,
            bid_count,
            winner: on_chain.winner.clone(),
            winning_bid: on_chain.winning_bid,
            program_version: program_version.into(),
            imported: true,
            created_at,
        }
    }

    /// Last six digits of the id, used as a short display name.
    pub fn short_id(&self) -> &str {
        let digits = self.id.digits();
        &digits[digits.len().saturating_sub(6)..]
    }
}

// =========================
// OPERATIONS
// =========================

/// Transaction id returned by the wallet once a payload is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bid values a caller must persist after `place_bid` is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidMetadata {
    pub auction_id: AuctionId,
    pub bid_amount: u64,
    pub salt: FieldElement,
    pub deposit: u64,
}

/// A fully encoded program call, ready for the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPayload {
    pub program_id: String,
    pub function_name: String,
    /// Typed literals, in the program's parameter order
    pub inputs: Vec<String>,
    /// Microcredits
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BidMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuctionStatus::from_code(0), Some(AuctionStatus::Created));
        assert_eq!(AuctionStatus::from_code(1), Some(AuctionStatus::Active));
        assert_eq!(AuctionStatus::from_code(2), Some(AuctionStatus::Active));
        assert_eq!(AuctionStatus::from_code(3), Some(AuctionStatus::Ended));
        assert_eq!(AuctionStatus::from_code(4), Some(AuctionStatus::Cancelled));
        assert_eq!(AuctionStatus::from_code(5), None);

        for status in [
            AuctionStatus::Created,
            AuctionStatus::Active,
            AuctionStatus::Ended,
            AuctionStatus::Cancelled,
        ] {
            assert_eq!(AuctionStatus::from_code(status.code()), Some(status));
        }
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Commit.label(), "Accepting Bids");
        assert_eq!(Phase::Reveal.label(), "Reveal Phase");
        assert_eq!(Phase::Unknown.label(), "Pending");
        assert!(Phase::Commit.accepts_bids());
        assert!(!Phase::Reveal.accepts_bids());
        assert!(Phase::Cancelled.is_terminal());
    }

    #[test]
    fn test_bid_secret_consistency() {
        let salt = FieldElement::from(9u64);
        let ok = BidSecret::new(FieldElement::from(1u64), 100, salt.clone(), 100, 0);
        assert!(ok.is_consistent());
        assert!(!ok.revealed);

        let bad = BidSecret::new(FieldElement::from(1u64), 100, salt, 99, 0);
        assert!(!bad.is_consistent());
    }

    #[test]
    fn test_record_from_chain() {
        let on_chain = OnChainAuction {
            auctioneer: None,
            item_id: None,
            min_bid: Some(1_000),
            commit_deadline: 100,
            reveal_deadline: 200,
            status: AuctionStatus::Active,
            winner: None,
            winning_bid: None,
        };
        let id: AuctionId = "1708425600123456".parse().unwrap();
        let record = AuctionRecord::from_chain(id.clone(), &on_chain, 3, "prog.aleo", 5);

        assert_eq!(record.item_id, id);
        assert_eq!(record.commit_deadline, Some(100));
        assert_eq!(record.bid_count, 3);
        assert!(record.imported);
        assert_eq!(record.short_id(), "123456");
    }

    #[test]
    fn test_payload_json_skips_empty_metadata() {
        let payload = OperationPayload {
            program_id: "p.aleo".into(),
            function_name: "cancel_auction".into(),
            inputs: vec!["1field".into()],
            fee: 100_000,
            metadata: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("metadata").is_none());
        assert_eq!(json["inputs"][0], "1field");
    }
}
