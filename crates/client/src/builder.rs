//! Operation payload builders.
//!
//! Input order and literal encoding must match the program's parameter list
//! exactly. `reveal_bid` and `claim_refund` make the program recompute the
//! bid commitment from `(auction_id, bid_amount, salt, deposit)`, so those
//! four inputs are encoded identically to `place_bid`.

use tracing::debug;

use auction_crypto::generate_salt;
use auction_types::{
    u32_literal, u64_literal, Address, AuctionId, BidMetadata, BidSecret, FieldElement,
    OperationPayload,
};

use crate::config::{ClientConfig, CREDITS_PROGRAM_ID, DEFAULT_PROGRAM_ID};
use crate::error::BuildError;

/// Fee for operations without a cross-program transfer.
pub const BASE_FEE: u64 = 100_000;
/// Fee for operations that move credits through `credits.aleo`.
pub const TRANSFER_FEE: u64 = 500_000;

/// Smallest minimum bid an auction may be created with (microcredits).
pub const MIN_BID_AMOUNT: u64 = 1_000;

pub const DEFAULT_COMMIT_DURATION: u32 = 360;
pub const DEFAULT_REVEAL_DURATION: u32 = 180;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAuctionParams {
    pub auction_id: AuctionId,
    /// Defaults to the auction id
    pub item_id: Option<FieldElement>,
    pub min_bid: u64,
    /// Blocks
    pub commit_duration: u32,
    /// Blocks
    pub reveal_duration: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceBidParams {
    pub auction_id: AuctionId,
    pub bid_amount: u64,
    /// Generated when `None`
    pub salt: Option<FieldElement>,
    /// Defaults to `bid_amount`
    pub deposit: Option<u64>,
    /// Private credits record plaintext paying the deposit
    pub payment_record: Option<String>,
}

impl PlaceBidParams {
    pub fn new(auction_id: AuctionId, bid_amount: u64) -> Self {
        Self {
            auction_id,
            bid_amount,
            salt: None,
            deposit: None,
            payment_record: None,
        }
    }
}

/// Raw opening of a committed bid, used by reveal and refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidOpening {
    pub auction_id: AuctionId,
    pub bid_amount: u64,
    pub salt: FieldElement,
    /// Defaults to `bid_amount`
    pub deposit: Option<u64>,
}

impl BidOpening {
    pub fn from_secret(secret: &BidSecret) -> Self {
        Self {
            auction_id: secret.auction_id.clone(),
            bid_amount: secret.bid_amount,
            salt: secret.salt.clone(),
            deposit: Some(secret.deposit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleParams {
    pub auction_id: AuctionId,
    pub auctioneer: Address,
    pub winning_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldCreditsParams {
    pub recipient: Address,
    /// Microcredits
    pub amount: u64,
}

/// Builds payloads for one deployment of the auction program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationBuilder {
    program_id: String,
    credits_program_id: String,
}

impl Default for OperationBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM_ID)
    }
}

impl OperationBuilder {
    pub fn new(program_id: impl Into<String>) -> Self {
        Self {
            program_id: program_id.into(),
            credits_program_id: CREDITS_PROGRAM_ID.to_string(),
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            program_id: cfg.program_id.clone(),
            credits_program_id: cfg.credits_program_id.clone(),
        }
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    fn payload(&self, function_name: &str, inputs: Vec<String>, fee: u64) -> OperationPayload {
        debug!(program = %self.program_id, function = function_name, inputs = inputs.len(), fee, "payload built");
        OperationPayload {
            program_id: self.program_id.clone(),
            function_name: function_name.to_string(),
            inputs,
            fee,
            metadata: None,
        }
    }

    pub fn build_create_auction(
        &self,
        params: &CreateAuctionParams,
    ) -> Result<OperationPayload, BuildError> {
        if params.min_bid < MIN_BID_AMOUNT {
            return Err(BuildError::MinBidTooLow {
                min_bid: params.min_bid,
                floor: MIN_BID_AMOUNT,
            });
        }
        if params.commit_duration == 0 {
            return Err(BuildError::ZeroDuration("commit_duration"));
        }
        if params.reveal_duration == 0 {
            return Err(BuildError::ZeroDuration("reveal_duration"));
        }

        let item_id = params.item_id.as_ref().unwrap_or(&params.auction_id);
        let inputs = vec![
            params.auction_id.literal(),
            item_id.literal(),
            u64_literal(params.min_bid),
            u32_literal(params.commit_duration),
            u32_literal(params.reveal_duration),
        ];
        Ok(self.payload("create_auction", inputs, BASE_FEE))
    }

    /// The returned payload's `metadata` carries the values the caller must
    /// persist once the wallet accepts the transaction.
    pub fn build_place_bid(&self, params: &PlaceBidParams) -> Result<OperationPayload, BuildError> {
        let deposit = resolve_deposit(params.bid_amount, params.deposit)?;
        let salt = match &params.salt {
            Some(salt) => salt.clone(),
            None => generate_salt()?,
        };

        let mut inputs = opening_inputs(&params.auction_id, params.bid_amount, &salt, deposit);
        if let Some(record) = &params.payment_record {
            inputs.push(record.clone());
        }

        let mut payload = self.payload("place_bid", inputs, TRANSFER_FEE);
        payload.metadata = Some(BidMetadata {
            auction_id: params.auction_id.clone(),
            bid_amount: params.bid_amount,
            salt,
            deposit,
        });
        Ok(payload)
    }

    pub fn build_reveal_bid(&self, opening: &BidOpening) -> Result<OperationPayload, BuildError> {
        let deposit = resolve_deposit(opening.bid_amount, opening.deposit)?;
        let inputs = opening_inputs(
            &opening.auction_id,
            opening.bid_amount,
            &opening.salt,
            deposit,
        );
        Ok(self.payload("reveal_bid", inputs, TRANSFER_FEE))
    }

    pub fn build_settle_auction(&self, params: &SettleParams) -> OperationPayload {
        let inputs = vec![
            params.auction_id.literal(),
            params.auctioneer.to_string(),
            u64_literal(params.winning_amount),
        ];
        self.payload("settle_auction", inputs, TRANSFER_FEE)
    }

    pub fn build_cancel_auction(&self, auction_id: &AuctionId) -> OperationPayload {
        self.payload("cancel_auction", vec![auction_id.literal()], BASE_FEE)
    }

    pub fn build_claim_refund(&self, opening: &BidOpening) -> Result<OperationPayload, BuildError> {
        let deposit = resolve_deposit(opening.bid_amount, opening.deposit)?;
        let inputs = opening_inputs(
            &opening.auction_id,
            opening.bid_amount,
            &opening.salt,
            deposit,
        );
        Ok(self.payload("claim_refund", inputs, TRANSFER_FEE))
    }

    /// Move public balance into a private record usable for bidding.
    pub fn build_shield_credits(
        &self,
        params: &ShieldCreditsParams,
    ) -> Result<OperationPayload, BuildError> {
        if params.amount == 0 {
            return Err(BuildError::ZeroAmount);
        }
        let mut payload = self.payload(
            "transfer_public_to_private",
            vec![params.recipient.to_string(), u64_literal(params.amount)],
            BASE_FEE,
        );
        payload.program_id = self.credits_program_id.clone();
        Ok(payload)
    }
}

fn resolve_deposit(bid_amount: u64, deposit: Option<u64>) -> Result<u64, BuildError> {
    if bid_amount == 0 {
        return Err(BuildError::ZeroBid);
    }
    let deposit = deposit.unwrap_or(bid_amount);
    if deposit < bid_amount {
        return Err(BuildError::DepositBelowBid {
            bid: bid_amount,
            deposit,
        });
    }
    Ok(deposit)
}

/// `[auction_id field, bid u64, salt field, deposit u64]`
fn opening_inputs(
    auction_id: &AuctionId,
    bid_amount: u64,
    salt: &FieldElement,
    deposit: u64,
) -> Vec<String> {
    vec![
        auction_id.literal(),
        u64_literal(bid_amount),
        salt.literal(),
        u64_literal(deposit),
    ]
}

/// Microcredits held by a credits record plaintext, if it is one.
pub fn record_microcredits(record: &str) -> Option<u64> {
    let (_, rest) = record.split_once("microcredits:")?;
    let literal = rest
        .trim_start()
        .split(|c: char| c == ',' || c == '\n' || c == '}' || c.is_whitespace())
        .next()?;
    let literal = literal
        .strip_suffix(".private")
        .or_else(|| literal.strip_suffix(".public"))
        .unwrap_or(literal);
    auction_types::parse_u64_literal(literal).ok()
}

/// First record able to pay `amount`.
pub fn select_payment_record<'a, I>(records: I, amount: u64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    records
        .into_iter()
        .find(|record| record_microcredits(record).is_some_and(|held| held >= amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> OperationBuilder {
        OperationBuilder::default()
    }

    fn addr(fill: char) -> Address {
        format!("aleo1{}", fill.to_string().repeat(58)).parse().unwrap()
    }

    #[test]
    fn test_create_auction_encoding() {
        let payload = builder()
            .build_create_auction(&CreateAuctionParams {
                auction_id: AuctionId::from(1_708_425_600_123_456u64),
                item_id: None,
                min_bid: 1_000,
                commit_duration: DEFAULT_COMMIT_DURATION,
                reveal_duration: DEFAULT_REVEAL_DURATION,
            })
            .unwrap();

        assert_eq!(payload.program_id, "aloe_auction_v2.aleo");
        assert_eq!(payload.function_name, "create_auction");
        assert_eq!(
            payload.inputs,
            vec![
                "1708425600123456field",
                "1708425600123456field",
                "1000u64",
                "360u32",
                "180u32"
            ]
        );
        assert_eq!(payload.fee, 100_000);
        assert!(payload.metadata.is_none());
    }

    #[test]
    fn test_create_auction_validation() {
        let params = CreateAuctionParams {
            auction_id: AuctionId::from(1u64),
            item_id: Some(FieldElement::from(2u64)),
            min_bid: 999,
            commit_duration: 10,
            reveal_duration: 10,
        };
        assert!(matches!(
            builder().build_create_auction(&params),
            Err(BuildError::MinBidTooLow { min_bid: 999, floor: 1_000 })
        ));

        let params = CreateAuctionParams {
            min_bid: 1_000,
            commit_duration: 0,
            ..params
        };
        assert!(matches!(
            builder().build_create_auction(&params),
            Err(BuildError::ZeroDuration("commit_duration"))
        ));
    }

    #[test]
    fn test_place_bid_default_deposit() {
        let payload = builder()
            .build_place_bid(&PlaceBidParams::new(AuctionId::from(7u64), 500_000))
            .unwrap();

        assert_eq!(payload.function_name, "place_bid");
        assert_eq!(payload.inputs.len(), 4);
        assert_eq!(payload.inputs[0], "7field");
        assert_eq!(payload.inputs[1], "500000u64");
        assert!(payload.inputs[2].ends_with("field"));
        assert_eq!(payload.inputs[3], "500000u64");
        assert_eq!(payload.fee, 500_000);

        let metadata = payload.metadata.unwrap();
        assert_eq!(metadata.deposit, 500_000);
        assert_eq!(metadata.salt.literal(), payload.inputs[2]);
    }

    #[test]
    fn test_place_bid_with_record_and_deposit() {
        let params = PlaceBidParams {
            salt: Some(FieldElement::from(123u64)),
            deposit: Some(600_000),
            payment_record: Some("{ owner: aleo1..., microcredits: 900000u64.private }".into()),
            ..PlaceBidParams::new(AuctionId::from(7u64), 500_000)
        };
        let payload = builder().build_place_bid(&params).unwrap();
        assert_eq!(
            &payload.inputs[..4],
            &["7field", "500000u64", "123field", "600000u64"]
        );
        assert_eq!(payload.inputs[4], params.payment_record.unwrap());
    }

    #[test]
    fn test_place_bid_rejects_bad_amounts() {
        let params = PlaceBidParams {
            deposit: Some(10),
            ..PlaceBidParams::new(AuctionId::from(7u64), 11)
        };
        assert!(matches!(
            builder().build_place_bid(&params),
            Err(BuildError::DepositBelowBid { bid: 11, deposit: 10 })
        ));
        assert!(matches!(
            builder().build_place_bid(&PlaceBidParams::new(AuctionId::from(7u64), 0)),
            Err(BuildError::ZeroBid)
        ));
    }

    #[test]
    fn test_reveal_reproduces_commit_inputs() {
        let placed = builder()
            .build_place_bid(&PlaceBidParams::new(AuctionId::from(42u64), 12_345))
            .unwrap();
        let metadata = placed.metadata.clone().unwrap();
        let secret = BidSecret::new(
            metadata.auction_id,
            metadata.bid_amount,
            metadata.salt,
            metadata.deposit,
            0,
        );

        let opening = BidOpening::from_secret(&secret);
        let reveal = builder().build_reveal_bid(&opening).unwrap();
        assert_eq!(reveal.function_name, "reveal_bid");
        assert_eq!(reveal.inputs, placed.inputs);
        assert_eq!(reveal.fee, 500_000);

        let refund = builder().build_claim_refund(&opening).unwrap();
        assert_eq!(refund.function_name, "claim_refund");
        assert_eq!(refund.inputs, placed.inputs);
    }

    #[test]
    fn test_reveal_default_deposit() {
        let opening = BidOpening {
            auction_id: AuctionId::from(3u64),
            bid_amount: 2_000,
            salt: FieldElement::from(55u64),
            deposit: None,
        };
        let payload = builder().build_reveal_bid(&opening).unwrap();
        assert_eq!(payload.inputs, vec!["3field", "2000u64", "55field", "2000u64"]);
    }

    #[test]
    fn test_settle_and_cancel_encoding() {
        let auctioneer = addr('a');
        let settle = builder().build_settle_auction(&SettleParams {
            auction_id: AuctionId::from(5u64),
            auctioneer: auctioneer.clone(),
            winning_amount: 75_000,
        });
        assert_eq!(settle.function_name, "settle_auction");
        assert_eq!(
            settle.inputs,
            vec!["5field".to_string(), auctioneer.to_string(), "75000u64".to_string()]
        );
        assert_eq!(settle.fee, 500_000);

        let cancel = builder().build_cancel_auction(&AuctionId::from(5u64));
        assert_eq!(cancel.function_name, "cancel_auction");
        assert_eq!(cancel.inputs, vec!["5field"]);
        assert_eq!(cancel.fee, 100_000);
    }

    #[test]
    fn test_shield_credits() {
        let recipient = addr('r');
        let payload = builder()
            .build_shield_credits(&ShieldCreditsParams {
                recipient: recipient.clone(),
                amount: 2_500_000,
            })
            .unwrap();
        assert_eq!(payload.program_id, "credits.aleo");
        assert_eq!(payload.function_name, "transfer_public_to_private");
        assert_eq!(
            payload.inputs,
            vec![recipient.to_string(), "2500000u64".to_string()]
        );
        assert_eq!(payload.fee, 100_000);

        assert!(matches!(
            builder().build_shield_credits(&ShieldCreditsParams { recipient, amount: 0 }),
            Err(BuildError::ZeroAmount)
        ));
    }

    #[test]
    fn test_custom_program() {
        let payload = OperationBuilder::new("other_auction.aleo")
            .build_cancel_auction(&AuctionId::from(1u64));
        assert_eq!(payload.program_id, "other_auction.aleo");
    }

    #[test]
    fn test_payment_record_selection() {
        let small = "{\n  owner: aleo1x.private,\n  microcredits: 100u64.private,\n  _nonce: 1group.public\n}";
        let large = "{\n  owner: aleo1x.private,\n  microcredits: 900000u64.private,\n  _nonce: 2group.public\n}";
        assert_eq!(record_microcredits(small), Some(100));
        assert_eq!(record_microcredits("not a record"), None);

        assert_eq!(select_payment_record([small, large], 500_000), Some(large));
        assert_eq!(select_payment_record([small], 500_000), None);
    }
}
