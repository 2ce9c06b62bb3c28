//! Strict decoding of ledger API responses.
//!
//! The explorer API returns mapping values as JSON strings holding the
//! program's plaintext, e.g.
//!
//! ```text
//! "{\n  auctioneer: aleo1...,\n  commit_deadline: 100u32,\n  status: 1u8\n}"
//! ```
//!
//! Every value must carry its type suffix. Anything that does not match the
//! schema is a [`DecodeError`]; whether that is fatal is decided by the caller.

use std::collections::BTreeMap;

use auction_types::{
    parse_u32_literal, parse_u64_literal, parse_u8_literal, Address, AuctionStatus, EncodingError,
    FieldElement, OnChainAuction,
};

use crate::error::DecodeError;

/// Visibility modifiers the ledger may append to plaintext values.
const VISIBILITY_SUFFIXES: [&str; 2] = [".public", ".private"];

/// Split a struct plaintext into its `key: value` entries.
pub fn parse_struct(text: &str) -> Result<BTreeMap<String, String>, DecodeError> {
    let text = text.trim();
    let inner = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| DecodeError::NotAStruct(text.to_string()))?;

    let mut fields = BTreeMap::new();
    for entry in inner.split([',', '\n']) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (key, value) = entry
            .split_once(':')
            .ok_or_else(|| DecodeError::MalformedEntry(entry.to_string()))?;
        let key = key.trim();
        let value = strip_visibility(value.trim());
        if key.is_empty()
            || value.is_empty()
            || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(DecodeError::MalformedEntry(entry.to_string()));
        }
        if fields.insert(key.to_string(), value.to_string()).is_some() {
            return Err(DecodeError::DuplicateField(key.to_string()));
        }
    }
    Ok(fields)
}

fn strip_visibility(value: &str) -> &str {
    VISIBILITY_SUFFIXES
        .iter()
        .find_map(|suffix| value.strip_suffix(suffix))
        .unwrap_or(value)
}

/// Decode the program's auction struct.
///
/// `commit_deadline`, `reveal_deadline` and `status` are required. The zero
/// address in `winner` decodes as "no winner yet".
pub fn decode_auction(text: &str) -> Result<OnChainAuction, DecodeError> {
    let fields = parse_struct(text)?;

    let status_code = required(&fields, "status", parse_u8_literal)?;
    let status =
        AuctionStatus::from_code(status_code).ok_or(DecodeError::UnknownStatus(status_code))?;

    let winner = optional(&fields, "winner", |s| s.parse::<Address>())?.filter(|a| !a.is_zero());
    let winning_bid = optional(&fields, "winning_bid", parse_u64_literal)?;

    Ok(OnChainAuction {
        auctioneer: optional(&fields, "auctioneer", |s| s.parse::<Address>())?,
        item_id: optional(&fields, "item_id", parse_field_literal)?,
        min_bid: optional(&fields, "min_bid", parse_u64_literal)?,
        commit_deadline: required(&fields, "commit_deadline", parse_u32_literal)?,
        reveal_deadline: required(&fields, "reveal_deadline", parse_u32_literal)?,
        status,
        winning_bid: winning_bid.filter(|amount| *amount > 0 || winner.is_some()),
        winner,
    })
}

fn required<T>(
    fields: &BTreeMap<String, String>,
    field: &'static str,
    parse: impl Fn(&str) -> Result<T, EncodingError>,
) -> Result<T, DecodeError> {
    optional(fields, field, parse)?.ok_or(DecodeError::MissingField(field))
}

fn optional<T>(
    fields: &BTreeMap<String, String>,
    field: &'static str,
    parse: impl Fn(&str) -> Result<T, EncodingError>,
) -> Result<Option<T>, DecodeError> {
    fields
        .get(field)
        .map(|value| parse(value).map_err(|source| DecodeError::InvalidValue { field, source }))
        .transpose()
}

/// Field literals inside plaintext always carry the suffix.
fn parse_field_literal(value: &str) -> Result<FieldElement, EncodingError> {
    let digits = value
        .strip_suffix(auction_types::encoding::FIELD_SUFFIX)
        .ok_or_else(|| EncodingError::MissingSuffix {
            expected: auction_types::encoding::FIELD_SUFFIX,
            literal: value.to_string(),
        })?;
    FieldElement::from_decimal(digits)
}

/// Unwrap a mapping response body: JSON `null` is absent, a JSON string is
/// the plaintext value.
pub fn decode_mapping_body(body: &str) -> Result<Option<String>, DecodeError> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Null) => Ok(None),
        Ok(serde_json::Value::String(value)) => Ok(Some(value)),
        _ => Err(DecodeError::UnexpectedBody(truncate(body))),
    }
}

/// The latest-height endpoint returns a bare JSON number.
pub fn decode_block_height(body: &str) -> Result<u32, DecodeError> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.as_u64())
        .and_then(|h| u32::try_from(h).ok())
        .ok_or_else(|| DecodeError::UnexpectedBody(truncate(body)))
}

/// `highest_bids` values are `u64` literals.
pub fn decode_highest_bid(value: &str) -> Result<u64, DecodeError> {
    parse_u64_literal(strip_visibility(value.trim())).map_err(|source| DecodeError::InvalidValue {
        field: "highest_bid",
        source,
    })
}

/// `bid_counts` values are counters; both `u32` and `u64` literals are
/// accepted as long as the count fits in `u32`.
pub fn decode_bid_count(value: &str) -> Result<u32, DecodeError> {
    let value = strip_visibility(value.trim());
    let count = parse_u32_literal(value).or_else(|_| {
        parse_u64_literal(value).and_then(|wide| {
            u32::try_from(wide).map_err(|_| EncodingError::Overflow {
                width: "u32",
                literal: value.to_string(),
            })
        })
    });
    count.map_err(|source| DecodeError::InvalidValue {
        field: "bid_count",
        source,
    })
}

fn truncate(body: &str) -> String {
    body.chars().take(120).collect()
}
