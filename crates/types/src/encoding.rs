//! Ledger literal encoding.
//!
//! Every public input the auction program accepts is a typed literal: the
//! decimal integer immediately followed by its type suffix (`42u64`,
//! `7field`). Account addresses are passed bare. A wrong suffix or a wrong
//! width makes the ledger reject the whole transaction, so the helpers here
//! are the only place literals are produced or parsed.

use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// Order of the ledger's base field. Field elements must be strictly below it.
pub const FIELD_MODULUS: &str =
    "8444461749428370424248824938781546531375899335154063827935233455917409239041";

pub const FIELD_SUFFIX: &str = "field";
pub const U64_SUFFIX: &str = "u64";
pub const U32_SUFFIX: &str = "u32";
pub const U8_SUFFIX: &str = "u8";

/// Human-readable prefix of account addresses.
pub const ADDRESS_PREFIX: &str = "aleo1";

/// Total length of an encoded account address.
pub const ADDRESS_LEN: usize = 63;

/// Address whose key material is all zeroes; the program stores it when a
/// struct slot has no account yet.
pub const ZERO_ADDRESS: &str = "aleo1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq3ljyzc";

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Errors produced while parsing ledger literals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("Empty literal")]
    Empty,

    #[error("Missing `{expected}` suffix in literal: {literal}")]
    MissingSuffix {
        expected: &'static str,
        literal: String,
    },

    #[error("Not a decimal integer: {0}")]
    NotDecimal(String),

    #[error("Value does not fit in {width}: {literal}")]
    Overflow {
        width: &'static str,
        literal: String,
    },

    #[error("Field element out of range: {0}")]
    FieldOutOfRange(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// A ledger field element, kept as its canonical decimal digits.
///
/// `Display` renders the typed literal (`123field`); `FromStr` accepts the
/// digits with or without the suffix.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct FieldElement(String);

impl FieldElement {
    /// Parse bare decimal digits (no suffix).
    pub fn from_decimal(digits: &str) -> Result<Self, EncodingError> {
        if digits.is_empty() {
            return Err(EncodingError::Empty);
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EncodingError::NotDecimal(digits.to_string()));
        }

        let trimmed = digits.trim_start_matches('0');
        let canonical = if trimmed.is_empty() { "0" } else { trimmed };

        let in_range = canonical.len() < FIELD_MODULUS.len()
            || (canonical.len() == FIELD_MODULUS.len() && canonical < FIELD_MODULUS);
        if !in_range {
            return Err(EncodingError::FieldOutOfRange(digits.to_string()));
        }

        Ok(Self(canonical.to_string()))
    }

    /// Canonical decimal digits without the type suffix.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Typed ledger literal, e.g. `123field`.
    pub fn literal(&self) -> String {
        format!("{}{}", self.0, FIELD_SUFFIX)
    }

    /// The value as a `u128`, if it fits.
    pub fn to_u128(&self) -> Option<u128> {
        self.0.parse().ok()
    }
}

impl From<u128> for FieldElement {
    fn from(value: u128) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for FieldElement {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::from_decimal(s.strip_suffix(FIELD_SUFFIX).unwrap_or(s))
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0, FIELD_SUFFIX)
    }
}

/// A ledger account address (`aleo1...`), validated for shape only.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the all-zero placeholder address.
    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }
}

impl FromStr for Address {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| EncodingError::InvalidAddress(s.to_string()))?;
        if s.len() != ADDRESS_LEN || !body.chars().all(|c| BECH32_CHARSET.contains(c)) {
            return Err(EncodingError::InvalidAddress(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `500000` -> `500000u64`
pub fn u64_literal(value: u64) -> String {
    format!("{value}{U64_SUFFIX}")
}

/// `360` -> `360u32`
pub fn u32_literal(value: u32) -> String {
    format!("{value}{U32_SUFFIX}")
}

pub fn parse_u64_literal(literal: &str) -> Result<u64, EncodingError> {
    parse_suffixed(literal, U64_SUFFIX)
}

pub fn parse_u32_literal(literal: &str) -> Result<u32, EncodingError> {
    parse_suffixed(literal, U32_SUFFIX)
}

pub fn parse_u8_literal(literal: &str) -> Result<u8, EncodingError> {
    parse_suffixed(literal, U8_SUFFIX)
}

fn parse_suffixed<T: FromStr>(literal: &str, suffix: &'static str) -> Result<T, EncodingError> {
    let literal = literal.trim();
    if literal.is_empty() {
        return Err(EncodingError::Empty);
    }
    let digits = literal
        .strip_suffix(suffix)
        .ok_or_else(|| EncodingError::MissingSuffix {
            expected: suffix,
            literal: literal.to_string(),
        })?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EncodingError::NotDecimal(literal.to_string()));
    }
    digits.parse().map_err(|_| EncodingError::Overflow {
        width: suffix,
        literal: literal.to_string(),
    })
}
