//! Randomness for sealed bids.
//!
//! A sealed bid is committed on-chain as a hash over the bid amount, a secret
//! salt and the deposit. The salt blinds the commitment so that small bid
//! amounts cannot be brute-forced from the public hash; it therefore has to
//! come from a cryptographically secure source and be representable as a
//! ledger field element.
//!
//! The commitment itself is recomputed by the ledger from the raw fields at
//! reveal time, so this crate only produces the random inputs.

pub mod error;
pub mod salt;

pub use error::CryptoError;
pub use salt::{generate_auction_id, generate_salt, generate_salt_with, SALT_BYTES};
