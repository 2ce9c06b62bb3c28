//! Salt and auction id generation.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

use auction_types::FieldElement;

use crate::error::CryptoError;

/// Bytes of entropy per salt (128 bits).
pub const SALT_BYTES: usize = 16;

/// Random suffix range appended to the millisecond timestamp of new auction ids.
const AUCTION_ID_SPREAD: u64 = 1_000_000;

/// Generate a bid salt from the operating system's secure RNG.
pub fn generate_salt() -> Result<FieldElement, CryptoError> {
    generate_salt_with(&mut OsRng)
}

/// Generate a bid salt from the given secure RNG.
///
/// 128 random bits interpreted big-endian always fit below the field
/// modulus, so the result is a valid field element by construction.
pub fn generate_salt_with<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<FieldElement, CryptoError> {
    let mut bytes = [0u8; SALT_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))?;
    Ok(FieldElement::from(u128::from_be_bytes(bytes)))
}

/// Generate a fresh auction id from a millisecond timestamp.
///
/// `now_ms * 1_000_000 + r` with `r` uniform below one million keeps ids
/// roughly time-ordered while making same-millisecond collisions unlikely.
/// The product is computed in `u128`, so it cannot overflow.
pub fn generate_auction_id<R: Rng + ?Sized>(now_ms: u64, rng: &mut R) -> FieldElement {
    let suffix = rng.gen_range(0..AUCTION_ID_SPREAD);
    let id = u128::from(now_ms) * u128::from(AUCTION_ID_SPREAD) + u128::from(suffix);
    FieldElement::from(id)
}
