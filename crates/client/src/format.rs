//! Display helpers for amounts, durations and identifiers.

use thiserror::Error;

use crate::wallet::TRANSACTION_ID_PREFIX;

pub const MICROCREDITS_PER_CREDIT: u64 = 1_000_000;
const CREDIT_DECIMALS: usize = 6;

/// Blocks per minute at the default block time.
pub const BLOCKS_PER_MINUTE: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Not a credit amount: {0}")]
    Invalid(String),

    #[error("At most 6 decimal places are allowed: {0}")]
    TooPrecise(String),

    #[error("Amount too large: {0}")]
    Overflow(String),
}

/// `1500000` -> `1.5 credits`, `1234000000` -> `1,234 credits`
pub fn format_credits(microcredits: u64) -> String {
    let whole = microcredits / MICROCREDITS_PER_CREDIT;
    let frac = microcredits % MICROCREDITS_PER_CREDIT;

    let mut out = group_thousands(whole);
    if frac > 0 {
        let digits = format!("{frac:0width$}", width = CREDIT_DECIMALS);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out.push_str(" credits");
    out
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Parse a decimal credit amount into microcredits without rounding.
pub fn parse_credits_to_micro(input: &str) -> Result<u64, AmountError> {
    let s = input.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));

    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
        return Err(AmountError::Invalid(input.to_string()));
    }
    if frac.len() > CREDIT_DECIMALS {
        return Err(AmountError::TooPrecise(input.to_string()));
    }

    let overflow = || AmountError::Overflow(input.to_string());
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<width$}", width = CREDIT_DECIMALS)
            .parse()
            .map_err(|_| overflow())?
    };

    whole
        .checked_mul(MICROCREDITS_PER_CREDIT)
        .and_then(|micro| micro.checked_add(frac))
        .ok_or_else(overflow)
}

/// Approximate wall time of a block count: `~30 min`, `~1 hour`, `~2 days`.
pub fn format_block_duration(blocks: u32) -> String {
    let minutes = round_div(blocks, BLOCKS_PER_MINUTE);
    if minutes < 60 {
        return format!("~{minutes} min");
    }
    let hours = round_div(minutes, 60);
    if hours < 24 {
        return format!("~{hours} {}", plural(hours, "hour"));
    }
    let days = round_div(hours, 24);
    format!("~{days} {}", plural(days, "day"))
}

/// Half-up rounding division.
fn round_div(n: u32, d: u32) -> u32 {
    n / d + u32::from(n % d * 2 >= d)
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        unit.to_string()
    } else {
        format!("{unit}s")
    }
}

/// Countdown text for `blocks_left` blocks: `1h 5m`, `4m 10s` or `30s`.
pub fn format_countdown(blocks_left: u32, block_time_secs: u64) -> String {
    let total = u64::from(blocks_left).saturating_mul(block_time_secs);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// `aleo1abcdef...uvwxyz` style shortening; short input is returned as is.
pub fn truncate_address(address: &str, chars: usize) -> String {
    let symbols: Vec<char> = address.chars().collect();
    if symbols.len() <= chars * 2 + 3 {
        return address.to_string();
    }
    let head: String = symbols[..chars + 5].iter().collect();
    let tail: String = symbols[symbols.len() - chars..].iter().collect();
    format!("{head}...{tail}")
}

/// Whether a wallet returned a ledger transaction id rather than a local
/// placeholder.
pub fn is_real_transaction(tx_id: &str) -> bool {
    tx_id.len() > TRANSACTION_ID_PREFIX.len() && tx_id.starts_with(TRANSACTION_ID_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_credits() {
        assert_eq!(format_credits(0), "0 credits");
        assert_eq!(format_credits(1_500_000), "1.5 credits");
        assert_eq!(format_credits(1), "0.000001 credits");
        assert_eq!(format_credits(1_234_000_000), "1,234 credits");
        assert_eq!(format_credits(999_999), "0.999999 credits");
    }

    #[test]
    fn test_parse_credits_exact() {
        assert_eq!(parse_credits_to_micro("1.5"), Ok(1_500_000));
        assert_eq!(parse_credits_to_micro("0.000001"), Ok(1));
        assert_eq!(parse_credits_to_micro("2"), Ok(2_000_000));
        assert_eq!(parse_credits_to_micro(".25"), Ok(250_000));
        assert_eq!(parse_credits_to_micro("3."), Ok(3_000_000));
        // Floating point would give 0.29999999...
        assert_eq!(parse_credits_to_micro("0.3"), Ok(300_000));
    }

    #[test]
    fn test_parse_credits_rejects() {
        assert!(matches!(parse_credits_to_micro(""), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_credits_to_micro("."), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_credits_to_micro("-1"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_credits_to_micro("1e6"), Err(AmountError::Invalid(_))));
        assert!(matches!(
            parse_credits_to_micro("0.0000001"),
            Err(AmountError::TooPrecise(_))
        ));
        assert!(matches!(
            parse_credits_to_micro("18446744073710"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_block_duration() {
        assert_eq!(format_block_duration(180), "~30 min");
        assert_eq!(format_block_duration(360), "~1 hour");
        assert_eq!(format_block_duration(1_440), "~4 hours");
        assert_eq!(format_block_duration(8_640), "~1 day");
        assert_eq!(format_block_duration(20_000), "~2 days");
    }

    #[test]
    fn test_countdown() {
        assert_eq!(format_countdown(390, 10), "1h 5m");
        assert_eq!(format_countdown(25, 10), "4m 10s");
        assert_eq!(format_countdown(3, 10), "30s");
        assert_eq!(format_countdown(0, 10), "0s");
    }

    #[test]
    fn test_truncate_address() {
        let address = format!("aleo1{}", "q".repeat(58));
        let short = truncate_address(&address, 6);
        assert_eq!(short, "aleo1qqqqqq...qqqqqq");
        assert_eq!(truncate_address("aleo1abc", 6), "aleo1abc");
    }

    #[test]
    fn test_real_transaction() {
        assert!(is_real_transaction("at1xyz"));
        assert!(!is_real_transaction("at1"));
        assert!(!is_real_transaction("local-123"));
    }
}
