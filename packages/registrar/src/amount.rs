//! Decimal amount codec
//!
//! Operator configuration carries human amounts ("1.5", "0.001", "20000").
//! They are converted to token base units with exact integer arithmetic: the
//! digits are read as a mantissa, scaled by the number of fractional digits
//! actually present, and widened to the token's decimals. No floating point is
//! involved after the text has been split into digits.

use alloy::primitives::{I256, U256};

use crate::error::AmountError;

/// Fee rates are stored on-chain in thousandths
pub const FEE_RATE_DECIMALS: u8 = 3;

/// Digits of a non-negative decimal literal, trailing fractional zeros dropped
struct DecimalDigits<'a> {
    integer: &'a str,
    fraction: &'a str,
}

fn split_decimal(value: &str) -> Result<DecimalDigits<'_>, AmountError> {
    let malformed = || AmountError::Malformed {
        value: value.to_string(),
    };

    let (integer, fraction) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };
    if integer.is_empty() && fraction.is_empty() {
        return Err(malformed());
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer) || !all_digits(fraction) {
        return Err(malformed());
    }

    Ok(DecimalDigits {
        integer,
        fraction: fraction.trim_end_matches('0'),
    })
}

fn accumulate(acc: U256, digits: &str, raw: &str) -> Result<U256, AmountError> {
    digits.bytes().try_fold(acc, |acc, b| {
        acc.checked_mul(U256::from(10u8))
            .and_then(|v| v.checked_add(U256::from(b - b'0')))
            .ok_or_else(|| AmountError::Overflow {
                value: raw.to_string(),
            })
    })
}

fn pow10(exp: usize, raw: &str) -> Result<U256, AmountError> {
    (0..exp).try_fold(U256::from(1u8), |acc, _| {
        acc.checked_mul(U256::from(10u8))
            .ok_or_else(|| AmountError::Overflow {
                value: raw.to_string(),
            })
    })
}

/// Convert a decimal amount to an integer with `decimals` fractional digits.
///
/// Fails when the input has more significant fractional digits than the
/// token supports.
pub fn to_fixed_point(value: &str, decimals: u8) -> Result<U256, AmountError> {
    let value = value.trim();
    let digits = split_decimal(value)?;
    let present = digits.fraction.len();
    if present > decimals as usize {
        return Err(AmountError::TooPrecise {
            value: value.to_string(),
            digits: present,
            decimals,
        });
    }

    let mantissa = accumulate(U256::ZERO, digits.integer, value)?;
    let mantissa = accumulate(mantissa, digits.fraction, value)?;
    let scale = pow10(decimals as usize - present, value)?;
    mantissa.checked_mul(scale).ok_or_else(|| AmountError::Overflow {
        value: value.to_string(),
    })
}

/// Magnitude of a signed amount
pub fn absolute_value(value: I256) -> U256 {
    value.unsigned_abs()
}

/// Scale a liquidity fee rate to thousandths, rounding half up.
///
/// `"0.03"` becomes `30`, `"0.0015"` becomes `2`.
pub fn scale_rate(value: &str) -> Result<u64, AmountError> {
    let value = value.trim();
    let digits = split_decimal(value)?;
    let places = FEE_RATE_DECIMALS as usize;

    let kept = &digits.fraction[..digits.fraction.len().min(places)];
    let mut scaled = accumulate(U256::ZERO, digits.integer, value)?;
    scaled = accumulate(scaled, kept, value)?;
    scaled = scaled
        .checked_mul(pow10(places - kept.len(), value)?)
        .ok_or_else(|| AmountError::Overflow {
            value: value.to_string(),
        })?;

    if digits.fraction.as_bytes().get(places).is_some_and(|b| *b >= b'5') {
        scaled += U256::from(1u8);
    }

    u64::try_from(scaled).map_err(|_| AmountError::OutOfRange {
        field: "liquidity_fee_rate",
        value: value.to_string(),
        bits: 64,
    })
}
