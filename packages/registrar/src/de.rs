//! Serde helpers for operator YAML
//!
//! YAML has no notion of an address: `0x0000000000000000000000000000000000000000`
//! is read back as the integer `0`, and unquoted amounts arrive as numbers.
//! These helpers accept both shapes.

use std::fmt;

use alloy::primitives::Address;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

struct AddressVisitor;

impl<'de> Visitor<'de> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a 0x-prefixed 20-byte hex address")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Address, E> {
        v.trim()
            .parse::<Address>()
            .map_err(|e| E::custom(format!("invalid address {v:?}: {e}")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Address, E> {
        // only the zero address survives a YAML integer round trip
        if v == 0 {
            Ok(Address::ZERO)
        } else {
            Err(E::custom(format!(
                "address parsed as integer {v}; quote it in the YAML file"
            )))
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Address, E> {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::custom(format!("invalid address {v}"))),
        }
    }
}

/// Deserialize an `Address` from a hex string or the integer zero
pub fn address<'de, D: Deserializer<'de>>(d: D) -> Result<Address, D::Error> {
    d.deserialize_any(AddressVisitor)
}

/// Optional variant of [`address`]
pub fn option_address<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Address>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "address")] Address);

    Ok(Option::<Wrapped>::deserialize(d)?.map(|Wrapped(a)| a))
}

/// A decimal amount kept as text until the token decimals are known
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DecimalString(String);

impl DecimalString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DecimalString {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

impl fmt::Display for DecimalString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 2^53, the first integer an f64 can no longer tell from its neighbour
const F64_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Decimal digits that always survive a trip through f64
const F64_DIGITS: usize = 15;

fn significant_digits(text: &str) -> usize {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.trim_start_matches('0').trim_end_matches('0').len()
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = DecimalString;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal amount as string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DecimalString, E> {
        Ok(DecimalString::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DecimalString, E> {
        Ok(DecimalString(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DecimalString, E> {
        Ok(DecimalString(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<DecimalString, E> {
        if !v.is_finite() {
            return Err(E::custom(format!("invalid amount {v}")));
        }
        // Display for f64 is the shortest round-trip form, never exponent notation
        let text = v.to_string();
        if v.abs() >= F64_EXACT_INTEGER || significant_digits(&text) > F64_DIGITS {
            return Err(E::custom(format!(
                "amount parsed as float {text} may have lost digits; quote it in the YAML file"
            )));
        }
        Ok(DecimalString(text))
    }
}

impl<'de> Deserialize<'de> for DecimalString {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(DecimalVisitor)
    }
}
