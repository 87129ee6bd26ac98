//! Money Conversion Module
//!
//! Conversion between the internal `u64` minor-unit representation and the
//! client-facing string/Decimal representation. All conversions MUST go
//! through this module.
//!
//! ## Design Principles
//! 1. Exact: amounts are integer cents, never floats
//! 2. Explicit Error Handling: no silent truncation or rounding
//! 3. Type Safety: [`Amount`] wraps the raw value
//!
//! ## Usage
//! ```
//! use bank_ledger::money::{Amount, parse_amount, format_amount};
//!
//! let internal = parse_amount("250.5", 2).unwrap();
//! assert_eq!(internal, 25_050);
//! assert_eq!(format_amount(internal, 2, 2), "250.50");
//!
//! let amount: Amount = "250.00".parse().unwrap();
//! assert_eq!(amount.to_string(), "250.00");
//! ```

use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::IntErrorKind;
use thiserror::Error;

/// Fractional digits of the ledger currency
pub const CURRENCY_DECIMALS: u32 = 2;

/// Raw scaled value (cents)
pub type ScaledAmount = u64;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Client → Internal (String/Decimal → u64)
// ============================================================================

/// Convert a client string amount to the internal scaled value.
///
/// Strict: rejects signs, exponents, separators, `.5`, `5.`, more fractional
/// digits than `decimals`, and zero.
///
/// # Errors
/// * `PrecisionOverflow` - input has more decimal places than allowed
/// * `InvalidAmount` - amount is zero or signed
/// * `Overflow` - result would overflow u64
/// * `InvalidFormat` - anything else that is not a plain decimal
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<ScaledAmount, MoneyError> {
    let amount = parse_scaled(amount_str, decimals)?;
    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }
    Ok(amount)
}

/// Like [`parse_amount`] but accepts zero. Used for balances and config values.
pub fn parse_balance(amount_str: &str, decimals: u32) -> Result<ScaledAmount, MoneyError> {
    parse_scaled(amount_str, decimals)
}

fn parse_scaled(amount_str: &str, decimals: u32) -> Result<ScaledAmount, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let (whole, frac) = match amount_str.split_once('.') {
        None => (amount_str, ""),
        Some((whole, frac)) => {
            // Require both sides of the dot: ".5" and "5." are ambiguous
            if whole.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if frac.is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            if decimals == 0 {
                return Err(MoneyError::InvalidFormat(
                    "decimals is 0, but dot provided".into(),
                ));
            }
            (whole, frac)
        }
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in whole part: {}",
            whole
        )));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in fractional part: {}",
            frac
        )));
    }

    // REJECT extra precision (no silent truncation!)
    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let whole_num: u64 = whole.parse::<u64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => MoneyError::Overflow,
        _ => MoneyError::InvalidFormat(format!("invalid whole part: {}", whole)),
    })?;

    let frac_num: u64 = if frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
        frac_padded
            .parse::<u64>()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let multiplier = 10u64.checked_pow(decimals).ok_or(MoneyError::Overflow)?;
    whole_num
        .checked_mul(multiplier)
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)
}

/// Convert a Decimal to the internal scaled value.
///
/// JSON numbers reach the ledger this way, so `12.5` is checked for scale
/// exactly like `"12.5"`.
pub fn parse_decimal(decimal: Decimal, decimals: u32) -> Result<ScaledAmount, MoneyError> {
    if decimal.is_sign_negative() || decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    if decimal.scale() > decimals {
        return Err(MoneyError::PrecisionOverflow {
            provided: decimal.scale(),
            max: decimals,
        });
    }

    let multiplier = Decimal::from(10u64.checked_pow(decimals).ok_or(MoneyError::Overflow)?);
    let result = decimal
        .checked_mul(multiplier)
        .ok_or(MoneyError::Overflow)?;

    if !result.fract().is_zero() {
        return Err(MoneyError::PrecisionOverflow {
            provided: decimal.scale(),
            max: decimals,
        });
    }

    result.to_u64().ok_or(MoneyError::Overflow)
}

// ============================================================================
// Format: Internal → Client (u64 → String)
// ============================================================================

/// Convert an internal scaled value to a display string
pub fn format_amount(value: ScaledAmount, decimals: u32, display_decimals: u32) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(decimals));
    format!("{:.prec$}", decimal_value, prec = display_decimals as usize)
}

// ============================================================================
// Amount
// ============================================================================

/// An exact, non-negative amount of the ledger currency in minor units.
///
/// Serializes as `"250.00"` in human-readable formats (JSON) and as the raw
/// `u64` in binary formats (journal, snapshots).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(ScaledAmount);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: ScaledAmount) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> ScaledAmount {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse a strictly positive amount
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        parse_amount(s, CURRENCY_DECIMALS).map(Self)
    }

    /// Parse an amount that may be zero (balances, configuration)
    pub fn parse_balance(s: &str) -> Result<Self, MoneyError> {
        parse_balance(s, CURRENCY_DECIMALS).map(Self)
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_amount(self.0, CURRENCY_DECIMALS, CURRENCY_DECIMALS))
    }
}

impl std::str::FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        parse_decimal(value, CURRENCY_DECIMALS).map(Self)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Amount::parse_balance(&s).map_err(serde::de::Error::custom)
        } else {
            u64::deserialize(deserializer).map(Amount)
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn qa_parse_amount_variations() {
        assert_eq!(parse_amount("1.23", 2).unwrap(), 123);
        assert_eq!(parse_amount("250", 2).unwrap(), 25_000);
        assert_eq!(parse_amount("0.01", 2).unwrap(), 1);

        // Leading zeros
        assert_eq!(parse_amount("001.20", 2).unwrap(), 120);

        // Zero is not a valid amount to move
        assert_eq!(parse_amount("0", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("0.00", 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_balance("0.00", 2).unwrap(), 0);
    }

    #[test]
    fn qa_parse_amount_invalid_formats() {
        let cases = [
            "1,000.00", // Commas not allowed
            "1.2.3",    // Multiple dots
            "1. 2",     // Spaces inside
            "+1.23",    // Explicit plus rejected
            "-1.23",    // Negative rejected
            "1.+5",     // Sign inside fraction
            "1e2",      // Scientific notation rejected
            "0x12",     // Hex rejected
            ".",        // Just a dot rejected
            ".5",       // Missing leading zero rejected (STRICT)
            "5.",       // Missing fractional part rejected (STRICT)
            "",
            "abc",
        ];

        for case in cases {
            assert!(
                parse_amount(case, 2).is_err(),
                "Should reject invalid format: {}",
                case
            );
        }
    }

    #[test]
    fn qa_parse_amount_precision_limits() {
        assert!(parse_amount("1.23", 2).is_ok());
        assert_eq!(
            parse_amount("1.234", 2),
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        );
        // Trailing zeros still count as precision
        assert!(parse_amount("1.230", 2).is_err());
    }

    #[test]
    fn qa_parse_amount_u64_boundary() {
        assert_eq!(
            parse_amount("184467440737095516.15", 2).unwrap(),
            u64::MAX
        );
        assert_eq!(
            parse_amount("184467440737095516.16", 2),
            Err(MoneyError::Overflow)
        );
        assert_eq!(
            parse_amount("99999999999999999999999", 2),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn qa_parse_decimal_edge_cases() {
        let d = Decimal::from_str("250.00").unwrap();
        assert_eq!(parse_decimal(d, 2).unwrap(), 25_000);

        let d = Decimal::from_str("0.001").unwrap();
        assert!(matches!(
            parse_decimal(d, 2),
            Err(MoneyError::PrecisionOverflow { .. })
        ));

        let d = Decimal::from_str("-5").unwrap();
        assert_eq!(parse_decimal(d, 2), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_decimal(Decimal::ZERO, 2), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(75_000, 2, 2), "750.00");
        assert_eq!(format_amount(5, 2, 2), "0.05");
        assert_eq!(format_amount(0, 2, 2), "0.00");
    }

    #[test]
    fn test_amount_display_and_arithmetic() {
        let a = Amount::parse("1000.00").unwrap();
        let b = Amount::parse("250").unwrap();
        assert_eq!(a.checked_sub(b).unwrap().to_string(), "750.00");
        assert_eq!(a.checked_add(b).unwrap().to_string(), "1250.00");
        assert!(b.checked_sub(a).is_none());
    }

    #[test]
    fn test_amount_serde_modes() {
        let a = Amount::from_cents(25_000);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"250.00\"");
        let back: Amount = serde_json::from_str("\"250.00\"").unwrap();
        assert_eq!(back, a);

        let bytes = bincode::serialize(&a).unwrap();
        assert_eq!(bytes, 25_000u64.to_le_bytes());
        let back: Amount = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, a);
    }
}
