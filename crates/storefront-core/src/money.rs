//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The commerce backend sends amounts as decimal STRINGS: "19.99"         │
//! │  Parsing them into f64 and back can print "19.989999999999998"          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    "19.99" ──parse──► Money(1999) ──display──► "19.99"                  │
//! │    Exact in both directions, no rounding anywhere                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client never computes totals itself (the backend's snapshot is the
//! only source of truth), so `Money` only parses, compares and formats.
//!
//! ## Usage
//! ```rust
//! use storefront_core::money::Money;
//!
//! let price: Money = "10.5".parse().unwrap();
//! assert_eq!(price.minor_units(), 1050);
//! assert_eq!(price.to_string(), "10.50");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Number of fraction digits carried in minor units.
const MINOR_DIGITS: usize = 2;

/// Minor units per major unit.
const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for USD).
///
/// ## Wire Format
/// Serialized as the backend's decimal string (`"19.99"`), never as a
/// JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let price = Money::from_minor_units(1099);
    /// assert_eq!(price.to_string(), "10.99");
    /// ```
    #[inline]
    pub const fn from_minor_units(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses a backend decimal string.
    ///
    /// ## Accepted Forms
    /// ```text
    /// "10"      → 1000
    /// "10.5"    → 1050
    /// "10.50"   → 1050
    /// "10.500"  → 1050   (trailing zeros beyond cents are fine)
    /// "-3.25"   → -325
    /// "1.005"   → error  (sub-cent precision would be lost)
    /// ```
    pub fn parse_decimal(value: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidAmount {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = value.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }

        if let Some(bad) = whole.chars().chain(fraction.chars()).find(|c| !c.is_ascii_digit()) {
            return Err(invalid(&format!("unexpected character '{}'", bad)));
        }

        if fraction.len() > MINOR_DIGITS && fraction[MINOR_DIGITS..].chars().any(|c| c != '0') {
            return Err(invalid("more than two fraction digits"));
        }

        let major: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount out of range"))?
        };

        let mut minor_digits: String = fraction.chars().take(MINOR_DIGITS).collect();
        while minor_digits.len() < MINOR_DIGITS {
            minor_digits.push('0');
        }
        let minor: i64 = minor_digits
            .parse()
            .map_err(|_| invalid("amount out of range"))?;

        let magnitude = major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(minor))
            .ok_or_else(|| invalid("amount out of range"))?;

        Ok(Money(if negative { -magnitude } else { magnitude }))
    }
}

/// Renders the backend decimal form, always with two fraction digits.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl FromStr for Money {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse_decimal(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Money::parse_decimal(&raw).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Money With Currency
// =============================================================================

/// An amount paired with its ISO 4217 currency code.
///
/// ## Display
/// `"25.00 USD"`: the decimal string with currency suffix that cart totals
/// are shown as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MoneyAmount {
    /// Decimal amount.
    #[ts(type = "string")]
    pub amount: Money,

    /// ISO 4217 currency code ("USD", "EUR", ...).
    pub currency_code: String,
}

impl MoneyAmount {
    /// Creates a new amount in the given currency.
    pub fn new(amount: Money, currency_code: impl Into<String>) -> Self {
        MoneyAmount {
            amount,
            currency_code: currency_code.into(),
        }
    }

    /// Zero in the given currency.
    pub fn zero(currency_code: impl Into<String>) -> Self {
        MoneyAmount::new(Money::zero(), currency_code)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency_code)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
