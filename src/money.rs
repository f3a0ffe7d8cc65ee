//! Fixed-point currency amounts and interest rates.
//!
//! Ken Kash never touches binary floating point: amounts are whole cents and
//! rates are exact decimals.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::Error;

/// An amount of Ken Kash with exactly two decimal places.
///
/// Stored in the database as an integer number of cents and serialized as a
/// decimal string, e.g. `"30.00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Zero Ken Kash.
    pub const ZERO: Money = Money { cents: 0 };

    /// Create an amount from a whole number of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// The amount as a whole number of cents.
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// The amount as an exact decimal with a scale of two.
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Whether the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Add two amounts, returning `None` on overflow.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }

    /// The interest earned on this amount for one period at `rate`.
    ///
    /// The product is truncated toward zero at two decimal places, so interest
    /// is never rounded up: `10.00 × 0.333 = 3.33`, `100.00 × 0.0005479 = 0.05`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidMoney] if the product does not fit in a [Money].
    pub fn interest_at(&self, rate: InterestRate) -> Result<Money, Error> {
        let interest = self
            .as_decimal()
            .checked_mul(rate.as_decimal())
            .ok_or_else(|| Error::InvalidMoney(format!("{self} × {rate} overflows")))?
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);

        Money::try_from(interest)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = Error;

    /// Convert a decimal into [Money].
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidMoney] if `value` has more than two decimal
    /// places (after trailing zeros are removed) or is too large.
    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let normalized = value.normalize();

        if normalized.scale() > 2 {
            return Err(Error::InvalidMoney(format!(
                "{value} has more than two decimal places"
            )));
        }

        (normalized * Decimal::ONE_HUNDRED)
            .to_i64()
            .map(Money::from_cents)
            .ok_or_else(|| Error::InvalidMoney(format!("{value} is out of range")))
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.as_decimal()
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|error| Error::InvalidMoney(error.to_string()))?;

        Money::try_from(decimal)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_decimal().fmt(f)
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.cents))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Money::from_cents)
    }
}

/// The fraction of an account's balance paid as interest each period.
///
/// Stored in the database as decimal text so that rates such as `0.2 / 365`
/// survive a round trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterestRate(Decimal);

impl InterestRate {
    /// A rate that never accrues interest.
    pub const ZERO: InterestRate = InterestRate(Decimal::ZERO);

    /// Create a new interest rate.
    pub fn new(rate: Decimal) -> Self {
        Self(rate)
    }

    /// The rate as a decimal fraction.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether the rate is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl Display for InterestRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for InterestRate {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for InterestRate {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Decimal::from_str(text)
            .map(InterestRate)
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}
