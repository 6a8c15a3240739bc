use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{EngineError, Result};

/// decimal places every reported amount is rounded to
pub const CENT_DP: u32 = 2;

/// the single rounding mode used for money: half away from zero
pub const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

fn overflow(operation: &'static str) -> EngineError {
    EngineError::ArithmeticOverflow { operation }
}

/// Money type backed by a fixed-point decimal.
///
/// Values keep full precision until `round_to_cent` is called. Arithmetic is
/// only exposed through checked methods so an out-of-range result surfaces as
/// `EngineError::ArithmeticOverflow` instead of panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const CENT: Money = Money(Decimal::from_parts(1, 0, 0, false, 2));

    /// create from decimal, keeping its precision
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d)
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> std::result::Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str_exact(s)?))
    }

    /// create from whole currency units
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from cents
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, CENT_DP))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// round to the cent using the crate-wide rounding mode
    pub fn round_to_cent(&self) -> Self {
        Money(self.0.round_dp_with_strategy(CENT_DP, ROUNDING))
    }

    /// drop sub-cent precision, rounding toward zero
    pub fn truncate_to_cent(&self) -> Self {
        Money(self.0.round_dp_with_strategy(CENT_DP, RoundingStrategy::ToZero))
    }

    /// true when the value carries no sub-cent precision
    pub fn is_whole_cents(&self) -> bool {
        self.round_to_cent().0 == self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly below zero (negative zero is not negative)
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    pub fn checked_add(self, other: Money) -> Result<Money> {
        self.0.checked_add(other.0).map(Money).ok_or_else(|| overflow("money addition"))
    }

    pub fn checked_sub(self, other: Money) -> Result<Money> {
        self.0.checked_sub(other.0).map(Money).ok_or_else(|| overflow("money subtraction"))
    }

    /// multiply by a rate, unrounded
    pub fn checked_mul_rate(self, rate: Rate) -> Result<Money> {
        self.0.checked_mul(rate.0).map(Money).ok_or_else(|| overflow("rate multiplication"))
    }

    /// multiply by a unit count, unrounded
    pub fn checked_mul_units(self, units: u64) -> Result<Money> {
        self.0
            .checked_mul(Decimal::from(units))
            .map(Money)
            .ok_or_else(|| overflow("unit multiplication"))
    }

    /// `self * numerator / denominator`, multiplying first to keep the
    /// result exact whenever the quotient terminates
    pub fn checked_mul_ratio(self, numerator: u64, denominator: u64) -> Result<Money> {
        if denominator == 0 {
            return Err(overflow("ratio with zero denominator"));
        }
        self.0
            .checked_mul(Decimal::from(numerator))
            .and_then(|v| v.checked_div(Decimal::from(denominator)))
            .map(Money)
            .ok_or_else(|| overflow("ratio multiplication"))
    }

    /// checked sum of an iterator of amounts
    pub fn checked_sum<I>(amounts: I) -> Result<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

/// royalty rate expressed as a fraction (0.10 is 10%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    /// create from decimal (e.g., 0.05 for 5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 5 for 5%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    /// create from basis points (e.g., 750 for 7.5%)
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(10_000))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }

    /// royalty rates live in [0, 1]
    pub fn is_valid_royalty_rate(&self) -> bool {
        self.0 >= Decimal::ZERO && self.0 <= Decimal::ONE
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}
