use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const KES_CURRENCY_CODE: &str = "KES";

const CENTS_PER_SHILLING: i64 = 100;
const BASIS_POINTS: i64 = 10_000;

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount in cents of Kenyan shillings.
///
/// All ledger arithmetic is integer arithmetic on cents. Fractional rates (bonus, discount, conversion) are
/// expressed in basis points and applied with [`Money::scale_bps`], which rounds towards zero.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal shilling amount, e.g. `"150"` or `"150.50"`, into cents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let negative = s.starts_with('-');
        let s = s.trim_start_matches(['-', '+']);
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 2 {
            return Err(MoneyConversionError(format!("{s} has sub-cent precision")));
        }
        let whole = if whole.is_empty() {
            0
        } else {
            whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s} is not a valid amount: {e}")))?
        };
        let mut cents = if frac.is_empty() {
            0
        } else {
            frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s} is not a valid amount: {e}")))?
        };
        if frac.len() == 1 {
            cents *= 10;
        }
        let value = whole * CENTS_PER_SHILLING + cents;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{KES_CURRENCY_CODE} {sign}{}.{:02}", cents / CENTS_PER_SHILLING, cents % CENTS_PER_SHILLING)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_shillings(shillings: i64) -> Self {
        Self(shillings * CENTS_PER_SHILLING)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Scales the amount by a rate given in basis points, rounding towards zero.
    /// `Money::from_shillings(100).scale_bps(250)` is 2.50 shillings.
    pub fn scale_bps(&self, bps: i64) -> Self {
        Self(self.0 * bps / BASIS_POINTS)
    }
}
