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

pub const USD_CURRENCY_CODE: &str = "USD";

//--------------------------------------        Money        ---------------------------------------------------------
/// A monetary amount in minor units (cents). Prices in the store carry exactly two decimal places, so amounts are
/// stored as integers and compared exactly. There is deliberately no floating point anywhere near this type.
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
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
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
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal amount such as `"100"`, `"99.5"` or `"99.95"`. More than two decimal places is an error,
    /// since sub-cent amounts cannot be represented exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (sign, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, trimmed),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal amount")));
        }
        if frac.len() > 2 {
            return Err(MoneyConversionError(format!("'{s}' has sub-cent precision")));
        }
        let whole = if whole.is_empty() {
            0
        } else {
            whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?
        };
        let cents = match frac.len() {
            0 => 0,
            n => {
                let f = frac.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?;
                if n == 1 {
                    f * 10
                } else {
                    f
                }
            },
        };
        Ok(Self(sign * (whole * 100 + cents)))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cents = self.0.abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// An amount in whole currency units, e.g. `Money::from_whole(100)` is $100.00.
    pub fn from_whole(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_amounts() {
        assert_eq!("100".parse::<Money>().unwrap(), Money::from_whole(100));
        assert_eq!("100.00".parse::<Money>().unwrap(), Money::from_cents(10_000));
        assert_eq!("99.5".parse::<Money>().unwrap(), Money::from_cents(9_950));
        assert_eq!("0.07".parse::<Money>().unwrap(), Money::from_cents(7));
        assert_eq!("-2.50".parse::<Money>().unwrap(), Money::from_cents(-250));
        assert_eq!(".50".parse::<Money>().unwrap(), Money::from_cents(50));
    }

    #[test]
    fn reject_subcent_precision() {
        assert!("99.999".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!("12.3.4".parse::<Money>().is_err());
        assert!("ten".parse::<Money>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Money::from_cents(10_000).to_string(), "$100.00");
        assert_eq!(Money::from_cents(7).to_string(), "$0.07");
        assert_eq!(Money::from_cents(-250).to_string(), "-$2.50");
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_whole(10);
        let b = Money::from_cents(150);
        assert_eq!(a + b, Money::from_cents(1_150));
        assert_eq!(a - b, Money::from_cents(850));
        assert_eq!(b * 3, Money::from_cents(450));
        assert_eq!(-b, Money::from_cents(-150));
        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_cents(1_300));
    }
}
