//! Integer money in minor units.
//!
//! Every stored amount is an `i64` count of cents, so
//! `subtotal == Σ line_total` and `total == subtotal − discount + tax` hold
//! exactly. Tax is the only place that divides, and it rounds half up once
//! per sale.
//!
//! ```rust
//! use till_core::money::Money;
//!
//! assert_eq!(Money::from_cents(1500).times(3).cents(), 4500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use ts_rs::TS;

use crate::types::TaxRate;

/// Signed cents. Shift totals go negative transiently when a sale is voided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `round_half_up(self × bps / 10 000)`.
    ///
    /// ```rust
    /// use till_core::money::Money;
    /// use till_core::types::TaxRate;
    ///
    /// // 8.25% of 10.00 is 0.825
    /// assert_eq!(Money::from_cents(1000).tax_at(TaxRate::from_bps(825)).cents(), 83);
    /// ```
    pub fn tax_at(&self, rate: TaxRate) -> Money {
        let scaled = i128::from(self.0) * i128::from(rate.bps()) + 5_000;
        Money((scaled / 10_000) as i64)
    }

    /// Unit price × quantity.
    #[inline]
    pub const fn times(&self, quantity: i64) -> Self {
        Money(self.0 * quantity)
    }
}

/// `12.50`-style rendering for logs. Terminals format currency themselves.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            f.write_str("-")?;
        }
        let abs = self.0.unsigned_abs();
        write!(f, "{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_rendering() {
        assert_eq!(Money::from_cents(250).to_string(), "2.50");
        assert_eq!(Money::from_cents(-1205).to_string(), "-12.05");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn test_tax_rounds_half_up_once() {
        let subtotal = Money::from_cents(7500);
        assert_eq!(subtotal.tax_at(TaxRate::from_bps(1000)).cents(), 750);
        // 7500 × 0.0333 = 249.75
        assert_eq!(subtotal.tax_at(TaxRate::from_bps(333)).cents(), 250);
        assert!(subtotal.tax_at(TaxRate::zero()).is_zero());
    }

    #[test]
    fn test_lines_sum_to_subtotal() {
        let lines = [Money::from_cents(1500).times(3), Money::from_cents(250).times(12)];
        let subtotal: Money = lines.into_iter().sum();
        assert_eq!(subtotal.cents(), 7500);
        assert_eq!((subtotal - Money::from_cents(500)).cents(), 7000);
    }
}
