//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Pence?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The old preview calculator did fee maths in JavaScript numbers:        │
//! │    franchiseFee * 0.20 / 1.20  → 16.666666666666668                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer pence, one explicit rounding per step            │
//! │    (100 * 2000 + half) / 12000 = 17 pence                               │
//! │    Every rounding is visible and happens exactly once                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bookon_core::money::Money;
//!
//! let session = Money::from_pence(1250); // £12.50
//! let week = session * 5;                // £62.50
//! assert_eq!(week.pence(), 6250);
//! assert_eq!(week.to_string(), "£62.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in pence (the smallest GBP unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and adjustments can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as a bare integer**: the frontend formats for display
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Booking.amount ──► FeeConfig::split ──► FeeBreakdown ──► Ledger row    │
/// │        │                                                                │
/// │        ├──► TfcBooking.amount / amount_received                         │
/// │        │                                                                │
/// │        └──► Credit.amount / used_amount ──► redemption plan             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from pence.
    ///
    /// ## Example
    /// ```rust
    /// use bookon_core::money::Money;
    ///
    /// let price = Money::from_pence(1099); // £10.99
    /// assert_eq!(price.pence(), 1099);
    /// ```
    #[inline]
    pub const fn from_pence(pence: i64) -> Self {
        Money(pence)
    }

    /// Creates a Money value from pounds and pence.
    ///
    /// For negative amounts only the pounds should be negative:
    /// `from_pounds_pence(-5, 50)` is -£5.50.
    ///
    /// ## Example
    /// ```rust
    /// use bookon_core::money::Money;
    ///
    /// assert_eq!(Money::from_pounds_pence(10, 99).pence(), 1099);
    /// assert_eq!(Money::from_pounds_pence(-5, 50).pence(), -550);
    /// ```
    #[inline]
    pub const fn from_pounds_pence(pounds: i64, pence: i64) -> Self {
        if pounds < 0 {
            Money(pounds * 100 - pence)
        } else {
            Money(pounds * 100 + pence)
        }
    }

    /// Returns the value in pence.
    #[inline]
    pub const fn pence(&self) -> i64 {
        self.0
    }

    /// Returns the whole-pound portion.
    #[inline]
    pub const fn pounds(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the pence portion (always 0-99).
    #[inline]
    pub const fn pence_part(&self) -> i64 {
        (self.0 % 100).abs()
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

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Applies a rate and rounds half away from zero.
    ///
    /// ## Rounding
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  ROUND HALF AWAY FROM ZERO                                          │
    /// │                                                                     │
    /// │  £0.125 → 13p    -£0.125 → -13p    £0.124 → 12p                     │
    /// │                                                                     │
    /// │  Same result as Math.round() for the positive amounts the           │
    /// │  frontend preview works with, and symmetric for refunds.            │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use bookon_core::money::Money;
    /// use bookon_core::types::Rate;
    ///
    /// let gross = Money::from_pence(1250);
    /// // 12.5% of £12.50 = 156.25p → 156p
    /// assert_eq!(gross.apply_rate(Rate::from_bps(1250)).pence(), 156);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        Money(round_div(self.0 as i128 * rate.bps() as i128, 10_000) as i64)
    }

    /// Extracts the tax portion of a tax-inclusive amount.
    ///
    /// `amount × rate / (1 + rate)`, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use bookon_core::money::Money;
    /// use bookon_core::types::Rate;
    ///
    /// // £1.20 including 20% VAT contains 20p of VAT
    /// let vat = Money::from_pence(120).inclusive_portion(Rate::from_bps(2000));
    /// assert_eq!(vat.pence(), 20);
    /// ```
    pub fn inclusive_portion(&self, rate: Rate) -> Money {
        let bps = rate.bps() as i128;
        Money(round_div(self.0 as i128 * bps, 10_000 + bps) as i64)
    }

    /// Checked addition; `None` on overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction; `None` on overflow.
    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

/// Integer division rounding half away from zero.
///
/// `denom` must be positive.
pub(crate) fn round_div(numer: i128, denom: i128) -> i128 {
    let half = denom / 2;
    if numer >= 0 {
        (numer + half) / denom
    } else {
        (numer - half) / denom
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display (`£10.99`, `-£5.50`).
///
/// ## Note
/// The frontend formats amounts for users; this is for logs and messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}£{}.{:02}", sign, self.pounds().abs(), self.pence_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a session count.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pence() {
        let money = Money::from_pence(1099);
        assert_eq!(money.pence(), 1099);
        assert_eq!(money.pounds(), 10);
        assert_eq!(money.pence_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_pence(1099).to_string(), "£10.99");
        assert_eq!(Money::from_pence(500).to_string(), "£5.00");
        assert_eq!(Money::from_pence(-550).to_string(), "-£5.50");
        assert_eq!(Money::zero().to_string(), "£0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_pence(1000);
        let b = Money::from_pence(250);

        assert_eq!((a + b).pence(), 1250);
        assert_eq!((a - b).pence(), 750);
        assert_eq!((b * 4).pence(), 1000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.pence(), 1500);
    }

    #[test]
    fn test_apply_rate_rounds_half_away_from_zero() {
        // 10% of 125p = 12.5p → 13p
        assert_eq!(Money::from_pence(125).apply_rate(Rate::from_bps(1000)).pence(), 13);
        // 10% of 124p = 12.4p → 12p
        assert_eq!(Money::from_pence(124).apply_rate(Rate::from_bps(1000)).pence(), 12);
        // Refunds round symmetrically
        assert_eq!(Money::from_pence(-125).apply_rate(Rate::from_bps(1000)).pence(), -13);
    }

    #[test]
    fn test_inclusive_portion() {
        // 20% VAT inside £10.00 = 166.67p → 167p
        let vat = Money::from_pence(1000).inclusive_portion(Rate::from_bps(2000));
        assert_eq!(vat.pence(), 167);

        // Zero rate has no VAT inside
        assert!(Money::from_pence(1000)
            .inclusive_portion(Rate::zero())
            .is_zero());
    }

    #[test]
    fn test_round_div() {
        assert_eq!(round_div(5, 10), 1);
        assert_eq!(round_div(4, 10), 0);
        assert_eq!(round_div(-5, 10), -1);
        assert_eq!(round_div(-4, 10), 0);
        assert_eq!(round_div(0, 7), 0);
    }

    #[test]
    fn test_checked_ops() {
        assert_eq!(Money::from_pence(i64::MAX).checked_add(Money::from_pence(1)), None);
        assert_eq!(
            Money::from_pence(10).checked_sub(Money::from_pence(3)),
            Some(Money::from_pence(7))
        );
    }
}
