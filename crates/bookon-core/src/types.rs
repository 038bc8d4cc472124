//! # Shared Value Types
//!
//! Small value types shared by several BookOn modules.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shared Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │  PaymentMethod  │   │  PaymentStatus  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  Card (Stripe)  │   │  Pending        │       │
//! │  │  2000 = 20%     │   │  Tfc            │   │  Paid / PartPaid│       │
//! │  └─────────────────┘   │  Credit / Free  │   │  Failed/Refunded│       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │     VatMode     │   │   PageRequest   │                             │
//! │  │  Inclusive      │   │  page, per_page │                             │
//! │  │  Exclusive      │   │  (clamped)      │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::MAX_PAGE_SIZE;

// =============================================================================
// Rate
// =============================================================================

/// A rate in basis points (bps).
///
/// 1 basis point = 0.01%, so 2000 bps = 20% (UK standard VAT) and
/// 750 bps = 7.5% (a typical franchise fee).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100%.
    pub const FULL: Rate = Rate(10_000);

    /// UK standard VAT rate (20%).
    pub const UK_STANDARD_VAT: Rate = Rate(2_000);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience at the edges).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// VAT Mode
// =============================================================================

/// How VAT relates to the configured franchise fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VatMode {
    /// The franchise fee already includes VAT.
    Inclusive,
    /// VAT is charged on top of the franchise fee.
    Exclusive,
}

impl Default for VatMode {
    fn default() -> Self {
        VatMode::Inclusive
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a parent pays for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through Stripe; confirmed by webhook.
    Card,
    /// Tax-Free Childcare; confirmed by an admin after reconciliation.
    Tfc,
    /// Paid from the parent's credit wallet at checkout.
    Credit,
    /// Zero-priced activity.
    Free,
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment progress of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "text", rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    PartPaid,
    Failed,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Paging
// =============================================================================

/// A clamped page request.
///
/// Pages are 1-based; `per_page` is clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Builds a page request from optional query parameters.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// SQL `OFFSET` for this page.
    #[inline]
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    /// SQL `LIMIT` for this page.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(None, None)
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// Number of pages for `total` rows (at least 1).
    pub fn total_pages(&self) -> i64 {
        let per_page = self.request.per_page.max(1) as i64;
        ((self.total + per_page - 1) / per_page).max(1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_bps() {
        let rate = Rate::from_bps(750);
        assert_eq!(rate.bps(), 750);
        assert!((rate.percentage() - 7.5).abs() < 0.001);
    }

    #[test]
    fn test_rate_from_percentage() {
        assert_eq!(Rate::from_percentage(12.5).bps(), 1250);
        assert_eq!(Rate::UK_STANDARD_VAT.bps(), 2000);
    }

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest::new(Some(0), Some(1000));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, MAX_PAGE_SIZE);

        let page = PageRequest::new(Some(3), Some(25));
        assert_eq!(page.offset(), 50);
        assert_eq!(page.limit(), 25);
    }

    #[test]
    fn test_total_pages() {
        let page: Page<()> = Page {
            items: vec![],
            total: 41,
            request: PageRequest::new(Some(1), Some(20)),
        };
        assert_eq!(page.total_pages(), 3);

        let empty: Page<()> = Page {
            items: vec![],
            total: 0,
            request: PageRequest::default(),
        };
        assert_eq!(empty.total_pages(), 1);
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_string(&PaymentStatus::PartPaid).unwrap(), "\"part_paid\"");
        assert_eq!(serde_json::to_string(&VatMode::Exclusive).unwrap(), "\"exclusive\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::Tfc).unwrap(), "\"tfc\"");
    }
}
