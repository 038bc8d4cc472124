//! # bookon-core: Pure Business Rules for BookOn
//!
//! This crate holds every booking, payment and fee rule of the platform as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BookOn Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Frontend (React admin + parent portal)             │   │
//! │  │    Checkout ──► TFC inbox ──► Registers ──► Finance reports     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ REST /api/v1                           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ bookon-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │  fees   │ │ booking │ │   tfc   │ │ credit  │  │   │
//! │  │   │  Money  │ │FeeConfig│ │ Status  │ │ Status  │ │ Wallet  │  │   │
//! │  │   │  Rate   │ │FeeSplit │ │ machine │ │ actions │ │ redeem  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 bookon-db (PostgreSQL Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer pence arithmetic
//! - [`types`] - Shared value types (Rate, payment enums, paging)
//! - [`fees`] - Franchise fee / VAT / admin fee split
//! - [`booking`] - Booking status state machine
//! - [`tfc`] - Tax-Free Childcare payment reconciliation
//! - [`bulk`] - Per-item outcome reports for bulk admin actions
//! - [`credit`] - Credit wallet balance and redemption planning
//! - [`notification`] - Notification records and inbox filters
//! - [`register`] - Attendance registers
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bookon_core::fees::{FeeConfig, FranchiseFee};
//! use bookon_core::money::Money;
//! use bookon_core::types::{Rate, VatMode};
//!
//! let config = FeeConfig::new(
//!     "biz-1",
//!     FranchiseFee::Percent(Rate::from_bps(1000)), // 10%
//!     VatMode::Inclusive,
//!     Money::from_pence(50),
//! );
//!
//! let split = config.split(Money::from_pence(10_000)).unwrap();
//! assert_eq!(split.franchise_fee.pence(), 1_000);
//! assert_eq!(split.vat.pence(), 167);
//! assert_eq!(split.net_to_venue.pence(), 8_950);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod booking;
pub mod bulk;
pub mod credit;
pub mod error;
pub mod fees;
pub mod money;
pub mod notification;
pub mod register;
pub mod tfc;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum ids accepted by one bulk admin request.
///
/// ## Business Reason
/// Each id runs in its own transaction; the cap keeps a single request
/// inside the HTTP timeout.
pub const MAX_BULK_IDS: usize = 500;

/// Largest fixed franchise fee or admin fee a fee config may carry (£1m).
pub const MAX_FIXED_FEE_PENCE: i64 = 100_000_000;

/// Default TFC hold period in hours (5 days).
pub const DEFAULT_TFC_HOLD_PERIOD_HOURS: i64 = 120;

/// Default prefix for TFC payment references.
pub const DEFAULT_TFC_REFERENCE_PREFIX: &str = "TFC";

/// Maximum page size for list endpoints.
pub const MAX_PAGE_SIZE: u32 = 100;
