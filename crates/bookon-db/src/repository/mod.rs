//! # Repository Module
//!
//! Database repository implementations for BookOn.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler                                                          │
//! │       │  db.tfc().apply(id, &TfcAction::MarkPaid, actor, scope)        │
//! │       ▼                                                                 │
//! │  TfcRepository                                                         │
//! │  ├── BEGIN                                                             │
//! │  ├── lock TFC row + booking row (FOR UPDATE)                           │
//! │  ├── bookon-core decides the outcome                                   │
//! │  ├── write TFC, booking, credit / ledger, audit rows                   │
//! │  └── COMMIT (or ROLLBACK on any error)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PostgreSQL                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories that take part in another repository's transaction expose
//! `pub(crate)` functions over `&mut PgConnection` next to their pooled
//! methods.
//!
//! ## Available Repositories
//!
//! - [`booking::BookingRepository`] - Checkout, confirm, cancel, refunds
//! - [`tfc::TfcRepository`] - TFC reconciliation, single and bulk
//! - [`fee_config::FeeConfigRepository`] - Versioned fee terms
//! - [`ledger::LedgerRepository`] - Settled payment splits
//! - [`credit::CreditRepository`] - Wallets and redemptions
//! - [`notification::NotificationRepository`] - Admin inbox
//! - [`register::RegisterRepository`] - Attendance registers
//! - [`audit::AuditRepository`] - Append-only audit log
//! - [`webhook::WebhookRepository`] - Webhook inbox

pub mod audit;
pub mod booking;
pub mod credit;
pub mod fee_config;
pub mod ledger;
pub mod notification;
pub mod register;
pub mod tfc;
pub mod webhook;

use bookon_core::{Page, PageRequest};

/// Builds a page from rows and a total count.
pub(crate) fn page_of<T>(items: Vec<T>, total: i64, request: PageRequest) -> Page<T> {
    Page {
        items,
        total,
        request,
    }
}
