//! # bookon-db: Database Layer for BookOn
//!
//! This crate provides PostgreSQL access for the BookOn backend.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BookOn Data Flow                                 │
//! │                                                                         │
//! │  axum handler (POST /api/v1/admin/tfc/{id}/mark-paid)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bookon-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ booking, tfc, │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ credit, fees, │    │ 001_initial  │  │   │
//! │  │   │    PgPool     │    │ ledger, audit │    │ _schema.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   BEGIN → SELECT … FOR UPDATE → core rule → writes → COMMIT     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PostgreSQL                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("postgres://localhost/bookon")).await?;
//! let tfc = db.tfc().get_by_reference("TFC-0A1B2C3D").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::audit::{AuditEntry, AuditFilter, AuditRepository};
pub use repository::booking::{BookingFilter, BookingRepository, CheckoutResult, RefundTarget};
pub use repository::credit::CreditRepository;
pub use repository::fee_config::FeeConfigRepository;
pub use repository::ledger::{LedgerRepository, LedgerSummary};
pub use repository::notification::NotificationRepository;
pub use repository::register::RegisterRepository;
pub use repository::tfc::{BulkApplied, TfcApplied, TfcRepository, TfcSettings};
pub use repository::webhook::{WebhookEvent, WebhookProvider, WebhookRepository, WebhookStatus};
