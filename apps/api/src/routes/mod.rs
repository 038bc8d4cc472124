//! HTTP route handlers.
//!
//! ```text
//! /health                                            public
//! /api/v1/bookings[/{id}[/cancel]]                   parent, admin
//! /api/v1/fees/preview                               admin
//! /api/v1/credits                                    parent, admin
//! /api/v1/registers[/{id}[/attendance]]              staff
//! /api/v1/admin/...                                  admin
//! /api/v1/webhooks/{stripe,generic}                  signature / shared secret
//! ```
//!
//! Handlers stay thin: authorize, call one repository operation, dispatch
//! notifications after commit, wrap the result in an [`Envelope`](crate::response::Envelope).

pub mod audit;
pub mod bookings;
pub mod credits;
pub mod fees;
pub mod health;
pub mod notifications;
pub mod registers;
pub mod tfc;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/api/v1`.
pub fn api() -> Router<Arc<AppState>> {
    Router::new()
        // Bookings
        .route("/bookings", post(bookings::create).get(bookings::list))
        .route("/bookings/{id}", get(bookings::get))
        .route("/bookings/{id}/cancel", post(bookings::cancel))
        // Fees
        .route("/fees/preview", post(fees::preview))
        .route(
            "/admin/businesses/{id}/fee-config",
            get(fees::get_config).put(fees::put_config),
        )
        .route("/admin/businesses/{id}/ledger/summary", get(fees::ledger_summary))
        // Tax-Free Childcare
        .route("/admin/tfc", get(tfc::list))
        .route("/admin/tfc/bulk", post(tfc::bulk))
        .route("/admin/tfc/{id}", get(tfc::get))
        .route("/admin/tfc/{id}/mark-paid", post(tfc::mark_paid))
        .route("/admin/tfc/{id}/part-paid", post(tfc::part_paid))
        .route("/admin/tfc/{id}/cancel", post(tfc::cancel))
        .route("/admin/tfc/{id}/convert-to-credit", post(tfc::convert_to_credit))
        // Credits
        .route("/credits", get(credits::wallet))
        .route("/admin/credits", post(credits::grant))
        // Notifications
        .route(
            "/admin/notifications",
            get(notifications::list).post(notifications::create),
        )
        .route("/admin/notifications/unread-count", get(notifications::unread_count))
        .route(
            "/admin/notifications/{id}",
            get(notifications::get).delete(notifications::delete),
        )
        .route("/admin/notifications/{id}/read", post(notifications::mark_read))
        .route("/admin/notifications/{id}/unread", post(notifications::mark_unread))
        // Registers
        .route("/registers", post(registers::create))
        .route("/registers/{id}", get(registers::get))
        .route("/registers/{id}/attendance", post(registers::mark_attendance))
        // Audit
        .route("/admin/audit-logs", get(audit::list))
        // Webhooks
        .route("/webhooks/stripe", post(webhooks::stripe))
        .route("/webhooks/generic", post(webhooks::generic))
        .route("/admin/webhooks", get(webhooks::list))
        .route("/admin/webhooks/{id}/retry", post(webhooks::retry))
}
