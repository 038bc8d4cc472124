//! # BookOn API
//!
//! REST server for the admin dashboard, the parent portal and payment
//! provider webhooks.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           BookOn API                                    │
//! │                                                                         │
//! │  Browser / Stripe                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  TraceLayer ─► CorsLayer ─► Router (/health, /api/v1/...)               │
//! │                                  │                                      │
//! │          ┌───────────────────────┼──────────────────────────┐           │
//! │          ▼                       ▼                          ▼           │
//! │  ┌──────────────┐      ┌──────────────────┐      ┌──────────────────┐  │
//! │  │  AuthUser    │      │  routes::*       │      │  notify::dispatch│  │
//! │  │  (JWT)       │      │  extract, check, │      │  (after commit)  │  │
//! │  │              │      │  call bookon-db  │      │                  │  │
//! │  └──────────────┘      └────────┬─────────┘      └──────────────────┘  │
//! │                                 │                                       │
//! │                    ┌────────────┴────────────┐                          │
//! │                    ▼                         ▼                          │
//! │              PostgreSQL               Redis (optional)                  │
//! │              (bookon-db)              unread counts                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every response uses the envelope in [`response`] or the error body in
//! [`error`].

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod notify;
pub mod response;
pub mod routes;
pub mod state;
pub mod stripe;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use crate::config::ApiConfig;
pub use crate::error::{ApiError, ApiResult};
pub use crate::state::AppState;

/// Builds the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/v1", routes::api())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
