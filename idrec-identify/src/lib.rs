//! idrec-identify library - identity reconciliation service
//!
//! Consolidates contact records (email, phone) submitted over time into
//! one primary record per person with linked secondaries.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod service;

pub use crate::error::{ApiError, ApiResult};
pub use crate::service::{ContactService, ServiceError};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Identify cycle runner (owns the database pool)
    pub contacts: ContactService,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self {
            contacts: ContactService::new(db),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::post;

    Router::new()
        .route("/identify", post(api::identify))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
