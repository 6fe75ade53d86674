//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store connector, command channel and batch processor wiring
//! - `routes.rs`: HTTP handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/stock-events/batch", post(routes::ingest_batch))
        .layer(ServiceBuilder::new().layer(Extension(Arc::new(services))))
}
