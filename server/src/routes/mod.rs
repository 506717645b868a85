//! Route definitions for the marketplace API

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

mod orders;
mod payment;

pub use orders::order_routes;
pub use payment::payment_routes;

async fn health_check() -> &'static str {
    "OK"
}

/// The full API router with state applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(order_routes())
        .merge(payment_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
