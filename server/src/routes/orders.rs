use axum::{
    routing::{get, post, put},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::*;

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders/checkout", post(checkout))
        .route("/api/orders/history", get(order_history))
        .route(
            "/api/orders/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/api/orders/:id/cancel", put(cancel_order))
        .route("/api/orders/:id/confirm", put(confirm_order))
        .route("/api/orders/:id/state", put(advance_order))
        .route("/api/shops/:shop_id/orders", get(shop_orders))
}
