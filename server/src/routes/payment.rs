use axum::{
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::*;

// IPN and return routes are unauthenticated; the gateway signature is checked instead.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payment/momo/create", post(momo_create))
        .route(
            "/api/payment/momo/momo_ipn",
            get(momo_ipn_query).post(momo_ipn_body),
        )
        .route("/api/payment/momo/momo_return", get(momo_return))
        .route("/api/payment/vnpay/create", post(vnpay_create))
        .route("/api/payment/vnpay/vnpay_ipn", get(vnpay_ipn))
        .route("/api/payment/vnpay/vnpay_return", get(vnpay_return))
        .route("/api/payment/vnpay/querydr", post(vnpay_querydr))
        .route("/api/payment/vnpay/refund", post(vnpay_refund))
}
