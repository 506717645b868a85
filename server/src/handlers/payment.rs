//! Payment gateway handlers
//!
//! IPN routes answer in the gateway's own shape and always with HTTP 200;
//! return routes answer with the standard envelope.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::extract::{ApiJson, ApiQuery};
use crate::models::{
    ApiResponse, CallbackReport, Gateway, MomoCreateRequest, PaymentInitiated,
    VnpayCreateRequest, VnpayQueryRequest, VnpayRefundRequest,
};
use crate::payment::CallbackOutcome;

const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// First hop of `X-Forwarded-For`, the address VNPay records for the buyer.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(DEFAULT_CLIENT_IP)
        .to_string()
}

fn flatten_body(body: Map<String, Value>) -> HashMap<String, String> {
    body.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

fn report(outcome: CallbackOutcome) -> ApiResult<Json<ApiResponse<CallbackReport>>> {
    if outcome == CallbackOutcome::SignatureMismatch {
        return Err(ApiError::SignatureMismatch);
    }

    let success = outcome.payment_state() == Some(crate::models::PaymentState::Paid);
    Ok(Json(ApiResponse {
        success,
        data: Some(CallbackReport {
            code: outcome.code().to_string(),
            message: outcome.message().to_string(),
            payment_state: outcome.payment_state(),
        }),
        error: (!success).then(|| outcome.message().to_string()),
    }))
}

pub async fn momo_create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<MomoCreateRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PaymentInitiated>>)> {
    let payment = state.payment_service.initiate_momo(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(payment))))
}

async fn momo_ipn(state: &AppState, params: HashMap<String, String>) -> Json<Value> {
    let outcome = state
        .payment_service
        .handle_callback(Gateway::Momo, &params)
        .await;

    Json(json!({
        "rspcode": outcome.code(),
        "message": outcome.message(),
    }))
}

pub async fn momo_ipn_query(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> Json<Value> {
    momo_ipn(&state, params).await
}

pub async fn momo_ipn_body(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Json<Value> {
    momo_ipn(&state, flatten_body(body)).await
}

pub async fn momo_return(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> ApiResult<Json<ApiResponse<CallbackReport>>> {
    report(
        state
            .payment_service
            .handle_callback(Gateway::Momo, &params)
            .await,
    )
}

pub async fn vnpay_create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<VnpayCreateRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PaymentInitiated>>)> {
    let payment = state
        .payment_service
        .initiate_vnpay(&user, payload, &client_ip(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(payment))))
}

pub async fn vnpay_ipn(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> Json<Value> {
    let outcome = state
        .payment_service
        .handle_callback(Gateway::Vnpay, &params)
        .await;

    Json(json!({
        "RspCode": outcome.code(),
        "Message": outcome.message(),
    }))
}

pub async fn vnpay_return(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> ApiResult<Json<ApiResponse<CallbackReport>>> {
    report(
        state
            .payment_service
            .handle_callback(Gateway::Vnpay, &params)
            .await,
    )
}

pub async fn vnpay_querydr(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<VnpayQueryRequest>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let response = state
        .payment_service
        .vnpay_query(&user, payload, &client_ip(&headers))
        .await?;
    Ok(Json(ApiResponse::ok(response)))
}

pub async fn vnpay_refund(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<VnpayRefundRequest>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let response = state
        .payment_service
        .vnpay_refund(&user, payload, &client_ip(&headers))
        .await?;
    Ok(Json(ApiResponse::ok(response)))
}
