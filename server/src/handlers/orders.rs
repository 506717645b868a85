use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{
    AdvanceStateRequest, ApiResponse, BasketRequest, HistoryQuery, Order, OrderWithLines,
    UpdateOrderRequest,
};

pub async fn checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(baskets): ApiJson<Vec<BasketRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Vec<OrderWithLines>>>)> {
    let orders = state.order_service.create_orders(&user, baskets).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(orders))))
}

pub async fn get_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<OrderWithLines>>> {
    let order = state.order_service.get_order(id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

pub async fn order_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Json<ApiResponse<Vec<OrderWithLines>>>> {
    let orders = state.order_service.user_history(&user, query).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

pub async fn shop_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(shop_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<OrderWithLines>>>> {
    let orders = state.order_service.shop_orders(&user, shop_id).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

pub async fn update_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateOrderRequest>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let order = state.order_service.update(&user, id, payload).await?;
    Ok(Json(ApiResponse::ok(order)))
}

pub async fn delete_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    state.order_service.delete(&user, id).await?;
    Ok(Json(ApiResponse::ok(json!({}))))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let order = state.order_service.cancel(&user, id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

pub async fn confirm_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let order = state.order_service.confirm_received(&user, id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

pub async fn advance_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AdvanceStateRequest>,
) -> ApiResult<Json<ApiResponse<Order>>> {
    let order = state.order_service.advance(&user, id, payload.state).await?;
    Ok(Json(ApiResponse::ok(order)))
}
