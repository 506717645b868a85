//! Data models for the marketplace order core

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

pub mod payment;
pub use payment::*;

/// Caller roles carried in access tokens
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Seller,
    Admin,
}

/// How the buyer pays for an order
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[sqlx(type_name = "payment_method", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Momo,
    Vnpay,
}

/// Payment state of an order
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_state")]
pub enum PaymentState {
    Pending,
    Paid,
    Failed,
}

/// Third-party carrier requested at checkout
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "shipping_method", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ShippingMethod {
    Ghn,
    Ghtk,
    Vnpost,
}

/// Delivery state of an order.
///
/// Variants are declared in lifecycle order; `Cancelled` sits outside the
/// sequence. Transition rules live in [`crate::order_state`].
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "delivery_state")]
pub enum DeliveryState {
    #[serde(rename = "Ordered Successfully")]
    #[sqlx(rename = "Ordered Successfully")]
    Ordered,
    #[serde(rename = "Platform Received")]
    #[sqlx(rename = "Platform Received")]
    ReceivedByPlatform,
    #[serde(rename = "Getting Product")]
    #[sqlx(rename = "Getting Product")]
    Picking,
    Packing,
    Shipping,
    Delivered,
    Received,
    Cancelled,
}

impl sqlx::postgres::PgHasArrayType for DeliveryState {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_delivery_state")
    }
}

/// Order model: one purchase for one shop
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Order {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub receiver: Option<String>,
    pub phone: String,
    pub quantity: i32,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub payment_state: PaymentState,
    pub shipping_method: Option<ShippingMethod>,
    pub carrier_order_code: Option<String>,
    pub shipment_error: Option<String>,
    pub delivery_state: DeliveryState,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Order line (order detail) model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub quantity: i32,
    pub total: i64,
    pub color: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stock held for a product at a stock location
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub stock_id: Uuid,
    pub shop_id: Uuid,
    pub quantity: i32,
}

/// An order together with its lines
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// One per-shop basket of a checkout request
#[derive(Debug, Deserialize, Validate)]
pub struct BasketRequest {
    pub shop_id: Uuid,
    #[validate(length(min = 1, message = "Please add an address"))]
    pub address: String,
    #[validate(length(min = 1, message = "Please add a phone number"))]
    pub phone: String,
    pub receiver: Option<String>,
    #[validate(range(min = 0, max = 1000000000000))]
    pub total: Option<i64>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub shipping_method: Option<ShippingMethod>,
    pub items: Vec<LineItemRequest>,
}

/// One product line inside a basket
#[derive(Debug, Deserialize, Validate)]
pub struct LineItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
    #[validate(range(min = 0, max = 1000000000000))]
    pub total: i64,
    pub color: Option<String>,
    pub note: Option<String>,
}

/// Shipping contact fields an order owner may change
#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1))]
    pub address: Option<String>,
    pub receiver: Option<String>,
    #[validate(length(min = 1))]
    pub phone: Option<String>,
}

impl UpdateOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.receiver.is_none() && self.phone.is_none()
    }
}

/// Request body for moving an order along the delivery sequence
#[derive(Debug, Deserialize)]
pub struct AdvanceStateRequest {
    pub state: DeliveryState,
}

/// Sort key for a buyer's order history
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistorySort {
    #[default]
    CreatedAt,
    Total,
}

/// Query parameters for a buyer's order history
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort: HistorySort,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
