//! Persistence seam for the order core
//!
//! Services talk to the store only through these traits. `PgStore` is the
//! production backend; `MemoryStore` backs tests and local runs without a
//! database. Every state change that depends on the current value of a row
//! is expressed as a conditional update so concurrent requests cannot lose
//! each other's writes.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    DeliveryState, Gateway, GatewayResult, HistorySort, InventoryRecord, NewPaymentTransaction,
    Order, OrderLine, OrderWithLines, PaymentMethod, PaymentState, PaymentTransaction,
    ShippingMethod, UpdateOrderRequest,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("No product found with id {0}")]
    ProductNotFound(Uuid),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// An order ready to be persisted together with its lines.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub shop_id: Uuid,
    pub user_id: Uuid,
    pub address: String,
    pub receiver: Option<String>,
    pub phone: String,
    /// Sum of line quantities
    pub quantity: i32,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub shipping_method: Option<ShippingMethod>,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub total: i64,
    pub color: Option<String>,
    pub note: Option<String>,
}

/// Result of a conditional update.
#[derive(Debug, Clone)]
pub enum CasOutcome<T> {
    /// The guard matched and the row was written.
    Applied(T),
    /// The row exists but its current value failed the guard.
    Conflict(T),
    /// No live row with that id.
    Missing,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a checkout batch atomically: orders, lines, sold-quantity
    /// increments and stock decrements all land or none do.
    async fn create_orders(&self, orders: Vec<NewOrder>) -> Result<Vec<OrderWithLines>>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;

    async fn lines_for_orders(&self, order_ids: &[Uuid]) -> Result<Vec<OrderLine>>;

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        limit: i64,
        sort: HistorySort,
    ) -> Result<Vec<Order>>;

    async fn list_shop_orders(&self, shop_id: Uuid) -> Result<Vec<Order>>;

    /// Move `delivery_state` to `to` if it is currently one of `from`.
    async fn transition_delivery(
        &self,
        id: Uuid,
        from: &[DeliveryState],
        to: DeliveryState,
        force_paid: bool,
    ) -> Result<CasOutcome<Order>>;

    async fn update_contact(&self, id: Uuid, update: &UpdateOrderRequest)
        -> Result<Option<Order>>;

    async fn soft_delete(&self, id: Uuid) -> Result<bool>;

    async fn record_shipment(
        &self,
        id: Uuid,
        carrier_order_code: Option<String>,
        shipment_error: Option<String>,
    ) -> Result<Option<Order>>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn stock_for(&self, product_id: Uuid, shop_id: Uuid) -> Result<Option<InventoryRecord>>;

    async fn sold_quantity(&self, product_id: Uuid) -> Result<Option<i64>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_transaction(&self, tx: NewPaymentTransaction) -> Result<PaymentTransaction>;

    async fn find_transaction(
        &self,
        gateway: Gateway,
        reference: &str,
    ) -> Result<Option<PaymentTransaction>>;

    /// Move the order's `payment_state` from `Pending` to `to` and store the
    /// gateway result on the transaction in one unit of work. Neither write
    /// lands unless the order was still pending.
    async fn settle_transaction(
        &self,
        order_id: Uuid,
        transaction_id: Uuid,
        to: PaymentState,
        result: &GatewayResult,
    ) -> Result<CasOutcome<Order>>;
}

/// Everything the services need from persistence.
pub trait Store: OrderStore + InventoryStore + PaymentStore {}

impl<T> Store for T where T: OrderStore + InventoryStore + PaymentStore {}
