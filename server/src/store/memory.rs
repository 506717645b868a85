//! In-memory store for tests and database-less local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CasOutcome, InventoryStore, NewOrder, OrderStore, PaymentStore, Result, StoreError,
};
use crate::inventory;
use crate::models::{
    DeliveryState, Gateway, GatewayResult, HistorySort, InventoryRecord, NewPaymentTransaction,
    Order, OrderLine, OrderWithLines, PaymentState, PaymentTransaction, UpdateOrderRequest,
};

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    lines: Vec<OrderLine>,
    sold: HashMap<Uuid, i64>,
    stock: Vec<InventoryRecord>,
    payments: HashMap<Uuid, PaymentTransaction>,
}

impl State {
    fn live_order(&self, id: Uuid) -> Option<&Order> {
        self.orders.get(&id).filter(|o| o.deleted_at.is_none())
    }

    fn live_order_mut(&mut self, id: Uuid) -> Option<&mut Order> {
        self.orders.get_mut(&id).filter(|o| o.deleted_at.is_none())
    }
}

/// Store backed by process memory. A single lock serializes writers, which
/// gives the same all-or-nothing guarantees as the database transaction.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product so that orders can reference it.
    pub async fn insert_product(&self, product_id: Uuid, sold_quantity: i64) {
        self.state.write().await.sold.insert(product_id, sold_quantity);
    }

    pub async fn insert_stock(&self, record: InventoryRecord) {
        self.state.write().await.stock.push(record);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_orders(&self, orders: Vec<NewOrder>) -> Result<Vec<OrderWithLines>> {
        let mut state = self.state.write().await;

        // Apply counters on copies so a failure leaves nothing behind.
        let mut sold = state.sold.clone();
        let mut stock = state.stock.clone();
        for order in &orders {
            for adjustment in inventory::plan(order.shop_id, &order.lines) {
                let counter = sold
                    .get_mut(&adjustment.product_id)
                    .ok_or(StoreError::ProductNotFound(adjustment.product_id))?;
                *counter += i64::from(adjustment.quantity);

                if let Some(record) = stock.iter_mut().find(|r| {
                    r.product_id == adjustment.product_id && r.shop_id == adjustment.shop_id
                }) {
                    record.quantity = adjustment.remaining(record.quantity).ok_or(
                        StoreError::InsufficientStock {
                            product_id: adjustment.product_id,
                            requested: adjustment.quantity,
                            available: record.quantity,
                        },
                    )?;
                }
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(orders.len());
        for new_order in orders {
            let order = Order {
                id: Uuid::new_v4(),
                shop_id: new_order.shop_id,
                user_id: new_order.user_id,
                address: new_order.address,
                receiver: new_order.receiver,
                phone: new_order.phone,
                quantity: new_order.quantity,
                total: new_order.total,
                payment_method: new_order.payment_method,
                payment_state: PaymentState::Pending,
                shipping_method: new_order.shipping_method,
                carrier_order_code: None,
                shipment_error: None,
                delivery_state: DeliveryState::Ordered,
                version: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            let lines: Vec<OrderLine> = new_order
                .lines
                .into_iter()
                .map(|line| OrderLine {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    product_id: line.product_id,
                    shop_id: order.shop_id,
                    quantity: line.quantity,
                    total: line.total,
                    color: line.color,
                    note: line.note,
                    created_at: now,
                })
                .collect();

            state.orders.insert(order.id, order.clone());
            state.lines.extend(lines.iter().cloned());
            created.push(OrderWithLines { order, lines });
        }

        state.sold = sold;
        state.stock = stock;
        Ok(created)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.read().await.live_order(id).cloned())
    }

    async fn lines_for_orders(&self, order_ids: &[Uuid]) -> Result<Vec<OrderLine>> {
        let state = self.state.read().await;
        Ok(state
            .lines
            .iter()
            .filter(|line| order_ids.contains(&line.order_id))
            .cloned()
            .collect())
    }

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        limit: i64,
        sort: HistorySort,
    ) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.deleted_at.is_none())
            .cloned()
            .collect();
        match sort {
            HistorySort::CreatedAt => orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            HistorySort::Total => orders.sort_by(|a, b| b.total.cmp(&a.total)),
        }
        orders.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(orders)
    }

    async fn list_shop_orders(&self, shop_id: Uuid) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.shop_id == shop_id && o.deleted_at.is_none())
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition_delivery(
        &self,
        id: Uuid,
        from: &[DeliveryState],
        to: DeliveryState,
        force_paid: bool,
    ) -> Result<CasOutcome<Order>> {
        let mut state = self.state.write().await;
        let Some(order) = state.live_order_mut(id) else {
            return Ok(CasOutcome::Missing);
        };
        if !from.contains(&order.delivery_state) {
            return Ok(CasOutcome::Conflict(order.clone()));
        }

        order.delivery_state = to;
        if force_paid {
            order.payment_state = PaymentState::Paid;
        }
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(CasOutcome::Applied(order.clone()))
    }

    async fn update_contact(
        &self,
        id: Uuid,
        update: &UpdateOrderRequest,
    ) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        let Some(order) = state.live_order_mut(id) else {
            return Ok(None);
        };
        if let Some(address) = &update.address {
            order.address = address.clone();
        }
        if let Some(receiver) = &update.receiver {
            order.receiver = Some(receiver.clone());
        }
        if let Some(phone) = &update.phone {
            order.phone = phone.clone();
        }
        order.version += 1;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.live_order_mut(id) {
            Some(order) => {
                order.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_shipment(
        &self,
        id: Uuid,
        carrier_order_code: Option<String>,
        shipment_error: Option<String>,
    ) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        let Some(order) = state.live_order_mut(id) else {
            return Ok(None);
        };
        order.carrier_order_code = carrier_order_code;
        order.shipment_error = shipment_error;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn stock_for(&self, product_id: Uuid, shop_id: Uuid) -> Result<Option<InventoryRecord>> {
        let state = self.state.read().await;
        Ok(state
            .stock
            .iter()
            .find(|r| r.product_id == product_id && r.shop_id == shop_id)
            .cloned())
    }

    async fn sold_quantity(&self, product_id: Uuid) -> Result<Option<i64>> {
        Ok(self.state.read().await.sold.get(&product_id).copied())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_transaction(&self, tx: NewPaymentTransaction) -> Result<PaymentTransaction> {
        let now = Utc::now();
        let row = PaymentTransaction {
            id: Uuid::new_v4(),
            gateway: tx.gateway,
            reference: tx.reference,
            request_id: tx.request_id,
            order_id: tx.order_id,
            amount: tx.amount,
            order_info: tx.order_info,
            signature: tx.signature,
            request_params: Json(tx.request_params),
            result_code: None,
            bank_code: None,
            bank_tran_no: None,
            card_type: None,
            transaction_no: None,
            pay_date: None,
            response_time: None,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.payments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_transaction(
        &self,
        gateway: Gateway,
        reference: &str,
    ) -> Result<Option<PaymentTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|tx| tx.gateway == gateway && tx.reference == reference)
            .cloned())
    }

    async fn settle_transaction(
        &self,
        order_id: Uuid,
        transaction_id: Uuid,
        to: PaymentState,
        result: &GatewayResult,
    ) -> Result<CasOutcome<Order>> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let Some(order) = state.live_order_mut(order_id) else {
            return Ok(CasOutcome::Missing);
        };
        if order.payment_state != PaymentState::Pending {
            return Ok(CasOutcome::Conflict(order.clone()));
        }
        order.payment_state = to;
        order.version += 1;
        order.updated_at = now;
        let settled = order.clone();

        if let Some(tx) = state.payments.get_mut(&transaction_id) {
            tx.result_code = Some(result.result_code.clone());
            tx.bank_code = result.bank_code.clone();
            tx.bank_tran_no = result.bank_tran_no.clone();
            tx.card_type = result.card_type.clone();
            tx.transaction_no = result.transaction_no.clone();
            tx.pay_date = result.pay_date.clone();
            tx.response_time = result.response_time.clone();
            tx.updated_at = now;
        }
        Ok(CasOutcome::Applied(settled))
    }
}
