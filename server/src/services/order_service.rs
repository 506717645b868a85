//! Order service layer - lifecycle, ownership checks and inventory effects

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{authorize, Action, AuthenticatedUser};
use crate::cache::{order_key, ResponseCache};
use crate::carrier::{CarrierClient, ShipmentRequest};
use crate::error::{ApiError, ApiResult};
use crate::inventory;
use crate::models::{
    BasketRequest, DeliveryState, GatewayResult, HistoryQuery, Order, OrderLine, OrderWithLines,
    PaymentState, ShippingMethod, UpdateOrderRequest,
};
use crate::order_state::Transition;
use crate::store::{CasOutcome, NewOrder, NewOrderLine, Store};

const DEFAULT_HISTORY_LIMIT: i64 = 5;
const MAX_HISTORY_LIMIT: i64 = 100;

pub struct OrderService {
    store: Arc<dyn Store>,
    cache: Arc<dyn ResponseCache>,
    carrier: Arc<dyn CarrierClient>,
    cache_ttl: Duration,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn ResponseCache>,
        carrier: Arc<dyn CarrierClient>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            carrier,
            cache_ttl,
        }
    }

    /// Place one order per basket. The whole batch is committed atomically;
    /// carrier shipments are requested afterwards.
    pub async fn create_orders(
        &self,
        user: &AuthenticatedUser,
        baskets: Vec<BasketRequest>,
    ) -> ApiResult<Vec<OrderWithLines>> {
        authorize(user, Action::Checkout, None)?;

        if baskets.is_empty() {
            return Err(ApiError::ValidationFailed(
                "Checkout requires at least one basket".to_string(),
            ));
        }

        let mut new_orders = Vec::with_capacity(baskets.len());
        for basket in baskets {
            new_orders.push(Self::new_order(user.id, basket)?);
        }

        let created = self.store.create_orders(new_orders).await?;
        info!(user_id = %user.id, count = created.len(), "Orders placed");

        let mut placed = Vec::with_capacity(created.len());
        for order in created {
            if order.order.shipping_method == Some(ShippingMethod::Ghn) {
                placed.push(self.request_shipment(order).await?);
            } else {
                placed.push(order);
            }
        }

        Ok(placed)
    }

    fn new_order(user_id: Uuid, basket: BasketRequest) -> ApiResult<NewOrder> {
        basket.validate()?;
        if basket.items.is_empty() {
            return Err(ApiError::ValidationFailed(format!(
                "Basket for shop {} has no items",
                basket.shop_id
            )));
        }
        for item in &basket.items {
            item.validate()?;
        }

        let lines: Vec<NewOrderLine> = basket
            .items
            .into_iter()
            .map(|item| NewOrderLine {
                product_id: item.product_id,
                quantity: item.quantity,
                total: item.total,
                color: item.color,
                note: item.note,
            })
            .collect();

        let quantity = inventory::total_quantity(&lines).ok_or_else(|| {
            ApiError::ValidationFailed(format!(
                "Basket for shop {} exceeds the maximum order quantity",
                basket.shop_id
            ))
        })?;
        let lines_total = inventory::lines_total(&lines).ok_or_else(|| {
            ApiError::ValidationFailed(format!(
                "Basket for shop {} exceeds the maximum order total",
                basket.shop_id
            ))
        })?;
        let total = match basket.total {
            Some(total) => {
                if total != lines_total {
                    // Vouchers and shipping fees are applied client-side
                    warn!(
                        shop_id = %basket.shop_id,
                        total,
                        lines_total,
                        "Basket total differs from the sum of its lines"
                    );
                }
                total
            }
            None => lines_total,
        };

        Ok(NewOrder {
            shop_id: basket.shop_id,
            user_id,
            address: basket.address,
            receiver: basket.receiver,
            phone: basket.phone,
            quantity,
            total,
            payment_method: basket.payment_method,
            shipping_method: basket.shipping_method,
            lines,
        })
    }

    /// Ask the carrier for a shipment. A carrier failure keeps the order and
    /// records the error on it.
    async fn request_shipment(&self, placed: OrderWithLines) -> ApiResult<OrderWithLines> {
        let request = ShipmentRequest::for_order(&placed.order, &placed.lines);

        let (code, error) = match self.carrier.create_shipment(&request).await {
            Ok(code) => (Some(code), None),
            Err(err) => {
                warn!(order_id = %placed.order.id, error = %err, "Shipment creation failed");
                (None, Some(err.to_string()))
            }
        };

        match self.store.record_shipment(placed.order.id, code, error).await? {
            Some(order) => Ok(OrderWithLines {
                order,
                lines: placed.lines,
            }),
            None => Ok(placed),
        }
    }

    /// Live order by id, or NotFound.
    pub async fn load(&self, id: Uuid) -> ApiResult<Order> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ApiError::not_found("order", id))
    }

    pub async fn get_order(&self, id: Uuid) -> ApiResult<OrderWithLines> {
        let key = order_key(id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<OrderWithLines>(&cached) {
                Ok(order) => return Ok(order),
                Err(err) => warn!(key = %key, error = %err, "Discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(err) => warn!(key = %key, error = %err, "Cache read failed"),
        }

        let order = self.load(id).await?;
        let lines = self.store.lines_for_orders(&[id]).await?;
        let order = OrderWithLines { order, lines };

        match serde_json::to_string(&order) {
            Ok(json) => {
                if let Err(err) = self.cache.set(&key, json, self.cache_ttl).await {
                    warn!(key = %key, error = %err, "Cache write failed");
                }
            }
            Err(err) => warn!(order_id = %id, error = %err, "Failed to serialize order for cache"),
        }

        Ok(order)
    }

    pub async fn user_history(
        &self,
        user: &AuthenticatedUser,
        query: HistoryQuery,
    ) -> ApiResult<Vec<OrderWithLines>> {
        authorize(user, Action::ViewHistory, None)?;

        let limit = query
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let orders = self
            .store
            .list_user_orders(user.id, limit, query.sort)
            .await?;

        self.attach_lines(orders).await
    }

    pub async fn shop_orders(
        &self,
        user: &AuthenticatedUser,
        shop_id: Uuid,
    ) -> ApiResult<Vec<OrderWithLines>> {
        authorize(user, Action::ViewShopOrders, None)?;

        let orders = self.store.list_shop_orders(shop_id).await?;
        self.attach_lines(orders).await
    }

    async fn attach_lines(&self, orders: Vec<Order>) -> ApiResult<Vec<OrderWithLines>> {
        let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
        let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for line in self.store.lines_for_orders(&ids).await? {
            by_order.entry(line.order_id).or_default().push(line);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithLines {
                lines: by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    /// Change shipping contact fields. State fields are never touched here.
    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
        update: UpdateOrderRequest,
    ) -> ApiResult<Order> {
        update.validate()?;
        if update.is_empty() {
            return Err(ApiError::ValidationFailed(
                "Nothing to update: provide address, receiver or phone".to_string(),
            ));
        }

        let order = self.load(id).await?;
        authorize(user, Action::UpdateOrder, Some(order.user_id))?;

        let updated = self
            .store
            .update_contact(id, &update)
            .await?
            .ok_or_else(|| ApiError::not_found("order", id))?;
        self.invalidate(id).await;

        info!(order_id = %id, user_id = %user.id, "Order contact updated");
        Ok(updated)
    }

    pub async fn delete(&self, user: &AuthenticatedUser, id: Uuid) -> ApiResult<()> {
        let order = self.load(id).await?;
        authorize(user, Action::DeleteOrder, Some(order.user_id))?;

        if !self.store.soft_delete(id).await? {
            return Err(ApiError::not_found("order", id));
        }
        self.invalidate(id).await;

        info!(order_id = %id, user_id = %user.id, "Order deleted");
        Ok(())
    }

    /// Stock is not given back on cancellation.
    pub async fn cancel(&self, user: &AuthenticatedUser, id: Uuid) -> ApiResult<Order> {
        self.transition(user, id, Action::CancelOrder, Transition::Cancel)
            .await
    }

    pub async fn confirm_received(&self, user: &AuthenticatedUser, id: Uuid) -> ApiResult<Order> {
        self.transition(user, id, Action::ConfirmOrder, Transition::ConfirmReceived)
            .await
    }

    pub async fn advance(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
        target: DeliveryState,
    ) -> ApiResult<Order> {
        self.transition(user, id, Action::AdvanceOrder, Transition::Advance(target))
            .await
    }

    async fn transition(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
        action: Action,
        transition: Transition,
    ) -> ApiResult<Order> {
        let order = self.load(id).await?;
        authorize(user, action, Some(order.user_id))?;

        transition
            .check(order.delivery_state)
            .map_err(|err| ApiError::InvalidState(err.to_string()))?;

        let outcome = self
            .store
            .transition_delivery(
                id,
                &transition.allowed_from(),
                transition.target(),
                transition.forces_paid(),
            )
            .await?;

        match outcome {
            CasOutcome::Applied(updated) => {
                if transition.forces_paid() && order.payment_state == PaymentState::Failed {
                    info!(order_id = %id, "Receipt confirmed; overriding failed payment to Paid");
                }
                self.invalidate(id).await;
                info!(
                    order_id = %id,
                    user_id = %user.id,
                    from = %order.delivery_state,
                    to = %updated.delivery_state,
                    "Order delivery state changed"
                );
                Ok(updated)
            }
            CasOutcome::Conflict(current) => Err(ApiError::InvalidState(
                match transition.check(current.delivery_state) {
                    Err(err) => err.to_string(),
                    Ok(_) => format!("Order {} was modified concurrently", id),
                },
            )),
            CasOutcome::Missing => Err(ApiError::not_found("order", id)),
        }
    }

    /// Settle a pending payment together with the gateway result that decided
    /// it. Used by gateway callbacks.
    pub async fn settle_payment(
        &self,
        id: Uuid,
        transaction_id: Uuid,
        state: PaymentState,
        result: &GatewayResult,
    ) -> ApiResult<CasOutcome<Order>> {
        let outcome = self
            .store
            .settle_transaction(id, transaction_id, state, result)
            .await?;
        if let CasOutcome::Applied(_) = outcome {
            self.invalidate(id).await;
        }
        Ok(outcome)
    }

    async fn invalidate(&self, id: Uuid) {
        let key = order_key(id);
        if let Err(err) = self.cache.invalidate(&key).await {
            warn!(key = %key, error = %err, "Cache invalidation failed");
        } else {
            debug!(key = %key, "Order cache invalidated");
        }
    }
}
