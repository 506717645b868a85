//! Shipping carrier collaborator (GHN)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::CarrierConfig;
use crate::models::{Order, OrderLine, PaymentMethod};

#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("carrier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("carrier rejected the shipment ({code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("carrier is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentItem {
    pub name: String,
    pub code: String,
    pub quantity: i32,
    pub price: i64,
}

/// GHN `shipping-order/create` payload.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentRequest {
    pub payment_type_id: u8,
    pub required_note: &'static str,
    pub client_order_code: String,
    pub to_name: String,
    pub to_phone: String,
    pub to_address: String,
    pub cod_amount: i64,
    pub weight: u32,
    pub service_type_id: u8,
    pub items: Vec<ShipmentItem>,
}

impl ShipmentRequest {
    /// Buyer pays the shipping fee; cash is collected only for COD orders.
    pub fn for_order(order: &Order, lines: &[OrderLine]) -> Self {
        let cod_amount = match order.payment_method {
            PaymentMethod::Cod => order.total,
            _ => 0,
        };

        Self {
            payment_type_id: 2,
            required_note: "KHONGCHOXEMHANG",
            client_order_code: order.id.to_string(),
            to_name: order
                .receiver
                .clone()
                .unwrap_or_else(|| order.phone.clone()),
            to_phone: order.phone.clone(),
            to_address: order.address.clone(),
            cod_amount,
            weight: 200 * lines.len().max(1) as u32,
            service_type_id: 2,
            items: lines
                .iter()
                .map(|line| ShipmentItem {
                    name: line.product_id.to_string(),
                    code: line.product_id.simple().to_string(),
                    quantity: line.quantity,
                    price: line.total / i64::from(line.quantity.max(1)),
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Create a shipping order and return the carrier's order code.
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<String, CarrierError>;
}

#[derive(Debug, Deserialize)]
struct GhnResponse {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<GhnOrder>,
}

#[derive(Debug, Deserialize)]
struct GhnOrder {
    order_code: String,
}

pub struct GhnClient {
    client: Client,
    config: CarrierConfig,
}

impl GhnClient {
    pub fn new(client: Client, config: CarrierConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CarrierClient for GhnClient {
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<String, CarrierError> {
        let url = format!("{}/shipping-order/create", self.config.url.trim_end_matches('/'));

        let response: GhnResponse = self
            .client
            .post(&url)
            .header("Token", &self.config.token)
            .header("ShopId", &self.config.shop_id)
            .json(request)
            .send()
            .await?
            .json()
            .await?;

        match response {
            GhnResponse {
                code: 200,
                data: Some(order),
                ..
            } => {
                info!(
                    client_order_code = %request.client_order_code,
                    order_code = %order.order_code,
                    "GHN shipment created"
                );
                Ok(order.order_code)
            }
            GhnResponse { code, message, .. } => {
                warn!(code, message = %message, "GHN rejected shipment");
                Err(CarrierError::Rejected { code, message })
            }
        }
    }
}

/// Stand-in used when no carrier credentials are configured.
pub struct DisabledCarrier;

#[async_trait]
impl CarrierClient for DisabledCarrier {
    async fn create_shipment(&self, _request: &ShipmentRequest) -> Result<String, CarrierError> {
        Err(CarrierError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryState, PaymentState};
    use chrono::Utc;
    use uuid::Uuid;

    fn order(payment_method: PaymentMethod) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            shop_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            address: "39 NTT".into(),
            receiver: None,
            phone: "0332190444".into(),
            quantity: 3,
            total: 90_000,
            payment_method,
            payment_state: PaymentState::Pending,
            shipping_method: None,
            carrier_order_code: None,
            shipment_error: None,
            delivery_state: DeliveryState::Ordered,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn line(order: &Order, quantity: i32, total: i64) -> OrderLine {
        OrderLine {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Uuid::new_v4(),
            shop_id: order.shop_id,
            quantity,
            total,
            color: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cod_orders_collect_the_total() {
        let order = order(PaymentMethod::Cod);
        let lines = vec![line(&order, 2, 60_000), line(&order, 1, 30_000)];

        let request = ShipmentRequest::for_order(&order, &lines);

        assert_eq!(request.cod_amount, 90_000);
        assert_eq!(request.to_name, "0332190444");
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[0].price, 30_000);
        assert_eq!(request.client_order_code, order.id.to_string());
    }

    #[test]
    fn prepaid_orders_collect_nothing() {
        let order = order(PaymentMethod::Vnpay);
        let request = ShipmentRequest::for_order(&order, &[]);
        assert_eq!(request.cod_amount, 0);
    }
}
