#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use marketplace_server::app_state::{AppState, Collaborators};
use marketplace_server::auth::{issue_token, JwtKeys};
use marketplace_server::cache::MemoryCache;
use marketplace_server::carrier::{CarrierClient, CarrierError, ShipmentRequest};
use marketplace_server::config::AppConfig;
use marketplace_server::models::{
    DeliveryState, Gateway, GatewayResult, HistorySort, InventoryRecord, NewPaymentTransaction,
    Order, OrderLine, OrderWithLines, PaymentState, PaymentTransaction, UpdateOrderRequest,
    UserRole,
};
use marketplace_server::payment::{signature, GatewayError, GatewayTransport, HashAlgorithm};
use marketplace_server::routes;
use marketplace_server::store::{
    self, CasOutcome, InventoryStore, MemoryStore, NewOrder, OrderStore, PaymentStore, Store,
    StoreError,
};

pub const MOMO_ACCESS_KEY: &str = "test-access-key";
pub const MOMO_SECRET: &str = "test-momo-secret";
pub const VNP_SECRET: &str = "test-vnpay-secret";

/// Carrier that answers with a canned result and remembers what it was asked.
#[derive(Default)]
pub struct StubCarrier {
    failure: Mutex<Option<String>>,
    pub requests: Mutex<Vec<ShipmentRequest>>,
}

impl StubCarrier {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl CarrierClient for StubCarrier {
    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<String, CarrierError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(CarrierError::Rejected { code: 400, message }),
            None => Ok(format!("GHN-{}", request.client_order_code)),
        }
    }
}

/// Gateway transport returning a configurable JSON body.
pub struct StubTransport {
    response: Mutex<Value>,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl Default for StubTransport {
    fn default() -> Self {
        Self {
            response: Mutex::new(json!({
                "resultCode": 0,
                "message": "Successful.",
                "payUrl": "https://test-payment.momo.vn/pay/abc",
            })),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl StubTransport {
    pub fn respond_with(&self, response: Value) {
        *self.response.lock().unwrap() = response;
    }
}

#[async_trait]
impl GatewayTransport for StubTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Memory store whose next `failures` payment settlements fail as if the
/// database connection dropped mid-request.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderStore for FlakyStore {
    async fn create_orders(&self, orders: Vec<NewOrder>) -> store::Result<Vec<OrderWithLines>> {
        self.inner.create_orders(orders).await
    }

    async fn get_order(&self, id: Uuid) -> store::Result<Option<Order>> {
        self.inner.get_order(id).await
    }

    async fn lines_for_orders(&self, order_ids: &[Uuid]) -> store::Result<Vec<OrderLine>> {
        self.inner.lines_for_orders(order_ids).await
    }

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        limit: i64,
        sort: HistorySort,
    ) -> store::Result<Vec<Order>> {
        self.inner.list_user_orders(user_id, limit, sort).await
    }

    async fn list_shop_orders(&self, shop_id: Uuid) -> store::Result<Vec<Order>> {
        self.inner.list_shop_orders(shop_id).await
    }

    async fn transition_delivery(
        &self,
        id: Uuid,
        from: &[DeliveryState],
        to: DeliveryState,
        force_paid: bool,
    ) -> store::Result<CasOutcome<Order>> {
        self.inner.transition_delivery(id, from, to, force_paid).await
    }

    async fn update_contact(
        &self,
        id: Uuid,
        update: &UpdateOrderRequest,
    ) -> store::Result<Option<Order>> {
        self.inner.update_contact(id, update).await
    }

    async fn soft_delete(&self, id: Uuid) -> store::Result<bool> {
        self.inner.soft_delete(id).await
    }

    async fn record_shipment(
        &self,
        id: Uuid,
        carrier_order_code: Option<String>,
        shipment_error: Option<String>,
    ) -> store::Result<Option<Order>> {
        self.inner
            .record_shipment(id, carrier_order_code, shipment_error)
            .await
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn stock_for(
        &self,
        product_id: Uuid,
        shop_id: Uuid,
    ) -> store::Result<Option<InventoryRecord>> {
        self.inner.stock_for(product_id, shop_id).await
    }

    async fn sold_quantity(&self, product_id: Uuid) -> store::Result<Option<i64>> {
        self.inner.sold_quantity(product_id).await
    }
}

#[async_trait]
impl PaymentStore for FlakyStore {
    async fn insert_transaction(
        &self,
        tx: NewPaymentTransaction,
    ) -> store::Result<PaymentTransaction> {
        self.inner.insert_transaction(tx).await
    }

    async fn find_transaction(
        &self,
        gateway: Gateway,
        reference: &str,
    ) -> store::Result<Option<PaymentTransaction>> {
        self.inner.find_transaction(gateway, reference).await
    }

    async fn settle_transaction(
        &self,
        order_id: Uuid,
        transaction_id: Uuid,
        to: PaymentState,
        result: &GatewayResult,
    ) -> store::Result<CasOutcome<Order>> {
        if self.take_failure() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner
            .settle_transaction(order_id, transaction_id, to, result)
            .await
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub carrier: Arc<StubCarrier>,
    pub transport: Arc<StubTransport>,
    keys: JwtKeys,
}

fn test_config() -> AppConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("JWT_SECRET", "integration-secret"),
        ("MOMO_ACCESS_KEY", MOMO_ACCESS_KEY),
        ("MOMO_SECRET_KEY", MOMO_SECRET),
        ("VNP_TMN_CODE", "TESTTMN1"),
        ("VNP_HASH_SECRET", VNP_SECRET),
    ]);
    AppConfig::from_lookup(|name: &str| vars.get(name).map(|v| v.to_string()))
        .expect("test configuration is valid")
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(store.clone(), store)
    }

    /// App whose services run against `backend` while tests inspect and seed
    /// the underlying memory store directly.
    pub fn with_store(store: Arc<MemoryStore>, backend: Arc<dyn Store>) -> Self {
        let config = test_config();
        let cache = Arc::new(MemoryCache::new());
        let carrier = Arc::new(StubCarrier::default());
        let transport = Arc::new(StubTransport::default());

        let state = AppState::assemble(
            &config,
            Collaborators {
                store: backend,
                cache: cache.clone(),
                carrier: carrier.clone(),
                transport: transport.clone(),
            },
        );

        Self {
            router: routes::app(state),
            store,
            cache,
            carrier,
            transport,
            keys: JwtKeys::new(&config.jwt_secret),
        }
    }

    pub fn token(&self, user_id: Uuid, role: UserRole) -> String {
        issue_token(&self.keys, user_id, role, Duration::hours(1)).unwrap()
    }

    /// Register a product and, optionally, a stock record for it in `shop_id`.
    pub async fn seed_product(&self, shop_id: Uuid, stock: Option<i32>) -> Uuid {
        let product_id = Uuid::new_v4();
        self.store.insert_product(product_id, 0).await;
        if let Some(quantity) = stock {
            self.store
                .insert_stock(InventoryRecord {
                    id: Uuid::new_v4(),
                    product_id,
                    stock_id: Uuid::new_v4(),
                    shop_id,
                    quantity,
                })
                .await;
        }
        product_id
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Check out a single COD basket and return the created order id.
    pub async fn place_order(&self, token: &str, shop_id: Uuid, product_id: Uuid, quantity: i32) -> Uuid {
        self.place_order_with(token, basket(shop_id, product_id, quantity, "COD"))
            .await
    }

    pub async fn place_order_with(&self, token: &str, basket: Value) -> Uuid {
        let (status, body) = self
            .request(Method::POST, "/api/orders/checkout", Some(token), Some(json!([basket])))
            .await;
        assert_eq!(status, StatusCode::CREATED, "checkout failed: {body}");
        body["data"][0]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn order(&self, id: Uuid) -> (StatusCode, Value) {
        self.request(Method::GET, &format!("/api/orders/{id}"), None, None)
            .await
    }

    /// Move an order forward as a seller.
    pub async fn advance(&self, id: Uuid, state: &str) -> StatusCode {
        let seller = self.token(Uuid::new_v4(), UserRole::Seller);
        let (status, _) = self
            .request(
                Method::PUT,
                &format!("/api/orders/{id}/state"),
                Some(&seller),
                Some(json!({ "state": state })),
            )
            .await;
        status
    }
}

pub fn basket(shop_id: Uuid, product_id: Uuid, quantity: i32, payment_method: &str) -> Value {
    json!({
        "shop_id": shop_id,
        "address": "268 Ly Thuong Kiet, District 10",
        "phone": "0901234567",
        "receiver": "Nguyen Van A",
        "payment_method": payment_method,
        "items": [{
            "product_id": product_id,
            "quantity": quantity,
            "total": 25_000 * i64::from(quantity),
            "color": "blue",
        }],
    })
}

pub fn query_string(params: &HashMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// VNPay callback parameters signed with the test secret.
pub fn vnpay_callback(reference: &str, amount_vnd: i64, response_code: &str) -> HashMap<String, String> {
    vnpay_callback_with_raw_amount(reference, &(amount_vnd * 100).to_string(), response_code)
}

/// Signed VNPay callback carrying `vnp_Amount` exactly as given.
pub fn vnpay_callback_with_raw_amount(
    reference: &str,
    vnp_amount: &str,
    response_code: &str,
) -> HashMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("vnp_TmnCode".to_string(), "TESTTMN1".to_string());
    params.insert("vnp_TxnRef".to_string(), reference.to_string());
    params.insert("vnp_Amount".to_string(), vnp_amount.to_string());
    params.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    params.insert("vnp_TransactionStatus".to_string(), response_code.to_string());
    params.insert("vnp_BankCode".to_string(), "NCB".to_string());
    params.insert("vnp_BankTranNo".to_string(), "VNP14226112".to_string());
    params.insert("vnp_CardType".to_string(), "ATM".to_string());
    params.insert("vnp_PayDate".to_string(), "20240309193500".to_string());
    params.insert("vnp_TransactionNo".to_string(), "14226112".to_string());
    params.insert("vnp_OrderInfo".to_string(), format!("Thanh toan don hang {reference}"));

    let secure_hash = signature::sign(HashAlgorithm::Sha512, VNP_SECRET, &params).unwrap();
    let mut params: HashMap<String, String> = params.into_iter().collect();
    params.insert("vnp_SecureHashType".to_string(), "HmacSHA512".to_string());
    params.insert("vnp_SecureHash".to_string(), secure_hash);
    params
}

/// MoMo IPN parameters signed with the test secret and access key.
pub fn momo_callback(reference: &str, amount: i64, result_code: &str) -> HashMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("partnerCode".to_string(), "MOMO".to_string());
    params.insert("orderId".to_string(), reference.to_string());
    params.insert("requestId".to_string(), reference.to_string());
    params.insert("amount".to_string(), amount.to_string());
    params.insert("orderInfo".to_string(), "Payment for order".to_string());
    params.insert("orderType".to_string(), "momo_wallet".to_string());
    params.insert("transId".to_string(), "4088878653".to_string());
    params.insert("resultCode".to_string(), result_code.to_string());
    params.insert("message".to_string(), "Successful.".to_string());
    params.insert("payType".to_string(), "qr".to_string());
    params.insert("responseTime".to_string(), "1710000000000".to_string());
    params.insert("extraData".to_string(), String::new());

    let mut signed = params.clone();
    signed.insert("accessKey".to_string(), MOMO_ACCESS_KEY.to_string());
    let sig = signature::sign(HashAlgorithm::Sha256, MOMO_SECRET, &signed).unwrap();

    let mut params: HashMap<String, String> = params.into_iter().collect();
    params.insert("signature".to_string(), sig);
    params
}
