//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::JwtKeys;
use crate::cache::ResponseCache;
use crate::carrier::CarrierClient;
use crate::config::AppConfig;
use crate::payment::{GatewayTransport, MomoGateway, VnpayGateway};
use crate::services::{OrderService, PaymentService};
use crate::store::Store;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<OrderService>,
    pub payment_service: Arc<PaymentService>,
    pub jwt_keys: JwtKeys,
}

/// External collaborators the services are wired to.
pub struct Collaborators {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn ResponseCache>,
    pub carrier: Arc<dyn CarrierClient>,
    pub transport: Arc<dyn GatewayTransport>,
}

impl AppState {
    pub fn new(
        order_service: Arc<OrderService>,
        payment_service: Arc<PaymentService>,
        jwt_keys: JwtKeys,
    ) -> Self {
        Self {
            order_service,
            payment_service,
            jwt_keys,
        }
    }

    /// Wire services from configuration and collaborators.
    pub fn assemble(config: &AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            cache,
            carrier,
            transport,
        } = collaborators;

        let order_service = Arc::new(OrderService::new(
            store.clone(),
            cache,
            carrier,
            config.cache_ttl,
        ));

        let momo = config
            .momo
            .clone()
            .map(|momo| MomoGateway::new(momo, transport.clone()));
        let vnpay = config
            .vnpay
            .clone()
            .map(|vnpay| VnpayGateway::new(vnpay, transport.clone()));

        let payment_service = Arc::new(PaymentService::new(
            store,
            order_service.clone(),
            momo,
            vnpay,
        ));

        Self::new(
            order_service,
            payment_service,
            JwtKeys::new(&config.jwt_secret),
        )
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt_keys.clone()
    }
}

impl FromRef<AppState> for Arc<OrderService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.order_service.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_service.clone()
    }
}
