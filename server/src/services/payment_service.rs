//! Payment service layer - gateway initiation and callback reconciliation

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::OrderService;
use crate::auth::{authorize, Action, AuthenticatedUser};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Gateway, MomoCreateRequest, NewPaymentTransaction, Order, PaymentInitiated, PaymentMethod,
    PaymentState, PaymentTransaction, VnpayCreateRequest, VnpayQueryRequest, VnpayRefundRequest,
};
use crate::payment::vnpay::MerchantCall;
use crate::payment::{
    CallbackOutcome, CallbackSpec, GatewayError, MomoGateway, SignedRequest, VnpayGateway,
};
use crate::store::{CasOutcome, Store};

pub struct PaymentService {
    store: Arc<dyn Store>,
    orders: Arc<OrderService>,
    momo: Option<MomoGateway>,
    vnpay: Option<VnpayGateway>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        orders: Arc<OrderService>,
        momo: Option<MomoGateway>,
        vnpay: Option<VnpayGateway>,
    ) -> Self {
        Self {
            store,
            orders,
            momo,
            vnpay,
        }
    }

    fn momo(&self) -> ApiResult<&MomoGateway> {
        self.momo
            .as_ref()
            .ok_or_else(|| ApiError::UpstreamFailure("MoMo payments are not configured".to_string()))
    }

    fn vnpay(&self) -> ApiResult<&VnpayGateway> {
        self.vnpay
            .as_ref()
            .ok_or_else(|| ApiError::UpstreamFailure("VNPay payments are not configured".to_string()))
    }

    /// Order the caller may pay for with `method`.
    async fn payable_order(
        &self,
        user: &AuthenticatedUser,
        order_id: Uuid,
        method: PaymentMethod,
    ) -> ApiResult<Order> {
        let order = self.orders.load(order_id).await?;
        authorize(user, Action::InitiatePayment, Some(order.user_id))?;

        if order.payment_method != method {
            return Err(ApiError::ValidationFailed(format!(
                "Order {} is not paid with {:?}",
                order.id, method
            )));
        }
        if order.payment_state != PaymentState::Pending {
            return Err(ApiError::InvalidState(format!(
                "Order {} payment is already {}",
                order.id, order.payment_state
            )));
        }

        Ok(order)
    }

    async fn open_transaction(
        &self,
        gateway: Gateway,
        order: &Order,
        request: &SignedRequest,
    ) -> ApiResult<PaymentTransaction> {
        let transaction = self
            .store
            .insert_transaction(NewPaymentTransaction {
                gateway,
                reference: request.reference.clone(),
                request_id: request.request_id.clone(),
                order_id: order.id,
                amount: order.total,
                order_info: request.order_info.clone(),
                signature: request.signature.clone(),
                request_params: request.params.clone(),
            })
            .await?;

        info!(
            gateway = gateway.as_str(),
            reference = %transaction.reference,
            order_id = %order.id,
            amount = order.total,
            "Payment transaction opened"
        );
        Ok(transaction)
    }

    pub async fn initiate_momo(
        &self,
        user: &AuthenticatedUser,
        request: MomoCreateRequest,
    ) -> ApiResult<PaymentInitiated> {
        let gateway = self.momo()?;
        let order = self
            .payable_order(user, request.order_id, PaymentMethod::Momo)
            .await?;

        let order_info = request
            .order_info
            .filter(|info| !info.trim().is_empty())
            .unwrap_or_else(|| format!("Payment for order {}", order.id));
        let signed =
            gateway.build_request(gateway.new_reference(Utc::now()), order.total, &order_info)?;

        // Persisted first so an IPN racing the redirect finds the row.
        let transaction = self.open_transaction(Gateway::Momo, &order, &signed).await?;
        let redirect_url = gateway.submit(&signed).await?;

        Ok(PaymentInitiated {
            reference: signed.reference,
            redirect_url,
            transaction,
        })
    }

    pub async fn initiate_vnpay(
        &self,
        user: &AuthenticatedUser,
        request: VnpayCreateRequest,
        ip_addr: &str,
    ) -> ApiResult<PaymentInitiated> {
        let gateway = self.vnpay()?;
        let order = self
            .payable_order(user, request.order_id, PaymentMethod::Vnpay)
            .await?;

        let now = Utc::now();
        let reference = gateway.new_reference(now);
        let order_info = format!("Thanh toan don hang {}", reference);
        let payment =
            gateway.build_payment(reference, order.total, &order_info, &request, ip_addr, now)?;

        let transaction = self
            .open_transaction(Gateway::Vnpay, &order, &payment.request)
            .await?;

        Ok(PaymentInitiated {
            reference: payment.request.reference,
            redirect_url: payment.redirect_url,
            transaction,
        })
    }

    /// Verify a gateway callback and settle the order's payment at most once.
    ///
    /// Never fails: every problem maps to a callback code the gateway understands.
    pub async fn handle_callback(
        &self,
        gateway: Gateway,
        params: &HashMap<String, String>,
    ) -> CallbackOutcome {
        match self.reconcile(gateway, params).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(gateway = gateway.as_str(), error = %err, "Callback reconciliation failed");
                CallbackOutcome::Unavailable
            }
        }
    }

    async fn reconcile(
        &self,
        gateway: Gateway,
        params: &HashMap<String, String>,
    ) -> ApiResult<CallbackOutcome> {
        let spec = CallbackSpec::for_gateway(gateway);

        let verified = match gateway {
            Gateway::Momo => match &self.momo {
                Some(momo) => momo.verify_callback(params),
                None => return Ok(CallbackOutcome::Unavailable),
            },
            Gateway::Vnpay => match &self.vnpay {
                Some(vnpay) => vnpay.verify_callback(params),
                None => return Ok(CallbackOutcome::Unavailable),
            },
        }
        .map_err(GatewayError::from)?;

        if !verified {
            warn!(
                gateway = gateway.as_str(),
                reference = spec.reference(params).unwrap_or_default(),
                "Callback signature mismatch"
            );
            return Ok(CallbackOutcome::SignatureMismatch);
        }

        let Some(reference) = spec.reference(params) else {
            return Ok(CallbackOutcome::Malformed);
        };
        let Some(transaction) = self.store.find_transaction(gateway, reference).await? else {
            return Ok(CallbackOutcome::NotFound);
        };
        let Some(order) = self.store.get_order(transaction.order_id).await? else {
            return Ok(CallbackOutcome::NotFound);
        };

        if spec.amount_matches(params, transaction.amount) == Some(false) {
            warn!(
                gateway = gateway.as_str(),
                reference = %reference,
                expected = transaction.amount,
                "Callback amount does not match"
            );
            return Ok(CallbackOutcome::AmountMismatch);
        }

        if order.payment_state != PaymentState::Pending {
            return Ok(CallbackOutcome::AlreadyProcessed(order.payment_state));
        }

        let Some(result) = spec.result(params) else {
            return Ok(CallbackOutcome::Malformed);
        };
        let target = if spec.is_success(&result) {
            PaymentState::Paid
        } else {
            PaymentState::Failed
        };

        match self
            .orders
            .settle_payment(order.id, transaction.id, target, &result)
            .await?
        {
            CasOutcome::Applied(_) => {
                info!(
                    gateway = gateway.as_str(),
                    reference = %reference,
                    order_id = %order.id,
                    result_code = %result.result_code,
                    payment_state = %target,
                    "Payment settled"
                );
                Ok(match target {
                    PaymentState::Paid => CallbackOutcome::Confirmed,
                    _ => CallbackOutcome::PaymentFailed,
                })
            }
            CasOutcome::Conflict(current) => {
                Ok(CallbackOutcome::AlreadyProcessed(current.payment_state))
            }
            CasOutcome::Missing => Ok(CallbackOutcome::NotFound),
        }
    }

    async fn vnpay_transaction(&self, txn_ref: &str) -> ApiResult<PaymentTransaction> {
        self.store
            .find_transaction(Gateway::Vnpay, txn_ref)
            .await?
            .ok_or_else(|| ApiError::not_found("VNPay transaction", txn_ref))
    }

    pub async fn vnpay_query(
        &self,
        user: &AuthenticatedUser,
        request: VnpayQueryRequest,
        ip_addr: &str,
    ) -> ApiResult<Value> {
        authorize(user, Action::QueryPayment, None)?;
        let gateway = self.vnpay()?;
        self.vnpay_transaction(&request.txn_ref).await?;

        let response = gateway
            .query(MerchantCall {
                txn_ref: &request.txn_ref,
                transaction_date: &request.transaction_date,
                ip_addr,
                now: Utc::now(),
            })
            .await?;

        Ok(response)
    }

    pub async fn vnpay_refund(
        &self,
        user: &AuthenticatedUser,
        request: VnpayRefundRequest,
        ip_addr: &str,
    ) -> ApiResult<Value> {
        authorize(user, Action::RefundPayment, None)?;
        let gateway = self.vnpay()?;
        let transaction = self.vnpay_transaction(&request.txn_ref).await?;

        if !matches!(request.transaction_type.as_str(), "02" | "03") {
            return Err(ApiError::ValidationFailed(
                "transaction_type must be 02 (full) or 03 (partial)".to_string(),
            ));
        }
        if request.amount <= 0 || request.amount > transaction.amount {
            return Err(ApiError::ValidationFailed(format!(
                "Refund amount must be between 1 and {}",
                transaction.amount
            )));
        }

        let response = gateway
            .refund(
                MerchantCall {
                    txn_ref: &request.txn_ref,
                    transaction_date: &request.transaction_date,
                    ip_addr,
                    now: Utc::now(),
                },
                request.amount,
                &request.transaction_type,
                &user.id.to_string(),
            )
            .await?;

        info!(
            txn_ref = %request.txn_ref,
            amount = request.amount,
            user_id = %user.id,
            "VNPay refund requested"
        );
        Ok(response)
    }
}
