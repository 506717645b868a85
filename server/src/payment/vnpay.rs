//! VNPay (HMAC-SHA512) payment gateway
//!
//! Payments are started by redirecting the buyer to a signed URL, so
//! initiation makes no outbound call. Query and refund go to the merchant
//! API with a pipe-joined signature.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::callback::VNPAY;
use super::signature::{self, SignatureError};
use super::{GatewayError, GatewayTransport, SignedRequest};
use crate::config::VnpayConfig;
use crate::models::VnpayCreateRequest;

const VERSION: &str = "2.1.0";
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// VNPay timestamps are wall-clock time in GMT+7.
fn gateway_time(now: DateTime<Utc>, format: &str) -> String {
    (now + Duration::hours(7)).format(format).to_string()
}

/// VNPay amounts are sent in hundredths of a dong.
fn scaled_amount(amount: i64) -> Result<i64, GatewayError> {
    amount
        .checked_mul(100)
        .filter(|scaled| *scaled > 0)
        .ok_or(GatewayError::AmountOutOfRange(amount))
}

#[derive(Debug, Clone)]
pub struct VnpayPayment {
    pub request: SignedRequest,
    pub redirect_url: String,
}

/// Parameters shared by querydr and refund.
pub struct MerchantCall<'a> {
    pub txn_ref: &'a str,
    pub transaction_date: &'a str,
    pub ip_addr: &'a str,
    pub now: DateTime<Utc>,
}

pub struct VnpayGateway {
    config: VnpayConfig,
    transport: Arc<dyn GatewayTransport>,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig, transport: Arc<dyn GatewayTransport>) -> Self {
        Self { config, transport }
    }

    /// Day-of-month and time of creation plus four random digits.
    pub fn new_reference(&self, now: DateTime<Utc>) -> String {
        let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
        format!("{}{:04}", gateway_time(now, "%d%H%M%S"), suffix)
    }

    pub fn build_payment(
        &self,
        reference: String,
        amount: i64,
        order_info: &str,
        options: &VnpayCreateRequest,
        ip_addr: &str,
        now: DateTime<Utc>,
    ) -> Result<VnpayPayment, GatewayError> {
        let scaled = scaled_amount(amount)?;
        let locale = options
            .language
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or("vn");

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Locale".to_string(), locale.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), reference.clone());
        params.insert("vnp_OrderInfo".to_string(), order_info.to_string());
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Amount".to_string(), scaled.to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), ip_addr.to_string());
        params.insert("vnp_CreateDate".to_string(), gateway_time(now, DATE_FORMAT));
        if let Some(bank_code) = options.bank_code.as_deref().filter(|code| !code.is_empty()) {
            params.insert("vnp_BankCode".to_string(), bank_code.to_string());
        }

        let query = signature::canonicalize(&params);
        let signature = signature::sign_raw(VNPAY.algorithm, &self.config.hash_secret, &query)?;
        let redirect_url = format!(
            "{}?{}&{}={}",
            self.config.url, query, VNPAY.signature_field, signature
        );

        Ok(VnpayPayment {
            request: SignedRequest {
                request_id: Uuid::new_v4().simple().to_string(),
                reference,
                order_info: order_info.to_string(),
                params,
                signature,
            },
            redirect_url,
        })
    }

    pub fn verify_callback(&self, params: &HashMap<String, String>) -> Result<bool, SignatureError> {
        let Some(received) = VNPAY.signature(params) else {
            return Ok(false);
        };

        signature::verify(
            VNPAY.algorithm,
            &self.config.hash_secret,
            &signature::canonicalize(&VNPAY.signed_params(params)),
            received,
        )
    }

    /// Ask VNPay for the status of a transaction (`querydr`).
    pub async fn query(&self, call: MerchantCall<'_>) -> Result<Value, GatewayError> {
        let request_id = Uuid::new_v4().simple().to_string();
        let create_date = gateway_time(call.now, DATE_FORMAT);
        let order_info = format!("Query transaction {}", call.txn_ref);

        let data = [
            request_id.as_str(),
            VERSION,
            "querydr",
            self.config.tmn_code.as_str(),
            call.txn_ref,
            call.transaction_date,
            create_date.as_str(),
            call.ip_addr,
            order_info.as_str(),
        ]
        .join("|");
        let secure_hash = signature::sign_raw(VNPAY.algorithm, &self.config.hash_secret, &data)?;

        let body = json!({
            "vnp_RequestId": request_id,
            "vnp_Version": VERSION,
            "vnp_Command": "querydr",
            "vnp_TmnCode": self.config.tmn_code,
            "vnp_TxnRef": call.txn_ref,
            "vnp_OrderInfo": order_info,
            "vnp_TransactionDate": call.transaction_date,
            "vnp_CreateDate": create_date,
            "vnp_IpAddr": call.ip_addr,
            "vnp_SecureHash": secure_hash,
        });

        info!(txn_ref = %call.txn_ref, "Querying VNPay transaction");
        self.transport.post_json(&self.config.api, &body).await
    }

    /// Refund a transaction, fully (`02`) or partially (`03`).
    pub async fn refund(
        &self,
        call: MerchantCall<'_>,
        amount: i64,
        transaction_type: &str,
        created_by: &str,
    ) -> Result<Value, GatewayError> {
        let request_id = Uuid::new_v4().simple().to_string();
        let create_date = gateway_time(call.now, DATE_FORMAT);
        let order_info = format!("Refund transaction {}", call.txn_ref);
        let amount = scaled_amount(amount)?.to_string();
        let transaction_no = "0";

        let data = [
            request_id.as_str(),
            VERSION,
            "refund",
            self.config.tmn_code.as_str(),
            transaction_type,
            call.txn_ref,
            amount.as_str(),
            transaction_no,
            call.transaction_date,
            created_by,
            create_date.as_str(),
            call.ip_addr,
            order_info.as_str(),
        ]
        .join("|");
        let secure_hash = signature::sign_raw(VNPAY.algorithm, &self.config.hash_secret, &data)?;

        let body = json!({
            "vnp_RequestId": request_id,
            "vnp_Version": VERSION,
            "vnp_Command": "refund",
            "vnp_TmnCode": self.config.tmn_code,
            "vnp_TransactionType": transaction_type,
            "vnp_TxnRef": call.txn_ref,
            "vnp_Amount": amount,
            "vnp_TransactionNo": transaction_no,
            "vnp_CreateBy": created_by,
            "vnp_OrderInfo": order_info,
            "vnp_TransactionDate": call.transaction_date,
            "vnp_CreateDate": create_date,
            "vnp_IpAddr": call.ip_addr,
            "vnp_SecureHash": secure_hash,
        });

        info!(txn_ref = %call.txn_ref, transaction_type = %transaction_type, "Requesting VNPay refund");
        self.transport.post_json(&self.config.api, &body).await
    }
}
