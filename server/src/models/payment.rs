use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::PaymentState;

/// Payment gateway a transaction was opened with
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "payment_gateway", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Momo,
    Vnpay,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Momo => "momo",
            Gateway::Vnpay => "vnpay",
        }
    }
}

/// Local mirror of a gateway-side transaction
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub gateway: Gateway,
    pub reference: String, // MoMo orderId / VNPay vnp_TxnRef
    pub request_id: String,
    pub order_id: Uuid,
    pub amount: i64,
    pub order_info: String,
    pub signature: String,
    pub request_params: Json<BTreeMap<String, String>>,
    pub result_code: Option<String>,
    pub bank_code: Option<String>,
    pub bank_tran_no: Option<String>,
    pub card_type: Option<String>,
    pub transaction_no: Option<String>,
    pub pay_date: Option<String>,
    pub response_time: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to open a transaction row
#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub gateway: Gateway,
    pub reference: String,
    pub request_id: String,
    pub order_id: Uuid,
    pub amount: i64,
    pub order_info: String,
    pub signature: String,
    pub request_params: BTreeMap<String, String>,
}

/// Final result reported by a gateway callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayResult {
    pub result_code: String,
    pub bank_code: Option<String>,
    pub bank_tran_no: Option<String>,
    pub card_type: Option<String>,
    pub transaction_no: Option<String>,
    pub pay_date: Option<String>,
    pub response_time: Option<String>,
}

/// Request DTO for opening a MoMo payment
#[derive(Debug, Deserialize)]
pub struct MomoCreateRequest {
    pub order_id: Uuid,
    pub order_info: Option<String>,
}

/// Request DTO for opening a VNPay payment
#[derive(Debug, Deserialize)]
pub struct VnpayCreateRequest {
    pub order_id: Uuid,
    pub bank_code: Option<String>,
    pub language: Option<String>,
}

/// Response DTO for payment initiation
#[derive(Debug, Serialize)]
pub struct PaymentInitiated {
    pub reference: String,
    pub redirect_url: String,
    pub transaction: PaymentTransaction,
}

/// Request DTO for a VNPay transaction status query
#[derive(Debug, Deserialize)]
pub struct VnpayQueryRequest {
    pub txn_ref: String,
    /// Original vnp_CreateDate of the transaction (yyyyMMddHHmmss)
    pub transaction_date: String,
}

/// Request DTO for a VNPay refund
#[derive(Debug, Deserialize)]
pub struct VnpayRefundRequest {
    pub txn_ref: String,
    pub transaction_date: String,
    pub amount: i64,
    /// "02" full refund, "03" partial refund
    pub transaction_type: String,
}

/// Outcome of a callback as reported on the return (redirect) routes
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackReport {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_state: Option<PaymentState>,
}
