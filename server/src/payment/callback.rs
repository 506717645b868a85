//! Callback layout of each gateway and the codes answered to them

use std::collections::{BTreeMap, HashMap};

use super::signature::HashAlgorithm;
use crate::models::{Gateway, GatewayResult, PaymentState};

/// Where a gateway puts each piece of a callback.
#[derive(Debug)]
pub struct CallbackSpec {
    pub gateway: Gateway,
    pub algorithm: HashAlgorithm,
    pub signature_field: &'static str,
    /// Fields dropped together with the signature before verification.
    pub unsigned_fields: &'static [&'static str],
    pub reference_field: &'static str,
    pub result_field: &'static str,
    pub success_code: &'static str,
    /// Amount field and the factor it is scaled by, when the gateway reports one we check.
    pub amount_field: Option<(&'static str, i64)>,
    pub bank_code_field: Option<&'static str>,
    pub bank_tran_no_field: Option<&'static str>,
    pub card_type_field: Option<&'static str>,
    pub transaction_no_field: Option<&'static str>,
    pub pay_date_field: Option<&'static str>,
    pub response_time_field: Option<&'static str>,
}

pub const MOMO: CallbackSpec = CallbackSpec {
    gateway: Gateway::Momo,
    algorithm: HashAlgorithm::Sha256,
    signature_field: "signature",
    unsigned_fields: &[],
    reference_field: "orderId",
    result_field: "resultCode",
    success_code: "0",
    amount_field: None,
    bank_code_field: None,
    bank_tran_no_field: None,
    card_type_field: Some("payType"),
    transaction_no_field: Some("transId"),
    pay_date_field: None,
    response_time_field: Some("responseTime"),
};

pub const VNPAY: CallbackSpec = CallbackSpec {
    gateway: Gateway::Vnpay,
    algorithm: HashAlgorithm::Sha512,
    signature_field: "vnp_SecureHash",
    unsigned_fields: &["vnp_SecureHashType"],
    reference_field: "vnp_TxnRef",
    result_field: "vnp_ResponseCode",
    success_code: "00",
    amount_field: Some(("vnp_Amount", 100)),
    bank_code_field: Some("vnp_BankCode"),
    bank_tran_no_field: Some("vnp_BankTranNo"),
    card_type_field: Some("vnp_CardType"),
    transaction_no_field: Some("vnp_TransactionNo"),
    pay_date_field: Some("vnp_PayDate"),
    response_time_field: None,
};

impl CallbackSpec {
    pub fn for_gateway(gateway: Gateway) -> &'static CallbackSpec {
        match gateway {
            Gateway::Momo => &MOMO,
            Gateway::Vnpay => &VNPAY,
        }
    }

    pub fn signature<'a>(&self, params: &'a HashMap<String, String>) -> Option<&'a str> {
        params.get(self.signature_field).map(String::as_str)
    }

    /// Parameters covered by the signature.
    pub fn signed_params(&self, params: &HashMap<String, String>) -> BTreeMap<String, String> {
        params
            .iter()
            .filter(|(key, _)| {
                key.as_str() != self.signature_field
                    && !self.unsigned_fields.contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn reference<'a>(&self, params: &'a HashMap<String, String>) -> Option<&'a str> {
        params
            .get(self.reference_field)
            .map(String::as_str)
            .filter(|reference| !reference.is_empty())
    }

    /// Whether the reported amount equals `expected` VND, compared in the
    /// gateway's own unit so fractional amounts never match. `None` when the
    /// gateway reports no amount.
    pub fn amount_matches(&self, params: &HashMap<String, String>, expected: i64) -> Option<bool> {
        let (field, factor) = self.amount_field?;
        let raw = params.get(field)?;
        let reported = raw.trim().parse::<i64>().ok();
        Some(reported.is_some() && reported == expected.checked_mul(factor))
    }

    pub fn result(&self, params: &HashMap<String, String>) -> Option<GatewayResult> {
        let field = |name: Option<&'static str>| name.and_then(|name| params.get(name).cloned());

        Some(GatewayResult {
            result_code: params.get(self.result_field)?.clone(),
            bank_code: field(self.bank_code_field),
            bank_tran_no: field(self.bank_tran_no_field),
            card_type: field(self.card_type_field),
            transaction_no: field(self.transaction_no_field),
            pay_date: field(self.pay_date_field),
            response_time: field(self.response_time_field),
        })
    }

    pub fn is_success(&self, result: &GatewayResult) -> bool {
        result.result_code == self.success_code
    }
}

/// What happened to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Confirmed,
    PaymentFailed,
    AlreadyProcessed(PaymentState),
    NotFound,
    AmountMismatch,
    SignatureMismatch,
    Malformed,
    Unavailable,
}

impl CallbackOutcome {
    /// Fixed response code understood by both gateways.
    pub fn code(&self) -> &'static str {
        match self {
            CallbackOutcome::Confirmed => "00",
            CallbackOutcome::NotFound => "01",
            CallbackOutcome::AlreadyProcessed(_) => "02",
            CallbackOutcome::PaymentFailed => "03",
            CallbackOutcome::AmountMismatch => "04",
            CallbackOutcome::SignatureMismatch => "97",
            CallbackOutcome::Malformed | CallbackOutcome::Unavailable => "99",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CallbackOutcome::Confirmed => "Confirm Success",
            CallbackOutcome::NotFound => "Order not found",
            CallbackOutcome::AlreadyProcessed(_) => {
                "This order has been updated to the payment status"
            }
            CallbackOutcome::PaymentFailed => "Payment failed",
            CallbackOutcome::AmountMismatch => "Amount invalid",
            CallbackOutcome::SignatureMismatch => "Checksum failed",
            CallbackOutcome::Malformed => "Invalid request",
            CallbackOutcome::Unavailable => "Unknown error",
        }
    }

    /// Payment state of the order after the callback, when known.
    pub fn payment_state(&self) -> Option<PaymentState> {
        match self {
            CallbackOutcome::Confirmed => Some(PaymentState::Paid),
            CallbackOutcome::PaymentFailed => Some(PaymentState::Failed),
            CallbackOutcome::AlreadyProcessed(state) => Some(*state),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallbackOutcome::Confirmed)
    }
}
