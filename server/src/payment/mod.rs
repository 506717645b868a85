//! Payment gateway integration
//!
//! `signature` holds the HMAC routine shared by both gateways, `callback`
//! the per-gateway callback layout and outcome codes. `momo` and `vnpay`
//! build signed requests and verify callbacks; outbound HTTP goes through
//! [`GatewayTransport`] so tests can replace it.

use std::collections::BTreeMap;

use thiserror::Error;

pub mod callback;
pub mod momo;
pub mod signature;
pub mod transport;
pub mod vnpay;

pub use callback::{CallbackOutcome, CallbackSpec};
pub use momo::MomoGateway;
pub use signature::{HashAlgorithm, SignatureError};
pub use transport::{GatewayTransport, HttpTransport};
pub use vnpay::VnpayGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },
    #[error("gateway response is missing {0}")]
    MissingField(&'static str),
    #[error("Amount {0} is out of range for the gateway")]
    AmountOutOfRange(i64),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// A signed parameter set ready to be sent to a gateway.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub reference: String,
    pub request_id: String,
    pub order_info: String,
    pub params: BTreeMap<String, String>,
    pub signature: String,
}
