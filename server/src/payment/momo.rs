//! MoMo (HMAC-SHA256) payment gateway

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::callback::MOMO;
use super::signature::{self, SignatureError};
use super::{GatewayError, GatewayTransport, SignedRequest};
use crate::config::MomoConfig;

pub struct MomoGateway {
    config: MomoConfig,
    transport: Arc<dyn GatewayTransport>,
}

impl MomoGateway {
    pub fn new(config: MomoConfig, transport: Arc<dyn GatewayTransport>) -> Self {
        Self { config, transport }
    }

    /// Partner code, creation millis and a random suffix.
    pub fn new_reference(&self, now: DateTime<Utc>) -> String {
        let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
        format!(
            "{}{}{:04}",
            self.config.partner_code,
            now.timestamp_millis(),
            suffix
        )
    }

    pub fn build_request(
        &self,
        reference: String,
        amount: i64,
        order_info: &str,
    ) -> Result<SignedRequest, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("accessKey".to_string(), self.config.access_key.clone());
        params.insert("amount".to_string(), amount.to_string());
        params.insert("extraData".to_string(), String::new());
        params.insert("ipnUrl".to_string(), self.config.ipn_url.clone());
        params.insert("orderId".to_string(), reference.clone());
        params.insert("orderInfo".to_string(), order_info.to_string());
        params.insert("partnerCode".to_string(), self.config.partner_code.clone());
        params.insert("redirectUrl".to_string(), self.config.redirect_url.clone());
        params.insert("requestId".to_string(), reference.clone());
        params.insert("requestType".to_string(), self.config.request_type.clone());

        let signature = signature::sign(MOMO.algorithm, &self.config.secret_key, &params)?;

        Ok(SignedRequest {
            request_id: reference.clone(),
            reference,
            order_info: order_info.to_string(),
            params,
            signature,
        })
    }

    /// Create the payment at MoMo and return the URL the buyer is sent to.
    pub async fn submit(&self, request: &SignedRequest) -> Result<String, GatewayError> {
        let param = |name: &str| request.params.get(name).cloned().unwrap_or_default();
        let amount: i64 = param("amount").parse().unwrap_or_default();

        let body = json!({
            "partnerCode": param("partnerCode"),
            "requestId": request.request_id,
            "amount": amount,
            "orderId": request.reference,
            "orderInfo": request.order_info,
            "redirectUrl": param("redirectUrl"),
            "ipnUrl": param("ipnUrl"),
            "lang": self.config.lang,
            "requestType": param("requestType"),
            "autoCapture": true,
            "extraData": param("extraData"),
            "signature": request.signature,
        });

        let response = self.transport.post_json(&self.config.endpoint, &body).await?;

        let code = result_code(&response).ok_or(GatewayError::MissingField("resultCode"))?;
        if code != "0" {
            let message = response["message"].as_str().unwrap_or_default().to_string();
            warn!(reference = %request.reference, code = %code, message = %message, "MoMo rejected payment");
            return Err(GatewayError::Rejected { code, message });
        }

        let pay_url = response["payUrl"]
            .as_str()
            .or_else(|| response["shortLink"].as_str())
            .ok_or(GatewayError::MissingField("payUrl"))?;

        info!(reference = %request.reference, "MoMo payment created");

        Ok(pay_url.to_string())
    }

    /// MoMo signs callbacks with the access key, which it does not echo back.
    pub fn verify_callback(&self, params: &HashMap<String, String>) -> Result<bool, SignatureError> {
        let Some(received) = MOMO.signature(params) else {
            return Ok(false);
        };

        let mut signed = MOMO.signed_params(params);
        signed
            .entry("accessKey".to_string())
            .or_insert_with(|| self.config.access_key.clone());

        signature::verify(
            MOMO.algorithm,
            &self.config.secret_key,
            &signature::canonicalize(&signed),
            received,
        )
    }
}

fn result_code(response: &Value) -> Option<String> {
    match &response["resultCode"] {
        Value::Number(code) => Some(code.to_string()),
        Value::String(code) => Some(code.clone()),
        _ => None,
    }
}
