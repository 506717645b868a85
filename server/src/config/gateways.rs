//! Credentials and endpoints of the payment gateways and the carrier.
//!
//! Each block is enabled only when its secrets are present.

#[derive(Clone, Debug)]
pub struct MomoConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
    pub request_type: String,
    pub lang: String,
}

impl MomoConfig {
    pub(super) fn from_lookup(var: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        let access_key = var("MOMO_ACCESS_KEY")?;
        let secret_key = var("MOMO_SECRET_KEY")?;

        Some(Self {
            partner_code: var("MOMO_PARTNER_CODE").unwrap_or_else(|| "MOMO".to_string()),
            access_key,
            secret_key,
            endpoint: var("MOMO_ENDPOINT")
                .unwrap_or_else(|| "https://test-payment.momo.vn/v2/gateway/api/create".to_string()),
            redirect_url: var("MOMO_REDIRECT_URL")
                .unwrap_or_else(|| "http://localhost:3000/result".to_string()),
            ipn_url: var("MOMO_IPN_URL").unwrap_or_else(|| {
                "http://localhost:3001/api/payment/momo/momo_ipn".to_string()
            }),
            request_type: var("MOMO_REQUEST_TYPE").unwrap_or_else(|| "payWithMethod".to_string()),
            lang: var("MOMO_LANG").unwrap_or_else(|| "vi".to_string()),
        })
    }
}

#[derive(Clone, Debug)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub url: String,
    pub return_url: String,
    pub api: String,
}

impl VnpayConfig {
    pub(super) fn from_lookup(var: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        let tmn_code = var("VNP_TMN_CODE")?;
        let hash_secret = var("VNP_HASH_SECRET")?;

        Some(Self {
            tmn_code,
            hash_secret,
            url: var("VNP_URL").unwrap_or_else(|| {
                "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()
            }),
            return_url: var("VNP_RETURN_URL").unwrap_or_else(|| {
                "http://localhost:3001/api/payment/vnpay/vnpay_return".to_string()
            }),
            api: var("VNP_API").unwrap_or_else(|| {
                "https://sandbox.vnpayment.vn/merchant_webapi/api/transaction".to_string()
            }),
        })
    }
}

/// GHN shipping-order API
#[derive(Clone, Debug)]
pub struct CarrierConfig {
    pub url: String,
    pub token: String,
    pub shop_id: String,
}

impl CarrierConfig {
    pub(super) fn from_lookup(var: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        Some(Self {
            token: var("GHN_TOKEN")?,
            shop_id: var("GHN_SHOP_ID")?,
            url: var("GHN_URL").unwrap_or_else(|| {
                "https://dev-online-gateway.ghn.vn/shiip/public-api/v2".to_string()
            }),
        })
    }
}
