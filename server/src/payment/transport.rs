use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::GatewayError;

/// Outbound JSON calls to a gateway API.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, GatewayError>;
}

/// `reqwest` transport sharing the process-wide client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, GatewayError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let value: Value = response.json().await?;

        debug!(url = %url, status = %status, "Gateway responded");

        Ok(value)
    }
}
