//! Contact/message/flow gateway over HTTP.
//!
//! Subscribers are addressed by canonical phone (digits with country code).
//! Every call carries the `API-KEY` header and is bounded by the configured
//! timeout; any non-2xx status is a `GatewayCallFailed`.

mod types;

#[cfg(test)]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use confirma_core::{
    config::GatewayConfig,
    error::ConfirmaError,
    traits::{ContactId, Messenger},
};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use types::{CreateSubscriber, CustomFieldValue, SendFlow, SendMessage, Subscriber};

/// HTTP client for the messaging gateway.
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GatewayClient {
    /// Build a client from config.
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfirmaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfirmaError::Config(format!("gateway client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// POST with an optional JSON body; returns the response on 2xx.
    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ConfirmaError> {
        let mut req = self
            .client
            .post(self.url(path))
            .header("API-KEY", &self.api_key);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ConfirmaError::GatewayCallFailed(format!("POST {path}: {e}")))?;
        ensure_success(resp, "POST", path).await
    }
}

async fn ensure_success(
    resp: reqwest::Response,
    verb: &str,
    path: &str,
) -> Result<reqwest::Response, ConfirmaError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(ConfirmaError::GatewayCallFailed(format!(
        "{verb} {path}: {status} {}",
        text.chars().take(200).collect::<String>()
    )))
}

#[async_trait]
impl Messenger for GatewayClient {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn find_contact(&self, phone: &str) -> Result<Option<ContactId>, ConfirmaError> {
        let path = format!("subscriber/get_by_phone/{phone}/");
        let resp = self
            .client
            .get(self.url(&path))
            .header("API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| ConfirmaError::GatewayCallFailed(format!("GET {path}: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("gateway: no subscriber for {phone}");
            return Ok(None);
        }
        let resp = ensure_success(resp, "GET", &path).await?;
        let subscriber: Subscriber = resp
            .json()
            .await
            .map_err(|e| ConfirmaError::GatewayCallFailed(format!("GET {path}: bad body: {e}")))?;
        Ok(subscriber.id)
    }

    async fn create_contact(
        &self,
        phone: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<ContactId, ConfirmaError> {
        let body = CreateSubscriber {
            phone,
            first_name,
            last_name,
        };
        let resp = self.post("subscriber/", Some(&body)).await?;
        let subscriber: Subscriber = resp.json().await.map_err(|e| {
            ConfirmaError::GatewayCallFailed(format!("POST subscriber/: bad body: {e}"))
        })?;
        subscriber.id.ok_or_else(|| {
            ConfirmaError::GatewayCallFailed("POST subscriber/: response without id".into())
        })
    }

    async fn send_message(&self, contact: ContactId, text: &str) -> Result<(), ConfirmaError> {
        let body = SendMessage {
            kind: "text",
            value: text,
        };
        self.post(&format!("subscriber/{contact}/send_message/"), Some(&body))
            .await?;
        debug!("gateway: message sent to subscriber {contact}");
        Ok(())
    }

    async fn send_flow(
        &self,
        contact: ContactId,
        flow_id: Option<i64>,
    ) -> Result<(), ConfirmaError> {
        let path = format!("subscriber/{contact}/send_flow/");
        match flow_id {
            Some(flow) => self.post(&path, Some(&SendFlow { flow })).await?,
            None => self.post::<SendFlow>(&path, None).await?,
        };
        Ok(())
    }

    async fn add_tag(&self, contact: ContactId, tag_id: i64) -> Result<(), ConfirmaError> {
        self.post::<()>(&format!("subscriber/{contact}/tags/{tag_id}/"), None)
            .await?;
        Ok(())
    }

    async fn set_custom_field(
        &self,
        contact: ContactId,
        field_id: i64,
        value: &str,
    ) -> Result<(), ConfirmaError> {
        self.post(
            &format!("subscriber/{contact}/custom_fields/{field_id}/"),
            Some(&CustomFieldValue { value }),
        )
        .await?;
        Ok(())
    }
}
