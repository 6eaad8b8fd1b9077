//! Shared HTTP plumbing for provider calls.
//!
//! Classification is uniform across providers: a transport failure or a
//! status >= 500 is an upstream failure the caller may retry by
//! resubmitting; any other non-success status means the provider rejected
//! the request and retrying the same payload will not help. Both carry the
//! raw response body for diagnosis.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::error;

use orderline_core::{PosProvider, ServiceError};

#[derive(Clone)]
pub struct PosHttp {
    client: Client,
    provider: &'static str,
}

impl PosHttp {
    pub fn new(provider: PosProvider, timeout_secs: u64) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|err| {
                ServiceError::Misconfigured(format!(
                    "failed to build {provider} http client: {err}"
                ))
            })?;
        Ok(Self { client, provider: provider.as_str() })
    }

    pub async fn get_json(&self, url: &str, token: &str) -> Result<Value, ServiceError> {
        self.dispatch(self.client.get(url).bearer_auth(token)).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Value, ServiceError> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.dispatch(request).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<Value, ServiceError> {
        self.dispatch(self.client.post(url).form(fields)).await
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Value, ServiceError> {
        let response = request.send().await.map_err(|err| {
            error!(provider = self.provider, error = %err, "provider request failed to send");
            ServiceError::UpstreamFailure {
                provider: self.provider,
                status: None,
                body: err.to_string(),
            }
        })?;
        self.classify(response).await
    }

    async fn classify(&self, response: Response) -> Result<Value, ServiceError> {
        let status = response.status();
        let text = response.text().await.map_err(|err| ServiceError::UpstreamFailure {
            provider: self.provider,
            status: Some(status.as_u16()),
            body: err.to_string(),
        })?;

        if status.is_server_error() {
            error!(provider = self.provider, status = status.as_u16(), "provider upstream failure");
            return Err(ServiceError::UpstreamFailure {
                provider: self.provider,
                status: Some(status.as_u16()),
                body: text,
            });
        }
        if !status.is_success() {
            return Err(ServiceError::ProviderRejected {
                provider: self.provider,
                status: status.as_u16(),
                body: text,
            });
        }

        // Some provider endpoints return an empty body on success.
        if text.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
