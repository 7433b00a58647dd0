//! [`AgentBackend`] over the backend's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use rehab_core::{
    AgentBackend,
    traits::{BackendError, ChannelCredentials},
};

use crate::protocol::{HealthResponse, StartAgentRequest, TokenResponse};

/// HTTP client for `/token`, `/start-agent` and `/health`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Request(format!("client setup: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query backend health and configured environment.
    ///
    /// # Errors
    /// Returns error if the request fails or the body is malformed.
    pub async fn health(&self) -> Result<HealthResponse, BackendError> {
        let res = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(request_error)?;
        let res = check(res).await?;
        res.json().await.map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn fetch_token(&self, user_id: &str) -> Result<ChannelCredentials, BackendError> {
        let res = self
            .client
            .get(self.url("/token"))
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(request_error)?;
        let res = check(res).await?;
        let body: TokenResponse = res
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        tracing::debug!(user_id, "call credentials issued");
        Ok(body.into())
    }

    async fn start_agent(&self, call_id: &str, exercise: &str) -> Result<(), BackendError> {
        let req = StartAgentRequest {
            call_id: call_id.to_string(),
            exercise: exercise.to_string(),
        };
        let res = self
            .client
            .post(self.url("/start-agent"))
            .json(&req)
            .send()
            .await
            .map_err(request_error)?;
        check(res).await?;
        tracing::debug!(call_id, exercise, "agent activation requested");
        Ok(())
    }
}

fn request_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Request(format!("timed out: {e}"))
    } else {
        BackendError::Request(e.to_string())
    }
}

async fn check(res: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("/token"), "http://localhost:8000/token");
    }
}
