//! HTTP GET capability, kept behind a trait so the client's retry and
//! decoding logic can run against a scripted transport in tests.

use async_trait::async_trait;
use url::Url;

use crate::{client::ClientConfig, Error};

/// Status and full body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a single GET and returns whatever the server answered.
///
/// Implementations must not interpret the status: non-2xx responses are
/// returned as `Ok`. Only failures to obtain a response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse, Error>;
}

/// [`Transport`] backed by a single `reqwest::Client`.
///
/// Redirects are not followed, so 3xx statuses reach the caller.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed(e.to_string())
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, Error> {
        let resp = self
            .client
            .get(url.clone())
            .header("accept", "application/json, text/csv, */*")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get resource: {}", e);
                Error::RequestFailed(e.to_string())
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            Error::RequestFailed(e.to_string())
        })?;

        Ok(RawResponse { status, body })
    }
}
