//! HTTP probes against the installed service.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response body, lossily decoded as UTF-8.
    pub body: String,
}

/// The request never produced a response.
#[derive(Debug, Error)]
#[error("GET {url} failed: {message}")]
pub struct ProbeError {
    /// The URL requested.
    pub url: String,

    /// Why no response was obtained.
    pub message: String,
}

/// Issues GET requests.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Fetch `url`. Any status code counts as a response.
    async fn get(&self, url: &str) -> Result<HttpResponse, ProbeError>;
}

/// [`HttpProbe`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    /// Build a probe whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProbeError> {
        let probe_err = |e: reqwest::Error| ProbeError {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(probe_err)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(probe_err)?;
        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
