//! Transport collaborator: executes one HTTP-style request.
//!
//! The pipeline core never talks to the network directly; it hands
//! [`ApiRequest`]s to a [`Transport`]. Retry and backoff policy belong to
//! the transport implementation, not to the pipeline. Tests substitute
//! scripted transports.

use async_trait::async_trait;
use retriever_metakg::HttpMethod;
use serde_json::Value;
use thiserror::Error;

use crate::subquery::ApiRequest;

/// Transport-level failures. A failing subquery contributes zero records
/// and is reported as a partial failure; it never aborts siblings.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Executes one request and returns the parsed JSON response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError>;
}

/// HTTP transport backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: request.url.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
