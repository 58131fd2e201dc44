use async_trait::async_trait;
use common::error::diagnostics::DiagnosticMessage;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("invalid request: {context}")]
    InvalidRequest { context: DiagnosticMessage },
    #[error("connectivity error: {context}")]
    FailedToConnect { context: DiagnosticMessage },
    #[error("request timed out: {context}")]
    Timeout { context: DiagnosticMessage },
    #[error("unexpected error: {context}")]
    UnexpectedError { context: DiagnosticMessage },
}

impl HttpClientError {
    #[track_caller]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn failed_to_connect(message: impl Into<String>) -> Self {
        Self::FailedToConnect {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedError {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    pub fn context(&self) -> &DiagnosticMessage {
        match self {
            HttpClientError::InvalidRequest { context }
            | HttpClientError::FailedToConnect { context }
            | HttpClientError::Timeout { context }
            | HttpClientError::UnexpectedError { context } => context,
        }
    }
}

impl From<reqwest::Error> for HttpClientError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpClientError::timeout(err.to_string())
        } else if err.is_builder() {
            HttpClientError::invalid_request(err.to_string())
        } else if err.is_connect() || err.is_request() {
            HttpClientError::failed_to_connect(err.to_string())
        } else {
            HttpClientError::unexpected(format!(
                "Unexpected error trying to send request: {}",
                err
            ))
        }
    }
}

/// Status and raw body of a completed exchange. Non-2xx statuses are not
/// errors at this level; callers decide what counts as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// One outbound HTTP exchange.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn call(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &str,
    ) -> Result<HttpResponse, HttpClientError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn parse_method(method: &str) -> Result<Method, HttpClientError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| HttpClientError::invalid_request(format!("'{method}' is not an HTTP method")))
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn call(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &str,
    ) -> Result<HttpResponse, HttpClientError> {
        let method = parse_method(method)?;
        let sends_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);

        let mut request = self.client.request(method.clone(), url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if sends_body {
            request = request.body(body.to_string());
        }

        tracing::debug!(%method, url, "sending request");
        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        tracing::debug!(%method, url, status, "received response");

        Ok(HttpResponse { status, body })
    }
}
