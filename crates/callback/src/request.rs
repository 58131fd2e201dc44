use crate::error::CallbackError;
use crate::keys::{KeyPipeline, KeySource, SystemKeySource};
use common::config::loader::parse_callback_config;
use common::config::CallbackConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_clients::{HttpClient, HttpResponse};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, Span};
use transform::{Reshaper, SpecReshaper};

/// A fully resolved outbound call. Dispatch is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub struct CallbackRequestBuilder {
    http: Arc<dyn HttpClient>,
    reshaper: Arc<dyn Reshaper>,
    source: Arc<dyn KeySource>,
    span: Span,
}

impl CallbackRequestBuilder {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            reshaper: Arc::new(SpecReshaper::new()),
            source: Arc::new(SystemKeySource),
            span: Span::none(),
        }
    }

    pub fn with_reshaper(mut self, reshaper: Arc<dyn Reshaper>) -> Self {
        self.reshaper = reshaper;
        self
    }

    pub fn with_key_source(mut self, source: Arc<dyn KeySource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Build a request from the reshaping spec, the input document and the
    /// callback configuration, all as JSON text.
    pub async fn build(
        &self,
        spec: &str,
        input: &str,
        config: &str,
    ) -> Result<CallbackRequest, CallbackError> {
        let config = parse_callback_config(config)?;
        self.build_with_config(spec, input, &config).await
    }

    pub async fn build_with_config(
        &self,
        spec: &str,
        input: &str,
        config: &CallbackConfig,
    ) -> Result<CallbackRequest, CallbackError> {
        async {
            config.validate()?;

            let reshaped = self.reshaper.reshape(spec, input)?;
            let body = request_body(&reshaped)?;

            let pipeline =
                KeyPipeline::new(self.http.as_ref(), self.reshaper.as_ref(), self.source.as_ref());
            let maps = pipeline.run(config, &body, input).await?;

            let headers = config
                .headers
                .iter()
                .map(|(name, raw)| (name.clone(), maps.resolve(raw)))
                .collect();

            let request = CallbackRequest {
                method: config.method.clone(),
                url: config.url(),
                headers,
                body,
            };
            tracing::info!(method = %request.method, url = %request.url, "callback request built");
            Ok::<_, CallbackError>(request)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Send a built request through the configured HTTP client.
    pub async fn send(&self, request: &CallbackRequest) -> Result<HttpResponse, CallbackError> {
        let resp = self
            .http
            .call(&request.method, &request.url, &request.headers, &request.body)
            .instrument(self.span.clone())
            .await?;
        tracing::info!(parent: &self.span, url = %request.url, status = resp.status, "callback dispatched");
        Ok(resp)
    }
}

/// Serialize the reshaped document, unwrapping a top-level `Results` entry.
fn request_body(reshaped: &str) -> Result<String, CallbackError> {
    let doc: Value = serde_json::from_str(reshaped).map_err(|err| CallbackError::TransformError {
        context: common::diag!("reshaped payload is not JSON: {}", err),
        source: None,
    })?;
    let payload = match doc {
        Value::Object(mut map) => match map.remove("Results") {
            Some(results) => results,
            None => Value::Object(map),
        },
        other => other,
    };
    Ok(serde_json::to_string(&payload)?)
}
