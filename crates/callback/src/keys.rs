use crate::auth::{self, AuthStrategy};
use crate::error::CallbackError;
use crate::resolver::KeyMaps;
use crate::rest_auth::RestAuthClient;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use common::config::{CallbackConfig, GeneratedKey, GeneratedKeyKind};
use shared_clients::HttpClient;
use transform::{layout, Reshaper};
use uuid::Uuid;

/// Where `timestamp` and `uuid` keys get their values.
pub trait KeySource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn uuid(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKeySource;

impl KeySource for SystemKeySource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Always returns the same instant and UUID.
#[derive(Debug, Clone, Copy)]
pub struct FixedKeySource {
    pub time: DateTime<Utc>,
    pub uuid: Uuid,
}

impl FixedKeySource {
    pub fn new(time: DateTime<Utc>, uuid: Uuid) -> Self {
        Self { time, uuid }
    }
}

impl KeySource for FixedKeySource {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// `"milliseconds"` yields Unix seconds; any other format is a layout.
pub fn timestamp_value(format: &str, now: DateTime<Utc>) -> String {
    if format == "milliseconds" {
        now.timestamp().to_string()
    } else {
        layout::format(&now, format)
    }
}

/// Computes config and generated keys for one callback.
pub struct KeyPipeline<'a> {
    http: &'a dyn HttpClient,
    reshaper: &'a dyn Reshaper,
    source: &'a dyn KeySource,
}

impl<'a> KeyPipeline<'a> {
    pub fn new(
        http: &'a dyn HttpClient,
        reshaper: &'a dyn Reshaper,
        source: &'a dyn KeySource,
    ) -> Self {
        Self {
            http,
            reshaper,
            source,
        }
    }

    /// Register config keys, then evaluate generated keys in declaration
    /// order. `body` is the serialized request body; `input` the document
    /// before reshaping, used by REST auth body mappings.
    pub async fn run(
        &self,
        config: &CallbackConfig,
        body: &str,
        input: &str,
    ) -> Result<KeyMaps, CallbackError> {
        let mut maps = KeyMaps::with_config_keys(&config.config_keys);
        for key in &config.generated_keys {
            self.generate(key, body, input, &mut maps).await?;
        }
        Ok(maps)
    }

    async fn generate(
        &self,
        key: &GeneratedKey,
        body: &str,
        input: &str,
        maps: &mut KeyMaps,
    ) -> Result<(), CallbackError> {
        let value = match key.kind {
            GeneratedKeyKind::Timestamp => timestamp_value(&key.format, self.source.now()),
            GeneratedKeyKind::Uuid => self.source.uuid().to_string(),
            GeneratedKeyKind::Body => {
                if key.is_base64_encoded() {
                    BASE64.encode(body)
                } else {
                    body.to_string()
                }
            }
            GeneratedKeyKind::Auth => {
                let config = auth::auth_config_for(key)?;
                let strategy = AuthStrategy::from(key.auth_type.as_str());
                if strategy == AuthStrategy::Rest {
                    let rest = config.rest_config.as_deref().ok_or_else(|| {
                        CallbackError::config(format!("{} has no rest_config", key.placeholder()))
                    })?;
                    RestAuthClient::new(self.http, self.reshaper)
                        .authenticate(key, rest, input, maps)
                        .await?;
                    return Ok(());
                }
                auth::sign(strategy, config, maps)?
            }
        };
        tracing::debug!(key = %key.placeholder(), kind = %key.kind, "generated key");
        maps.insert_generated(key.placeholder(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use shared_clients::{HttpClientError, HttpResponse};
    use std::collections::BTreeMap;
    use transform::SpecReshaper;

    struct NoNetwork;

    #[async_trait]
    impl HttpClient for NoNetwork {
        async fn call(
            &self,
            _method: &str,
            url: &str,
            _headers: &BTreeMap<String, String>,
            _body: &str,
        ) -> Result<HttpResponse, HttpClientError> {
            Err(HttpClientError::failed_to_connect(format!("no network for {url}")))
        }
    }

    fn fixed() -> FixedKeySource {
        FixedKeySource::new(
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap(),
            Uuid::parse_str("3f1c2a9e-8d4b-4c7a-9e21-5b6f0d8a7c11").unwrap(),
        )
    }

    fn config(value: serde_json::Value) -> CallbackConfig {
        serde_json::from_value(value).expect("callback config")
    }

    #[test]
    fn test_timestamp_formats() {
        let now = fixed().now();
        assert_eq!(timestamp_value("milliseconds", now), "1700000000");
        assert_eq!(timestamp_value("2006-01-02T15:04:05Z07:00", now), "2023-11-14T22:13:20Z");
        assert_eq!(timestamp_value("%Y%m%d", now), "20231114");
        assert_eq!(timestamp_value("100%", now), "1100%");
    }

    #[tokio::test]
    async fn test_timestamp_key_with_stray_percent() {
        let source = fixed();
        let reshaper = SpecReshaper::new();
        let pipeline = KeyPipeline::new(&NoNetwork, &reshaper, &source);
        let maps = pipeline
            .run(
                &config(json!({
                    "generated_keys": [{"name": "ts", "type": "timestamp", "format": "100%"}]
                })),
                "{}",
                "{}",
            )
            .await
            .expect("pipeline");
        assert_eq!(maps.generated("generated_keys.ts"), Some("1100%"));
    }

    #[tokio::test]
    async fn test_pipeline_publishes_each_kind() {
        let source = fixed();
        let reshaper = SpecReshaper::new();
        let pipeline = KeyPipeline::new(&NoNetwork, &reshaper, &source);
        let maps = pipeline
            .run(
                &config(json!({
                    "config_keys": [{"name": "secret", "key": "secret"}],
                    "generated_keys": [
                        {"name": "ts", "type": "timestamp", "format": "milliseconds"},
                        {"name": "nonce", "type": "uuid"},
                        {"name": "raw_body", "type": "body"},
                        {"name": "b64_body", "type": "body", "auth_config": {"encoding": "base64"}},
                        {"name": "static", "type": "auth", "auth_type": "STATIC",
                         "auth_config": {"secret": "config_keys.secret"}}
                    ]
                })),
                r#"{"a":1}"#,
                "{}",
            )
            .await
            .expect("pipeline");

        assert_eq!(maps.generated("generated_keys.ts"), Some("1700000000"));
        assert_eq!(
            maps.generated("generated_keys.nonce"),
            Some("3f1c2a9e-8d4b-4c7a-9e21-5b6f0d8a7c11")
        );
        assert_eq!(maps.generated("generated_keys.raw_body"), Some(r#"{"a":1}"#));
        assert_eq!(maps.generated("generated_keys.b64_body"), Some("eyJhIjoxfQ=="));
        assert_eq!(maps.generated("generated_keys.static"), Some("secret"));
    }

    #[tokio::test]
    async fn test_forward_reference_resolves_to_literal() {
        let source = fixed();
        let reshaper = SpecReshaper::new();
        let pipeline = KeyPipeline::new(&NoNetwork, &reshaper, &source);
        let maps = pipeline
            .run(
                &config(json!({
                    "generated_keys": [
                        {"name": "signature", "type": "auth", "auth_type": "BASIC_AUTH",
                         "auth_config": {"message_generation": {
                             "format": "%s", "params": ["generated_keys.nonce"]}}},
                        {"name": "nonce", "type": "uuid"}
                    ]
                })),
                "{}",
                "{}",
            )
            .await
            .expect("pipeline");

        assert_eq!(
            maps.generated("generated_keys.signature"),
            Some("Basic generated_keys.nonce")
        );
    }

    #[tokio::test]
    async fn test_invalid_auth_config_aborts() {
        let source = fixed();
        let reshaper = SpecReshaper::new();
        let pipeline = KeyPipeline::new(&NoNetwork, &reshaper, &source);
        let err = pipeline
            .run(
                &config(json!({
                    "generated_keys": [
                        {"name": "nonce", "type": "uuid"},
                        {"name": "sig", "type": "auth", "auth_type": "MD5", "auth_config": {}}
                    ]
                })),
                "{}",
                "{}",
            )
            .await
            .expect_err("md5 without message_generation");
        assert!(matches!(err, CallbackError::ConfigError { .. }));
    }

    #[tokio::test]
    async fn test_rest_auth_network_failure_is_network_error() {
        let source = fixed();
        let reshaper = SpecReshaper::new();
        let pipeline = KeyPipeline::new(&NoNetwork, &reshaper, &source);
        let err = pipeline
            .run(
                &config(json!({
                    "generated_keys": [{
                        "name": "token", "type": "auth", "auth_type": "REST",
                        "auth_config": {"rest_config": {
                            "method": "POST", "base_url": "http://auth.invalid", "endpoint": "token",
                            "static_body_mapping": {"grant_type": "client_credentials"},
                            "response_mapping": {"BEARER_TOKEN": "access_token"}
                        }}
                    }]
                })),
                "{}",
                "{}",
            )
            .await
            .expect_err("network failure");
        assert!(matches!(err, CallbackError::NetworkError { .. }));
    }
}
