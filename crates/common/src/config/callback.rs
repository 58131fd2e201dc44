use crate::config::error::ConfigError;
use crate::config::update::UpdateDataConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

/// A named, typed literal or column/condition mapping rule.
///
/// The same shape is reused for signing inputs (`config_keys`) and for the
/// column and condition rules of an update mapping, which is why every field
/// is a plain string.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ConfigKey {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub operation: String,
}

impl ConfigKey {
    pub fn is_string_typed(&self) -> bool {
        self.value_type.eq_ignore_ascii_case("string")
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedKeyKind {
    Timestamp,
    Uuid,
    Body,
    Auth,
}

impl Display for GeneratedKeyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratedKeyKind::Timestamp => write!(f, "timestamp"),
            GeneratedKeyKind::Uuid => write!(f, "uuid"),
            GeneratedKeyKind::Body => write!(f, "body"),
            GeneratedKeyKind::Auth => write!(f, "auth"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MessageGeneration {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GeneratedKeyAuthConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub message_generation: Option<MessageGeneration>,
    #[serde(default)]
    pub rest_config: Option<Box<CallbackConfig>>,
}

impl GeneratedKeyAuthConfig {
    pub fn is_base64(&self) -> bool {
        self.encoding == "base64"
    }
}

/// A value computed while building a callback: a timestamp, a nonce, the
/// serialized body, or the output of an auth strategy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GeneratedKey {
    pub name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub data_mapping: String,
    #[serde(rename = "type")]
    pub kind: GeneratedKeyKind,
    #[serde(default)]
    pub auth_type: String,
    #[serde(default)]
    pub auth_config: Option<GeneratedKeyAuthConfig>,
}

impl GeneratedKey {
    /// Placeholder under which this key's value is published.
    pub fn placeholder(&self) -> String {
        format!("generated_keys.{}", self.name)
    }

    pub fn is_base64_encoded(&self) -> bool {
        self.auth_config
            .as_ref()
            .map(GeneratedKeyAuthConfig::is_base64)
            .unwrap_or(false)
    }
}

/// Declarative description of one outbound partner call.
///
/// Used both for the main callback and, nested inside an auth key's
/// `rest_config`, for the token round-trip of the REST auth strategy.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CallbackConfig {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_mapping: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_body_mapping: Option<Map<String, Value>>,
    #[serde(default)]
    pub config_keys: Vec<ConfigKey>,
    #[serde(default)]
    pub generated_keys: Vec<GeneratedKey>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mapping: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_response_body: Option<BTreeMap<String, Vec<Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_data_config: Option<UpdateDataConfig>,
}

impl CallbackConfig {
    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.endpoint)
    }

    /// The `body_mapping` operations as reshaping-spec text, if configured.
    pub fn body_mapping_spec(&self) -> Result<Option<String>, ConfigError> {
        self.body_mapping
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Structural checks that do not depend on runtime data: the two body
    /// mapping styles are mutually exclusive and generated key names are
    /// unique. Nested `rest_config`s are checked the same way.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.body_mapping.is_some() && self.static_body_mapping.is_some() {
            return Err(ConfigError::invalid(format!(
                "callback config for '{}' sets both body_mapping and static_body_mapping",
                self.url()
            )));
        }

        let mut seen = HashSet::new();
        for key in &self.generated_keys {
            if !seen.insert(key.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "generated key '{}' is declared more than once",
                    key.name
                )));
            }
            if let Some(rest) = key
                .auth_config
                .as_ref()
                .and_then(|auth| auth.rest_config.as_deref())
            {
                rest.validate().map_err(|err| match err {
                    ConfigError::Invalid { context } => ConfigError::Invalid {
                        context: context.scoped(&key.placeholder()),
                    },
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}
