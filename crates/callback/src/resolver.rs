use common::config::ConfigKey;
use serde::Serialize;
use std::collections::BTreeMap;

pub const CONFIG_KEYS_PREFIX: &str = "config_keys.";
pub const GENERATED_KEYS_PREFIX: &str = "generated_keys.";

/// Placeholder tables consulted when resolving header values, secrets and
/// message parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyMaps {
    config_keys: BTreeMap<String, String>,
    generated_keys: BTreeMap<String, String>,
}

impl KeyMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers each key as `config_keys.<name>` mapped to its `key` field.
    pub fn with_config_keys(keys: &[ConfigKey]) -> Self {
        let config_keys = keys
            .iter()
            .map(|k| (format!("{CONFIG_KEYS_PREFIX}{}", k.name), k.key.clone()))
            .collect();
        Self {
            config_keys,
            generated_keys: BTreeMap::new(),
        }
    }

    pub fn insert_generated(&mut self, placeholder: impl Into<String>, value: impl Into<String>) {
        self.generated_keys.insert(placeholder.into(), value.into());
    }

    pub fn generated(&self, placeholder: &str) -> Option<&str> {
        self.generated_keys.get(placeholder).map(String::as_str)
    }

    pub fn config_keys(&self) -> &BTreeMap<String, String> {
        &self.config_keys
    }

    pub fn generated_keys(&self) -> &BTreeMap<String, String> {
        &self.generated_keys
    }

    /// Non-empty config entry, else non-empty generated entry, else `raw`.
    pub fn resolve(&self, raw: &str) -> String {
        self.config_keys
            .get(raw)
            .filter(|v| !v.is_empty())
            .or_else(|| self.generated_keys.get(raw).filter(|v| !v.is_empty()))
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }
}
