use crate::config::callback::CallbackConfig;
use crate::config::error::ConfigError;
use crate::config::update::UpdateDataConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                Ok(Self::Yaml)
            }
            _ => Err(ConfigError::unsupported_format(path)),
        }
    }
}

fn load_document<V>(path: &Path) -> Result<V, ConfigError>
where
    V: DeserializeOwned,
{
    let format = DocumentFormat::from_path(path)?;
    let raw = fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), ?format, "loading document");
    let parsed = match format {
        DocumentFormat::Json => serde_json::from_str(&raw)?,
        DocumentFormat::Yaml => serde_yaml::from_str(&raw)?,
    };
    Ok(parsed)
}

/// Parse and validate a callback configuration from JSON text.
pub fn parse_callback_config(raw: &str) -> Result<CallbackConfig, ConfigError> {
    let config: CallbackConfig = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

pub fn load_callback_config(path: &Path) -> Result<CallbackConfig, ConfigError> {
    let config: CallbackConfig = load_document(path)?;
    config.validate()?;
    Ok(config)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UpdateDocument {
    Nested { update_data_config: UpdateDataConfig },
    Bare(UpdateDataConfig),
}

/// Load update-data rules either from a bare document or from the
/// `update_data_config` entry of a full callback configuration.
pub fn load_update_data_config(path: &Path) -> Result<UpdateDataConfig, ConfigError> {
    match load_document::<UpdateDocument>(path)? {
        UpdateDocument::Nested { update_data_config } => Ok(update_data_config),
        UpdateDocument::Bare(config) => Ok(config),
    }
}

/// Read an arbitrary JSON document, e.g. a data snapshot or partner response.
pub fn read_json_document(path: &Path) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| {
        let message = format!("{}: {}", path.display(), err);
        ConfigError::ParseError {
            context: crate::error::DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    })
}
