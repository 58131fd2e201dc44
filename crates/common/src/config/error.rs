use crate::error::diagnostics::DiagnosticMessage;
use std::{error::Error as StdError, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error: {context}")]
    ParseError {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("filesystem error: {context}")]
    PathError {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("invalid configuration: {context}")]
    Invalid { context: DiagnosticMessage },
    #[error("unsupported config format: {context}")]
    UnsupportedFormat { context: DiagnosticMessage },
}

impl ConfigError {
    #[track_caller]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn unsupported_format(path: impl AsRef<Path>) -> Self {
        let message = format!(
            "Expected a .json, .yml or .yaml file but got '{}'",
            path.as_ref().display()
        );
        Self::UnsupportedFormat {
            context: DiagnosticMessage::new(message),
        }
    }

    pub fn context(&self) -> &DiagnosticMessage {
        match self {
            ConfigError::ParseError { context, .. }
            | ConfigError::PathError { context, .. }
            | ConfigError::Invalid { context }
            | ConfigError::UnsupportedFormat { context } => context,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        ConfigError::PathError {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        let message = err.to_string();
        ConfigError::ParseError {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    #[track_caller]
    fn from(err: serde_yaml::Error) -> Self {
        let message = err.to_string();
        ConfigError::ParseError {
            context: DiagnosticMessage::new(message),
            source: Some(Box::new(err)),
        }
    }
}
