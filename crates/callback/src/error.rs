use common::error::diagnostics::DiagnosticMessage;
use shared_clients::HttpClientError;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("configuration error: {context}")]
    ConfigError {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("transform error: {context}")]
    TransformError {
        context: DiagnosticMessage,
        #[source]
        source: Option<transform::TransformError>,
    },
    #[error("network error: {context}")]
    NetworkError {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    #[error("auth validation failed: {context}")]
    AuthValidationError { context: DiagnosticMessage },
}

impl CallbackError {
    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn auth_validation(message: impl Into<String>) -> Self {
        Self::AuthValidationError {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    pub fn context(&self) -> &DiagnosticMessage {
        match self {
            CallbackError::ConfigError { context, .. }
            | CallbackError::TransformError { context, .. }
            | CallbackError::NetworkError { context, .. }
            | CallbackError::AuthValidationError { context } => context,
        }
    }
}

impl From<common::ConfigError> for CallbackError {
    fn from(err: common::ConfigError) -> Self {
        CallbackError::ConfigError {
            context: err.context().clone(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<transform::TransformError> for CallbackError {
    fn from(err: transform::TransformError) -> Self {
        CallbackError::TransformError {
            context: err.context().clone(),
            source: Some(err),
        }
    }
}

impl From<HttpClientError> for CallbackError {
    fn from(err: HttpClientError) -> Self {
        CallbackError::NetworkError {
            context: err.context().clone(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for CallbackError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        CallbackError::ConfigError {
            context: DiagnosticMessage::new(err.to_string()),
            source: Some(Box::new(err)),
        }
    }
}
