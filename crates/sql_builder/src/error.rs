use common::error::diagnostics::DiagnosticMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("configuration error: {context}")]
    ConfigError { context: DiagnosticMessage },
    #[error("value resolution failed: {context}")]
    ResolutionError {
        context: DiagnosticMessage,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl UpdateError {
    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            context: DiagnosticMessage::new(message.into()),
        }
    }

    #[track_caller]
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::ResolutionError {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    pub fn context(&self) -> &DiagnosticMessage {
        match self {
            UpdateError::ConfigError { context } | UpdateError::ResolutionError { context, .. } => {
                context
            }
        }
    }
}

impl From<common::ConfigError> for UpdateError {
    fn from(err: common::ConfigError) -> Self {
        UpdateError::ConfigError {
            context: err.context().clone(),
        }
    }
}

impl From<regex::Error> for UpdateError {
    #[track_caller]
    fn from(err: regex::Error) -> Self {
        UpdateError::ResolutionError {
            context: DiagnosticMessage::new(format!("invalid pattern: {err}")),
            source: Some(Box::new(err)),
        }
    }
}
