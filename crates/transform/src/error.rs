use common::error::DiagnosticMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid reshaping spec: {context}")]
    InvalidSpec {
        context: DiagnosticMessage,
        #[source]
        source: Option<serde_json::Error>,
    },
    #[error("invalid input document: {context}")]
    InvalidInput {
        context: DiagnosticMessage,
        #[source]
        source: Option<serde_json::Error>,
    },
    #[error("required path missing: {context}")]
    MissingPath { context: DiagnosticMessage },
    #[error("timestamp conversion failed: {context}")]
    Timestamp {
        context: DiagnosticMessage,
        #[source]
        source: Option<chrono::ParseError>,
    },
}

impl TransformError {
    #[track_caller]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            context: DiagnosticMessage::new(message.into()),
            source: None,
        }
    }

    #[track_caller]
    pub fn missing_path(path: &str) -> Self {
        Self::MissingPath {
            context: DiagnosticMessage::new(format!("'{path}' is not present in the input")),
        }
    }

    #[track_caller]
    pub fn timestamp(message: impl Into<String>, source: Option<chrono::ParseError>) -> Self {
        Self::Timestamp {
            context: DiagnosticMessage::new(message.into()),
            source,
        }
    }

    pub fn context(&self) -> &DiagnosticMessage {
        match self {
            TransformError::InvalidSpec { context, .. }
            | TransformError::InvalidInput { context, .. }
            | TransformError::MissingPath { context }
            | TransformError::Timestamp { context, .. } => context,
        }
    }
}
