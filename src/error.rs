use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, DocFlowError>;

/// The Error type for ingestion, chat and notification operations.
#[derive(Error, Debug)]
pub enum DocFlowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    /// A required request field was absent or empty.
    #[error("{0}")]
    MissingInput(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("{provider} provider error: {message}")]
    ProviderError {
        provider: &'static str,
        message: String,
    },

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Error in processing step '{step_name}': {source}")]
    StepError {
        step_name: String,
        source: Box<DocFlowError>,
    },

    #[error("HTTP client error: {source}")]
    HttpError {
        #[from]
        source: reqwest::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },
}

impl DocFlowError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        DocFlowError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        DocFlowError::ProviderError {
            provider,
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's request rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DocFlowError::MissingInput(_)
                | DocFlowError::UnsupportedSource(_)
                | DocFlowError::InvalidValue(_)
        )
    }
}
