use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every way an extraction request can fail. All of them end the request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidRequest(String),

    /// A required credential is not present in the environment.
    #[error("{0}")]
    Configuration(String),

    #[error("{message}")]
    Generation { message: String, transient: bool },

    /// Sanitized model output did not decode as structured data.
    #[error("{0}")]
    Parse(String),

    #[error("{message}")]
    Enrichment { message: String, transient: bool },
}

impl PipelineError {
    pub fn generation(message: impl Into<String>) -> Self {
        PipelineError::Generation {
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient_generation(message: impl Into<String>) -> Self {
        PipelineError::Generation {
            message: message.into(),
            transient: true,
        }
    }

    pub fn enrichment(message: impl Into<String>) -> Self {
        PipelineError::Enrichment {
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient_enrichment(message: impl Into<String>) -> Self {
        PipelineError::Enrichment {
            message: message.into(),
            transient: true,
        }
    }

    pub fn missing_credential(var: &str) -> Self {
        PipelineError::Configuration(format!("Missing required secret: {}", var))
    }

    /// Machine-readable tag sent next to the message in the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Configuration(_) => "configuration_error",
            PipelineError::Generation { .. } => "generation_error",
            PipelineError::Parse(_) => "parse_error",
            PipelineError::Enrichment { .. } => "enrichment_error",
        }
    }

    /// Whether another attempt at the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Generation { transient: true, .. }
                | PipelineError::Enrichment { transient: true, .. }
        )
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse(format!("Failed to parse model output: {}", err))
    }
}
