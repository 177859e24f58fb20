use crate::error::ErrorKind;
use crate::resource::EmailSpec;
use crate::smtp::SmtpError;
use serde_json::{json, Value};
use thiserror::Error;

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Errors that end an invocation, one variant per response class
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Method {0} not allowed. Only POST is supported.")]
    MethodNotAllowed(String),

    #[error("{0}")]
    MalformedRequest(String),

    #[error("Missing required fields in Email spec")]
    Validation { missing: Vec<&'static str> },

    #[error("Failed to send email: {0}")]
    Transport(#[source] SmtpError),

    #[error("Unexpected error: {0}")]
    Unclassified(String),
}

impl HandlerError {
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        HandlerError::MalformedRequest(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            HandlerError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            HandlerError::Validation { .. } => ErrorKind::ValidationError,
            HandlerError::Transport(_) => ErrorKind::TransportError,
            HandlerError::Unclassified(_) => ErrorKind::UnclassifiedError,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::MethodNotAllowed(_) => 405,
            HandlerError::MalformedRequest(_) | HandlerError::Validation { .. } => 400,
            HandlerError::Transport(_) | HandlerError::Unclassified(_) => 500,
        }
    }

    /// Whether re-invoking with the same input may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            HandlerError::Transport(e) => e.is_transient(),
            HandlerError::Unclassified(_) => true,
            _ => false,
        }
    }

    /// JSON body returned to the caller
    pub fn to_body(&self) -> Value {
        match self {
            HandlerError::Validation { missing } => json!({
                "error": self.to_string(),
                "required": EmailSpec::REQUIRED_FIELDS,
                "missing": missing,
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}
