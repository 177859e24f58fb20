pub mod client;
pub mod message;

pub use client::{MailTransport, SmtpClient, SmtpConfig};
pub use message::{BodyKind, MessageBuilder};

use thiserror::Error;

/// SMTP-related errors
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Message formatting error: {0}")]
    MessageFormatError(String),

    #[error("{0}")]
    NetworkError(#[from] lettre::transport::smtp::Error),

    #[error("Address parse error: {0}")]
    AddressParseError(#[from] lettre::address::AddressError),

    #[error("Message build error: {0}")]
    MessageBuildError(#[from] lettre::error::Error),
}

impl SmtpError {
    /// Whether sending the same message again may succeed
    ///
    /// Bad configuration or malformed addresses will fail the same way on
    /// every attempt. Permanent (5xx) server replies are terminal as well.
    pub fn is_transient(&self) -> bool {
        match self {
            SmtpError::ConnectionFailed(_) => true,
            SmtpError::NetworkError(e) => !e.is_permanent(),
            SmtpError::InvalidConfig(_)
            | SmtpError::MessageFormatError(_)
            | SmtpError::AddressParseError(_)
            | SmtpError::MessageBuildError(_) => false,
        }
    }
}

pub type SmtpResult<T> = Result<T, SmtpError>;

/// Result of exactly one delivery attempt
#[derive(Debug)]
pub enum SendOutcome {
    Success,
    Failure(SmtpError),
}

impl SendOutcome {
    /// Description of the underlying cause, if the attempt failed
    pub fn reason(&self) -> Option<String> {
        match self {
            SendOutcome::Success => None,
            SendOutcome::Failure(e) => Some(e.to_string()),
        }
    }
}

impl From<SmtpResult<()>> for SendOutcome {
    fn from(result: SmtpResult<()>) -> Self {
        match result {
            Ok(()) => SendOutcome::Success,
            Err(e) => SendOutcome::Failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_reason() {
        assert_eq!(SendOutcome::Success.reason(), None);

        let failed = SendOutcome::Failure(SmtpError::ConnectionFailed("refused".to_string()));
        assert_eq!(failed.reason().as_deref(), Some("Connection failed: refused"));
    }

    #[test]
    fn test_outcome_from_result() {
        assert!(matches!(SendOutcome::from(Ok(())), SendOutcome::Success));

        let failed = SendOutcome::from(Err(SmtpError::InvalidConfig("port".to_string())));
        assert_eq!(
            failed.reason().as_deref(),
            Some("Invalid configuration: port")
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(SmtpError::ConnectionFailed("reset".to_string()).is_transient());
        assert!(!SmtpError::InvalidConfig("port".to_string()).is_transient());
        assert!(!SmtpError::MessageFormatError("no recipient".to_string()).is_transient());

        let address_error = "not an address"
            .parse::<lettre::Address>()
            .unwrap_err();
        assert!(!SmtpError::from(address_error).is_transient());
    }
}
