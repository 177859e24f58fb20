use serde::Serialize;
use std::fmt;

/// Classification of every way an invocation can go wrong
///
/// The caller uses it (with [`ErrorKind::is_terminal`]) to decide whether to
/// re-invoke with the same generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MethodNotAllowed,
    MalformedRequest,
    ValidationError,
    TransportError,
    StatusWriteError,
    UnclassifiedError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::MalformedRequest => "MalformedRequest",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::TransportError => "TransportError",
            ErrorKind::StatusWriteError => "StatusWriteError",
            ErrorKind::UnclassifiedError => "UnclassifiedError",
        }
    }

    /// Retrying without changing the input cannot succeed
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ErrorKind::MethodNotAllowed | ErrorKind::MalformedRequest | ErrorKind::ValidationError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
