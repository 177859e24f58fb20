use crate::error::ErrorKind;
use crate::handler::HandlerError;
use serde_json::Value;

/// An inbound invocation, as handed over by the transport layer
pub trait Request {
    fn method(&self) -> &str;
    fn body(&self) -> &[u8];
}

/// Owned request, the form every transport adapter produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRequest {
    pub method: String,
    pub body: Vec<u8>,
}

impl FunctionRequest {
    pub fn new(method: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: method.into(),
            body: body.into(),
        }
    }

    pub fn post(body: impl Into<Vec<u8>>) -> Self {
        Self::new("POST", body)
    }
}

impl Request for FunctionRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub status_code: u16,
    pub body: Value,
    /// Set on every non-2xx response
    pub error_kind: Option<ErrorKind>,
    pub retryable: bool,
}

impl FunctionResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body,
            error_kind: None,
            retryable: false,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Body serialized as a JSON string
    pub fn body_string(&self) -> String {
        self.body.to_string()
    }
}

impl From<&HandlerError> for FunctionResponse {
    fn from(error: &HandlerError) -> Self {
        Self {
            status_code: error.status_code(),
            body: error.to_body(),
            error_kind: Some(error.kind()),
            retryable: error.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response() {
        let response = FunctionResponse::from(&HandlerError::MethodNotAllowed("PUT".to_string()));

        assert_eq!(response.status_code, 405);
        assert!(!response.is_success());
        assert_eq!(response.error_kind, Some(ErrorKind::MethodNotAllowed));
        assert!(!response.retryable);
        assert_eq!(
            response.body_string(),
            r#"{"error":"Method PUT not allowed. Only POST is supported."}"#
        );
    }

    #[test]
    fn test_ok_response() {
        let response = FunctionResponse::ok(json!({ "message": "done" }));
        assert!(response.is_success());
        assert_eq!(response.error_kind, None);
    }
}
