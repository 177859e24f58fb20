//! Request handling: validate, dispatch, report
//!
//! One call to [`RequestHandler::handle`] is one unit of work. It makes at most
//! one delivery attempt and at most one status write, and always produces a
//! response. Retrying is left to the caller.

pub mod error;
pub mod request;

pub use error::{HandlerError, HandlerResult};
pub use request::{FunctionRequest, FunctionResponse, Request};

use crate::config::ConfigResolver;
use crate::resource::{EmailSpec, ResourceMetadata, ResourceRef, DEFAULT_NAMESPACE};
use crate::smtp::{MailTransport, MessageBuilder, SendOutcome};
use crate::status::{Outcome, StatusReporter};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;

/// The identifying part of an inbound Email resource
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub resource: ResourceRef,
    pub generation: i64,
    pub spec: Value,
}

impl Envelope {
    /// Decode the request body. Fails before a resource name is known.
    pub fn parse(body: &[u8]) -> HandlerResult<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| HandlerError::malformed(format!("Invalid request body: {}", e)))?;

        let value: Value = serde_json::from_str(text)
            .map_err(|e| HandlerError::malformed(format!("Invalid JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| HandlerError::malformed("Invalid JSON: expected an object"))?;

        let metadata = match object.get("metadata") {
            None | Some(Value::Null) => ResourceMetadata::default(),
            Some(raw) => ResourceMetadata::deserialize(raw)
                .map_err(|e| HandlerError::malformed(format!("Invalid metadata: {}", e)))?,
        };

        let name = metadata
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| HandlerError::malformed("Missing metadata.name in Email CR"))?;
        let namespace = metadata
            .namespace
            .filter(|namespace| !namespace.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let generation = match metadata.generation {
            None => 0,
            Some(generation) if generation >= 0 => generation,
            Some(generation) => {
                return Err(HandlerError::malformed(format!(
                    "Invalid metadata.generation: {}",
                    generation
                )))
            }
        };

        Ok(Self {
            resource: ResourceRef::new(namespace, name),
            generation,
            spec: object.get("spec").cloned().unwrap_or(Value::Null),
        })
    }

    /// All five fields present, string-typed and non-empty, or the names of those that are not
    pub fn validate(&self) -> Result<EmailSpec, Vec<&'static str>> {
        let empty = Map::new();
        let spec = self.spec.as_object().unwrap_or(&empty);

        let mut missing = Vec::new();
        let mut take = |name: &'static str| match spec.get(name).and_then(Value::as_str) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let fields = EmailSpec {
            to_address: take("toAddress"),
            from_name: take("fromName"),
            from_address: take("fromAddress"),
            subject: take("subject"),
            body: take("body"),
        };

        if missing.is_empty() {
            Ok(fields)
        } else {
            Err(missing)
        }
    }
}

/// Orchestrates one invocation
#[derive(Clone)]
pub struct RequestHandler {
    resolver: ConfigResolver,
    transport: Arc<dyn MailTransport>,
    reporter: StatusReporter,
}

impl RequestHandler {
    pub fn new(
        resolver: ConfigResolver,
        transport: Arc<dyn MailTransport>,
        reporter: StatusReporter,
    ) -> Self {
        Self {
            resolver,
            transport,
            reporter,
        }
    }

    /// Handle one request. Never fails; every path yields a response.
    pub async fn handle<R: Request + ?Sized>(&self, request: &R) -> FunctionResponse {
        match AssertUnwindSafe(self.handle_request(request))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(panic) => {
                let error = HandlerError::Unclassified(panic_message(panic.as_ref()));
                tracing::error!(kind = %error.kind(), "{}", error);
                FunctionResponse::from(&error)
            }
        }
    }

    async fn handle_request<R: Request + ?Sized>(&self, request: &R) -> FunctionResponse {
        if !request.method().eq_ignore_ascii_case("POST") {
            return self.reject(HandlerError::MethodNotAllowed(request.method().to_string()));
        }

        let envelope = match Envelope::parse(request.body()) {
            Ok(envelope) => envelope,
            Err(error) => return self.reject(error),
        };

        let span = tracing::info_span!(
            "email",
            name = %envelope.resource.name,
            namespace = %envelope.resource.namespace,
            generation = envelope.generation
        );
        self.process(&envelope).instrument(span).await
    }

    /// Everything after the resource name is known; failures here are reported on status
    async fn process(&self, envelope: &Envelope) -> FunctionResponse {
        match AssertUnwindSafe(self.dispatch(envelope)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let error = HandlerError::Unclassified(panic_message(panic.as_ref()));
                self.fail(envelope, error).await
            }
        }
    }

    async fn dispatch(&self, envelope: &Envelope) -> FunctionResponse {
        let spec = match envelope.validate() {
            Ok(spec) => spec,
            Err(missing) => {
                return self.fail(envelope, HandlerError::Validation { missing }).await;
            }
        };

        match self.send(&spec).await {
            SendOutcome::Success => {
                tracing::info!(to = %spec.to_address, "Email sent");
                self.reporter
                    .report(&envelope.resource, envelope.generation, &Outcome::Sent)
                    .await;
                FunctionResponse::ok(json!({
                    "message": "Email sent successfully",
                    "to": spec.to_address,
                    "subject": spec.subject,
                }))
            }
            SendOutcome::Failure(e) => self.fail(envelope, HandlerError::Transport(e)).await,
        }
    }

    /// Resolve configuration, build the message and make one delivery attempt
    async fn send(&self, spec: &EmailSpec) -> SendOutcome {
        let config = match self.resolver.resolve_smtp() {
            Ok(config) => config,
            Err(e) => return SendOutcome::Failure(e),
        };

        let message = match MessageBuilder::from_spec(spec).and_then(MessageBuilder::build) {
            Ok(message) => message,
            Err(e) => return SendOutcome::Failure(e),
        };

        self.transport.send(&config, message).await
    }

    async fn fail(&self, envelope: &Envelope, error: HandlerError) -> FunctionResponse {
        tracing::warn!(kind = %error.kind(), retryable = error.is_retryable(), "{}", error);
        self.reporter
            .report(
                &envelope.resource,
                envelope.generation,
                &Outcome::Failed(error.to_string()),
            )
            .await;
        FunctionResponse::from(&error)
    }

    fn reject(&self, error: HandlerError) -> FunctionResponse {
        tracing::warn!(kind = %error.kind(), "Rejected request: {}", error);
        FunctionResponse::from(&error)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let envelope = Envelope::parse(br#"{"metadata":{"name":"welcome"}}"#).unwrap();
        assert_eq!(envelope.resource, ResourceRef::new("default", "welcome"));
        assert_eq!(envelope.generation, 0);
        assert_eq!(envelope.spec, Value::Null);
    }

    #[test]
    fn test_parse_full_metadata() {
        let envelope = Envelope::parse(
            br#"{"metadata":{"name":"welcome","namespace":"shop","generation":5},"spec":{}}"#,
        )
        .unwrap();
        assert_eq!(envelope.resource, ResourceRef::new("shop", "welcome"));
        assert_eq!(envelope.generation, 5);
    }

    #[test]
    fn test_parse_rejections() {
        let cases: [&[u8]; 9] = [
            b"\xff\xfe",
            b"not json",
            b"[1, 2, 3]",
            br#"{"spec":{}}"#,
            br#"{"metadata":{"name":""}}"#,
            br#"{"metadata":{"name":42}}"#,
            br#"{"metadata":{"name":"x","generation":"three"}}"#,
            br#"{"metadata":{"name":"x","generation":-1}}"#,
            br#"{"metadata":"welcome"}"#,
        ];
        for body in cases {
            let result = Envelope::parse(body);
            assert!(
                matches!(result, Err(HandlerError::MalformedRequest(_))),
                "body {:?} gave {:?}",
                String::from_utf8_lossy(body),
                result
            );
        }
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let envelope = Envelope::parse(
            br#"{"metadata":{"name":"x"},"spec":{"toAddress":"","fromName":null,"fromAddress":"a@b.c","subject":7,"body":"Hi"}}"#,
        )
        .unwrap();

        assert_eq!(
            envelope.validate().unwrap_err(),
            vec!["toAddress", "fromName", "subject"]
        );
    }

    #[test]
    fn test_validate_missing_spec() {
        let envelope = Envelope::parse(br#"{"metadata":{"name":"x"}}"#).unwrap();
        assert_eq!(envelope.validate().unwrap_err().len(), 5);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
