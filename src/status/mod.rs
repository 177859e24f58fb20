//! Records delivery outcomes on the Email resource's status
//!
//! Writes are best-effort. A failed write is logged and dropped; the caller's
//! response has already been decided by then.

use crate::error::ErrorKind;
use crate::kube::KubeResult;
use crate::resource::{EmailStatus, ResourceRef};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

/// Anything that can merge-patch an Email resource's status
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn patch_status(&self, resource: &ResourceRef, status: &EmailStatus) -> KubeResult<()>;
}

/// What happened to the request being reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Failed(String),
}

/// UTC, second precision, `Z` suffix
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build the status patch for `outcome`
///
/// Only the fields describing this outcome are present; fields left over from
/// an earlier outcome are not cleared.
pub fn status_patch(generation: i64, outcome: &Outcome, now: DateTime<Utc>) -> EmailStatus {
    match outcome {
        Outcome::Sent => EmailStatus {
            last_generation: generation,
            sent_timestamp: Some(format_timestamp(now)),
            error_message: String::new(),
            error_timestamp: None,
        },
        Outcome::Failed(message) => EmailStatus {
            last_generation: generation,
            sent_timestamp: None,
            error_message: message.clone(),
            error_timestamp: Some(format_timestamp(now)),
        },
    }
}

/// Applies status patches through a [`StatusStore`]
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn StatusStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Write `outcome` for `generation`. Never fails.
    ///
    /// The generation is written as given, even if the store already holds a
    /// newer one.
    pub async fn report(&self, resource: &ResourceRef, generation: i64, outcome: &Outcome) {
        let patch = status_patch(generation, outcome, Utc::now());

        match self.store.patch_status(resource, &patch).await {
            Ok(()) => {
                tracing::info!(
                    name = %resource.name,
                    namespace = %resource.namespace,
                    generation,
                    sent = matches!(outcome, Outcome::Sent),
                    "Patched Email status"
                );
            }
            Err(e) if e.is_api_error() => {
                tracing::warn!(
                    kind = %ErrorKind::StatusWriteError,
                    name = %resource.name,
                    namespace = %resource.namespace,
                    generation,
                    "Failed to patch Email status: {}",
                    e
                );
            }
            Err(e) => {
                tracing::error!(
                    kind = %ErrorKind::StatusWriteError,
                    name = %resource.name,
                    namespace = %resource.namespace,
                    generation,
                    "Unexpected error patching Email status: {}",
                    e
                );
            }
        }
    }
}
