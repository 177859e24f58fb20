//! Email custom resource model
//!
//! Mirrors the `product.webshop.harikube.info/v1` `Email` kind. This crate only
//! ever reads `metadata` and `spec` and only ever writes `status`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// API group of the Email resource
pub const API_GROUP: &str = "product.webshop.harikube.info";
/// API version of the Email resource
pub const API_VERSION: &str = "v1";
/// Plural resource name used in API paths
pub const PLURAL: &str = "emails";
/// Namespace used when the envelope does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// The `metadata` fields the function reads from an inbound resource
///
/// Every field is optional on the wire; a null value counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub generation: Option<i64>,
}

/// Desired state: the email to send
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSpec {
    pub to_address: String,
    pub from_name: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
}

impl EmailSpec {
    /// Field names a send attempt requires, in wire spelling
    pub const REQUIRED_FIELDS: [&'static str; 5] =
        ["toAddress", "fromName", "fromAddress", "subject", "body"];
}

/// Observed state, owned by this crate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatus {
    #[serde(default)]
    pub last_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_timestamp: Option<String>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_timestamp: Option<String>,
}

/// Identifies one Email resource in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// API path of the status sub-resource, relative to the API server root
    pub fn status_path(&self) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}/{}/status",
            API_GROUP, API_VERSION, self.namespace, PLURAL, self.name
        )
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_path() {
        let resource = ResourceRef::new("shop", "welcome-42");
        assert_eq!(
            resource.status_path(),
            "/apis/product.webshop.harikube.info/v1/namespaces/shop/emails/welcome-42/status"
        );
        assert_eq!(resource.to_string(), "shop/welcome-42");
    }

    #[test]
    fn test_metadata_tolerates_nulls_and_extra_fields() {
        let metadata: ResourceMetadata = serde_json::from_value(serde_json::json!({
            "name": "welcome",
            "namespace": null,
            "uid": "0b6f5c1e",
            "labels": { "app": "shop" }
        }))
        .unwrap();

        assert_eq!(metadata.name.as_deref(), Some("welcome"));
        assert_eq!(metadata.namespace, None);
        assert_eq!(metadata.generation, None);
    }

    #[test]
    fn test_metadata_rejects_wrong_types() {
        for raw in [
            serde_json::json!({ "name": 42 }),
            serde_json::json!({ "name": "x", "generation": "three" }),
            serde_json::json!({ "name": "x", "generation": 1.5 }),
        ] {
            assert!(serde_json::from_value::<ResourceMetadata>(raw).is_err());
        }
    }

    #[test]
    fn test_status_serialization_skips_unset_timestamps() {
        let status = EmailStatus {
            last_generation: 3,
            sent_timestamp: Some("2025-01-01T00:00:00Z".to_string()),
            error_message: String::new(),
            error_timestamp: None,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "lastGeneration": 3,
                "sentTimestamp": "2025-01-01T00:00:00Z",
                "errorMessage": ""
            })
        );
    }
}
