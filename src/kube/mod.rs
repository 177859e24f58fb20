//! Minimal client for the Email resource's status sub-resource
//!
//! Only one call is needed: a JSON merge patch of `status`. Bootstrap follows
//! the in-cluster conventions (service host/port from the environment, bearer
//! token and CA bundle from the mounted service account).

pub mod store;

pub use store::InClusterStore;

use crate::config::EnvSource;
use crate::resource::{EmailStatus, ResourceRef};
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Mount point of the pod's service account credentials
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

const MERGE_PATCH: &str = "application/merge-patch+json";

pub type KubeResult<T> = Result<T, KubeError>;

/// Resource store errors
#[derive(Error, Debug)]
pub enum KubeError {
    #[error("Not running in a cluster: {0}")]
    NotInCluster(String),

    #[error("Failed to read {path}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API server returned {status}: {body}")]
    Api { status: u16, body: String },
}

impl KubeError {
    /// Whether the API server rejected the request (as opposed to never seeing it)
    pub fn is_api_error(&self) -> bool {
        matches!(self, KubeError::Api { .. })
    }
}

/// Where the bearer token comes from
#[derive(Debug, Clone)]
pub enum TokenSource {
    None,
    Static(String),
    /// Re-read on every request; projected tokens are rotated in place
    File(PathBuf),
}

impl TokenSource {
    fn token(&self) -> KubeResult<Option<String>> {
        match self {
            TokenSource::None => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::File(path) => std::fs::read_to_string(path)
                .map(|t| Some(t.trim().to_string()))
                .map_err(|source| KubeError::Credentials {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// Connection settings for the API server
#[derive(Debug, Clone)]
pub struct KubeConfig {
    pub api_server: String,
    pub token: TokenSource,
    pub ca_cert_pem: Option<Vec<u8>>,
}

impl KubeConfig {
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            token: TokenSource::None,
            ca_cert_pem: None,
        }
    }

    pub fn with_token(mut self, token: TokenSource) -> Self {
        self.token = token;
        self
    }

    /// Configuration of the pod this process runs in
    pub fn in_cluster() -> KubeResult<Self> {
        Self::in_cluster_from(Path::new(SERVICE_ACCOUNT_DIR), &EnvSource::Process)
    }

    pub fn in_cluster_from(service_account_dir: &Path, env: &EnvSource) -> KubeResult<Self> {
        let host = env
            .get("KUBERNETES_SERVICE_HOST")
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                KubeError::NotInCluster("KUBERNETES_SERVICE_HOST is not set".to_string())
            })?;
        let port = env
            .get("KUBERNETES_SERVICE_PORT")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "443".to_string());

        let api_server = if host.contains(':') {
            format!("https://[{}]:{}", host, port)
        } else {
            format!("https://{}:{}", host, port)
        };

        let token_path = service_account_dir.join("token");
        if !token_path.is_file() {
            return Err(KubeError::Credentials {
                path: token_path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "token not mounted"),
            });
        }

        let ca_path = service_account_dir.join("ca.crt");
        let ca_cert_pem = std::fs::read(&ca_path).map_err(|source| KubeError::Credentials {
            path: ca_path,
            source,
        })?;

        Ok(Self {
            api_server,
            token: TokenSource::File(token_path),
            ca_cert_pem: Some(ca_cert_pem),
        })
    }
}

/// HTTP client for the Email status sub-resource
#[derive(Debug, Clone)]
pub struct KubeClient {
    config: KubeConfig,
    http: reqwest::Client,
}

impl KubeClient {
    pub fn new(config: KubeConfig) -> KubeResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(pem) = &config.ca_cert_pem {
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(pem)?);
        }
        let http = builder.build()?;

        Ok(Self { config, http })
    }

    pub fn status_url(&self, resource: &ResourceRef) -> String {
        format!(
            "{}{}",
            self.config.api_server.trim_end_matches('/'),
            resource.status_path()
        )
    }

    /// Merge-patch `status` of the resource; spec and metadata are untouched
    pub async fn patch_status(&self, resource: &ResourceRef, status: &EmailStatus) -> KubeResult<()> {
        let body = serde_json::to_vec(&serde_json::json!({ "status": status }))?;

        let mut request = self
            .http
            .patch(self.status_url(resource))
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(body);
        if let Some(token) = self.config.token.token()? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status_code = response.status();
        if status_code.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(KubeError::Api {
            status: status_code.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> EnvSource {
        EnvSource::Fixed(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_status_url() {
        let client = KubeClient::new(KubeConfig::new("https://10.0.0.1:443/")).unwrap();
        assert_eq!(
            client.status_url(&ResourceRef::new("default", "welcome")),
            "https://10.0.0.1:443/apis/product.webshop.harikube.info/v1/namespaces/default/emails/welcome/status"
        );
    }

    #[test]
    fn test_in_cluster_requires_service_host() {
        let dir = TempDir::new().unwrap();
        let result = KubeConfig::in_cluster_from(dir.path(), &env(&[]));
        assert!(matches!(result, Err(KubeError::NotInCluster(_))));
    }

    #[test]
    fn test_in_cluster_requires_token() {
        let dir = TempDir::new().unwrap();
        let result = KubeConfig::in_cluster_from(
            dir.path(),
            &env(&[("KUBERNETES_SERVICE_HOST", "10.0.0.1")]),
        );
        assert!(matches!(result, Err(KubeError::Credentials { .. })));
    }

    #[test]
    fn test_in_cluster_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("token"), "abc\n").unwrap();
        std::fs::write(dir.path().join("ca.crt"), "-----BEGIN CERTIFICATE-----\n").unwrap();

        let config = KubeConfig::in_cluster_from(
            dir.path(),
            &env(&[
                ("KUBERNETES_SERVICE_HOST", "fd00::1"),
                ("KUBERNETES_SERVICE_PORT", "6443"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_server, "https://[fd00::1]:6443");
        assert_eq!(config.token.token().unwrap().as_deref(), Some("abc"));
        assert!(config.ca_cert_pem.is_some());
    }

    #[tokio::test]
    async fn test_patch_against_unreachable_server_fails() {
        let client = KubeClient::new(
            KubeConfig::new("http://127.0.0.1:1").with_token(TokenSource::Static("t".to_string())),
        )
        .unwrap();

        let result = client
            .patch_status(&ResourceRef::new("default", "welcome"), &EmailStatus::default())
            .await;

        match result {
            Err(e) => assert!(!e.is_api_error()),
            Ok(()) => panic!("patch against a closed port succeeded"),
        }
    }
}
