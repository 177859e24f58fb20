//! Layered SMTP configuration
//!
//! Each key is looked up in three places, first hit wins:
//! 1. a file named after the key inside the secret mount directory,
//! 2. the matching environment variable,
//! 3. the built-in default (credentials have none).
//!
//! Values are resolved again for every send attempt so rotated secrets take
//! effect without a restart.

use crate::smtp::{SmtpConfig, SmtpError, SmtpResult};
use std::collections::HashMap;
use std::path::PathBuf;

/// Conventional secret mount of the function runtime
pub const DEFAULT_SECRETS_DIR: &str = "/var/openfaas/secrets";

/// A configuration key with its secret file name, environment variable and default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Host,
    Port,
    Username,
    Password,
    UseTls,
}

impl ConfigKey {
    /// File name under the secret mount
    pub fn secret_name(self) -> &'static str {
        match self {
            ConfigKey::Host => "smtp-host",
            ConfigKey::Port => "smtp-port",
            ConfigKey::Username => "smtp-username",
            ConfigKey::Password => "smtp-password",
            ConfigKey::UseTls => "smtp-use-tls",
        }
    }

    /// Environment variable consulted when the secret is absent
    pub fn env_var(self) -> &'static str {
        match self {
            ConfigKey::Host => "SMTP_HOST",
            ConfigKey::Port => "SMTP_PORT",
            ConfigKey::Username => "SMTP_USERNAME",
            ConfigKey::Password => "SMTP_PASSWORD",
            ConfigKey::UseTls => "SMTP_USE_TLS",
        }
    }

    pub fn default_value(self) -> Option<&'static str> {
        match self {
            ConfigKey::Host => Some("localhost"),
            ConfigKey::Port => Some("587"),
            ConfigKey::UseTls => Some("true"),
            ConfigKey::Username | ConfigKey::Password => None,
        }
    }
}

/// Where environment lookups go
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The process environment
    #[default]
    Process,
    /// A fixed map, used by tests and embedders
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    pub(crate) fn get(&self, name: &str) -> Option<String> {
        match self {
            EnvSource::Process => std::env::var(name).ok(),
            EnvSource::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// Resolves SMTP settings from secret files, environment and defaults
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    secrets_dir: PathBuf,
    env: EnvSource,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SECRETS_DIR)
    }
}

impl ConfigResolver {
    /// Create a resolver reading secrets from `secrets_dir` and the process environment
    pub fn new(secrets_dir: impl Into<PathBuf>) -> Self {
        Self {
            secrets_dir: secrets_dir.into(),
            env: EnvSource::Process,
        }
    }

    /// Replace the environment source
    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }

    /// Resolve a single key. Never fails: unreadable secrets count as absent.
    pub fn resolve(&self, key: ConfigKey) -> Option<String> {
        if let Some(value) = self.read_secret(key) {
            tracing::debug!(key = key.secret_name(), source = "secret", "Resolved SMTP setting");
            return Some(value);
        }

        if let Some(value) = self.env.get(key.env_var()).filter(|v| !v.is_empty()) {
            tracing::debug!(key = key.secret_name(), source = "env", "Resolved SMTP setting");
            return Some(value);
        }

        key.default_value().map(str::to_string)
    }

    /// Resolve every key into a connection configuration
    ///
    /// Fails only when the port is not a number.
    pub fn resolve_smtp(&self) -> SmtpResult<SmtpConfig> {
        let host = self
            .resolve(ConfigKey::Host)
            .unwrap_or_else(|| "localhost".to_string());

        let port_raw = self
            .resolve(ConfigKey::Port)
            .unwrap_or_else(|| "587".to_string());
        let port = port_raw.trim().parse::<u16>().map_err(|e| {
            SmtpError::InvalidConfig(format!("invalid SMTP port {:?}: {}", port_raw, e))
        })?;

        let use_tls = self
            .resolve(ConfigKey::UseTls)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let mut config = SmtpConfig::new(host, port).with_tls(use_tls);
        // AUTH needs both halves; a lone username or password is ignored
        if let (Some(username), Some(password)) = (
            self.resolve(ConfigKey::Username),
            self.resolve(ConfigKey::Password),
        ) {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }

    fn read_secret(&self, key: ConfigKey) -> Option<String> {
        let path = self.secrets_dir.join(key.secret_name());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let value = contents.trim();
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read secret, falling back to environment"
                );
                None
            }
        }
    }
}
