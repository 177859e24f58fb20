use crate::smtp::{SendOutcome, SmtpError, SmtpResult};
use async_trait::async_trait;
use lettre::{
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP connection parameters, resolved fresh for every send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            use_tls: true,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Credentials to authenticate with, only when both parts are non-empty
    pub fn credentials(&self) -> Option<Credentials> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(Credentials::new(user.to_string(), pass.to_string()))
            }
            _ => None,
        }
    }
}

/// Delivers one message to an SMTP endpoint
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Make exactly one delivery attempt
    async fn send(&self, config: &SmtpConfig, message: Message) -> SendOutcome;
}

/// lettre-backed transport: STARTTLS when configured, optional AUTH
#[derive(Debug, Clone, Default)]
pub struct SmtpClient;

impl SmtpClient {
    pub fn new() -> Self {
        Self
    }

    /// Build the lettre transport from configuration
    fn build_transport(config: &SmtpConfig) -> SmtpResult<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port);

        if config.use_tls {
            let tls_parameters = TlsParameters::new(config.host.clone()).map_err(tls_setup_error)?;
            builder = builder.tls(Tls::Required(tls_parameters));
        } else {
            builder = builder.tls(Tls::None);
        }

        if let Some(credentials) = config.credentials() {
            builder = builder.credentials(credentials);
        }

        Ok(builder.build())
    }

    async fn deliver(&self, config: &SmtpConfig, message: Message) -> SmtpResult<()> {
        let transport = Self::build_transport(config)?;
        transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl MailTransport for SmtpClient {
    async fn send(&self, config: &SmtpConfig, message: Message) -> SendOutcome {
        tracing::debug!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            authenticated = config.credentials().is_some(),
            "Connecting to SMTP server"
        );

        let outcome = SendOutcome::from(self.deliver(config, message).await);
        match outcome.reason() {
            None => tracing::info!(host = %config.host, "Email handed to SMTP server"),
            Some(reason) => {
                tracing::error!(host = %config.host, port = config.port, "Failed to send email: {}", reason)
            }
        }
        outcome
    }
}

/// TLS setup happens before any connection; it fails the same way every time
fn tls_setup_error(e: lettre::transport::smtp::Error) -> SmtpError {
    SmtpError::InvalidConfig(format!("TLS configuration failed: {}", e))
}
