use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::config::{ConfigResolver, DEFAULT_SECRETS_DIR};
use crate::handler::{FunctionRequest, RequestHandler};
use crate::kube::InClusterStore;
use crate::server::FunctionServer;
use crate::smtp::SmtpClient;
use crate::status::StatusReporter;

/// email-dispatch - send Email resources and report the outcome on their status
#[derive(Parser)]
#[command(name = "email-dispatch")]
#[command(about = "Sends Email custom resources over SMTP and records the result on their status")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory holding one file per SMTP setting (smtp-host, smtp-port, ...)
    #[arg(long, global = true, env = "SECRETS_DIR", default_value = DEFAULT_SECRETS_DIR)]
    pub secrets_dir: PathBuf,

    /// Address the HTTP server listens on
    #[arg(long, global = true, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:8080")]
    pub listen: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve invocations over HTTP (default)
    Serve,

    /// Handle a single invocation read from stdin and print the response body
    Invoke(InvokeArgs),
}

#[derive(Args)]
pub struct InvokeArgs {
    /// HTTP method of the invocation
    #[arg(long, env = "Http_Method", default_value = "POST")]
    pub method: String,

    /// Read the body from this file instead of stdin
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Command-line interface handler
pub struct CliHandler {
    handler: Arc<RequestHandler>,
}

impl CliHandler {
    /// Wire the production collaborators: lettre SMTP and the in-cluster status store
    pub fn new(secrets_dir: PathBuf) -> Self {
        let handler = RequestHandler::new(
            ConfigResolver::new(secrets_dir),
            Arc::new(SmtpClient::new()),
            StatusReporter::new(Arc::new(InClusterStore::new())),
        );

        Self {
            handler: Arc::new(handler),
        }
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands, listen: &str) -> Result<ExitCode> {
        match command {
            Commands::Serve => self.handle_serve(listen).await,
            Commands::Invoke(args) => self.handle_invoke(args).await,
        }
    }

    async fn handle_serve(&self, listen: &str) -> Result<ExitCode> {
        let server = FunctionServer::new(listen, self.handler.clone()).await?;
        server.serve(shutdown_signal()).await?;
        Ok(ExitCode::SUCCESS)
    }

    async fn handle_invoke(&self, args: InvokeArgs) -> Result<ExitCode> {
        let body = match &args.file {
            Some(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => {
                let mut buf = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut buf)
                    .await
                    .context("Failed to read request body from stdin")?;
                buf
            }
        };

        let response = self
            .handler
            .handle(&FunctionRequest::new(args.method, body))
            .await;
        println!("{}", response.body_string());

        if response.is_success() {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
