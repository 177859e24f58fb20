use anyhow::Result;
use clap::Parser;
use email_dispatch::cli::{Cli, CliHandler, Commands};
use email_dispatch::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(cli.debug);

    let handler = CliHandler::new(cli.secrets_dir);
    handler
        .handle_command(cli.command.unwrap_or(Commands::Serve), &cli.listen)
        .await
}
