//! Entry point for `authwire-client`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use authwire::config::AppConfig;
use authwire::reactor::Termination;
use authwire::service::client;
use authwire::utils::logging;

/// Interactive client for the authenticated message server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server address (e.g. 127.0.0.1:9000)
    #[arg(short, long)]
    server: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match cli.config.as_ref().map(AppConfig::from_file).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    config.apply_env();
    if let Some(server) = cli.server {
        config.client.address = server;
    }

    let errors = config.client.validate();
    if !errors.is_empty() {
        eprintln!("{}", errors.join("\n"));
        return ExitCode::FAILURE;
    }
    // Keep stdout for the conversation
    config.logging.log_level = tracing::Level::WARN;
    let _app = match logging::init(&config.logging) {
        Ok(span) => span,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match client::run(&config.client) {
        Ok(Termination::Completed) => {
            println!("\nShutting down...");
            ExitCode::SUCCESS
        }
        Ok(Termination::Interrupted) => {
            println!("\nReceived signal requesting shutdown. Shutting down...");
            ExitCode::SUCCESS
        }
        Ok(Termination::Failed(e)) => {
            eprintln!("\nUnknown socket error: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
