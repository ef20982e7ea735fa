//! Entry point for `authwire-server`.
//!
//! Loads configuration, applies command-line overrides, installs logging and
//! serves until stopped or signalled.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use authwire::config::AppConfig;
use authwire::reactor::Termination;
use authwire::service::server;
use authwire::utils::logging;

/// Authenticated message server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (e.g. 0.0.0.0:9000)
    #[arg(short, long)]
    bind: Option<String>,

    /// Append logs to this file
    #[arg(short, long)]
    log: Option<String>,

    /// Credential file
    #[arg(long)]
    passwd: Option<PathBuf>,

    /// Peer whitelist file
    #[arg(long)]
    whitelist: Option<PathBuf>,
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
    if let Some(bind) = cli.bind {
        config.server.address = bind;
    }
    if let Some(path) = cli.log {
        config.logging.log_to_file = true;
        config.logging.log_file_path = Some(path);
    }
    if let Some(path) = cli.passwd {
        config.store.passwd_path = path;
    }
    if let Some(path) = cli.whitelist {
        config.store.whitelist_path = Some(path);
    }

    if let Err(e) = config.validate_strict() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    let _app = match logging::init(&config.logging) {
        Ok(span) => span,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match server::serve(&config) {
        Ok(Termination::Completed) => {
            info!("Shutting down");
            ExitCode::SUCCESS
        }
        Ok(Termination::Interrupted) => {
            info!("Received signal requesting shutdown");
            ExitCode::SUCCESS
        }
        Ok(Termination::Failed(e)) => {
            error!(error = %e, "Readiness wait failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Failed to start server");
            ExitCode::FAILURE
        }
    }
}
