//! Entry point for `authwire-adduser`: offline account creation.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use zeroize::Zeroizing;

use authwire::config::AppConfig;
use authwire::error::Result;
use authwire::store::{CredentialStore, RowStore};
use authwire::utils::security::{HashParams, Security};
use authwire::utils::terminal::EchoGuard;

/// Add a user to the credential file.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Name of the new account
    username: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Credential file
    #[arg(long)]
    passwd: Option<PathBuf>,
}

fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    let stdin = io::stdin();
    let _echo = EchoGuard::disable(libc::STDIN_FILENO)?;
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = Zeroizing::new(String::new());
    if stdin.lock().read_line(&mut line)? == 0 {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    println!();
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

fn add_user(config: &AppConfig, username: &str) -> Result<bool> {
    let store = CredentialStore::with_delimiter(
        &config.store.passwd_path,
        config.store.delimiter_byte(),
    );

    if username.contains(config.store.delimiter) {
        eprintln!(
            "Usernames cannot contain the delimiter '{}'.",
            config.store.delimiter
        );
        return Ok(false);
    }
    if store.find_user(username)?.is_some() {
        eprintln!("User '{username}' already exists.");
        return Ok(false);
    }

    let password = loop {
        let first = read_secret("Password: ")?;
        let second = read_secret("Repeat password: ")?;
        if first == second {
            break first;
        }
        eprintln!("Passwords do not match, try again.");
    };

    let security = Security::new(HashParams::from(&config.security));
    let salt = security.generate_salt();
    let hash = security.hash(&password, &salt)?;
    store.insert([username.to_string(), salt, hash])
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
    if let Some(path) = cli.passwd {
        config.store.passwd_path = path;
    }

    match add_user(&config, &cli.username) {
        Ok(true) => {
            println!("Added user '{}'.", cli.username);
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
