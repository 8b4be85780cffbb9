//! Jira OAuth CLI.
//!
//! Provides commands for:
//! - `cert generate`: Generate the RSA key pair and self-signed certificate
//! - `token authorize`: Run the three-legged handshake and store the token
//! - `request`: Send one signed request with a stored token

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CertCommand, RequestArgs, TokenCommand};
use output::Output;

/// Jira OAuth 1.0a (RSA-SHA1) tool.
#[derive(Parser)]
#[command(name = "jira-oauth", version, about)]
struct Cli {
    /// Enable verbose output (info-level logging).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Key material commands.
    #[command(subcommand)]
    Cert(CertCommand),
    /// Access token commands.
    #[command(subcommand)]
    Token(TokenCommand),
    /// Send a signed request to the Jira REST API.
    Request(RequestArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Cert(cmd) => cmd.execute(),
        Commands::Token(cmd) => cmd.execute(),
        Commands::Request(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
