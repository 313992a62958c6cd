//! Orbit CLI binary entry point.

use clap::Parser;
use orbit::cli::errors::{exit_code, format_error_help};
use orbit::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Login(args) => orbit::cli::auth::handle_login(args).await,
        Commands::Logout(args) => orbit::cli::auth::handle_logout(args).await,
        Commands::Whoami(args) => orbit::cli::auth::handle_whoami(args).await,
        Commands::Status => orbit::cli::auth::handle_status().await,
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("Error: {}", format_error_help(&e));
        std::process::exit(exit_code(&e));
    }
}

fn init_tracing() {
    let level = std::env::var("ORBIT_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
