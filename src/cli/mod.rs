//! CLI entry point for Orbit.

pub mod auth;
pub mod errors;

use clap::{Parser, Subcommand};

/// Orbit CLI
#[derive(Parser, Debug)]
#[command(name = "orbit", version, about = "Orbit: device flow authentication CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Login with the device authorization flow
    Login(LoginArgs),
    /// Logout and clear stored credentials
    Logout(LogoutArgs),
    /// Show the currently authenticated user
    Whoami(ServerArgs),
    /// Show stored credential status
    Status,
}

/// Arguments shared by commands that talk to the auth server.
#[derive(Parser, Debug, Default)]
pub struct ServerArgs {
    /// Auth server base URL (e.g. http://localhost:3005/api/auth)
    #[arg(long)]
    pub server_url: Option<String>,
}

/// Arguments for `orbit login`.
#[derive(Parser, Debug, Default)]
pub struct LoginArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// OAuth client id
    #[arg(long)]
    pub client_id: Option<String>,

    /// Requested scope
    #[arg(long)]
    pub scope: Option<String>,

    /// Log in again without asking when already logged in
    #[arg(short, long)]
    pub force: bool,

    /// Do not offer to open the verification page in a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// Arguments for `orbit logout`.
#[derive(Parser, Debug, Default)]
pub struct LogoutArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
