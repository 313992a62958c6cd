//! CLI auth command handlers for login, logout, whoami and status.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::auth::poller::{PollPhase, PollProgress, ProgressFn};
use crate::auth::{
    AuthError, AuthService, Credential, CredentialStoreConfig, DeviceAuthClient, DeviceAuthParams,
    DeviceSession, FileCredentialStore,
};
use crate::config::OrbitConfig;

use super::{LoginArgs, LogoutArgs, ServerArgs};

/// Handle `orbit login`.
pub async fn handle_login(args: LoginArgs) -> Result<(), AuthError> {
    let config = OrbitConfig::load()?.with_overrides(args.server.server_url, args.client_id, args.scope);
    let params = config.device_auth_params()?;
    let svc = build_service(&config, params);

    if !args.force && svc.has_valid_credential() {
        let again = confirm("You're already logged in. Do you want to log in again?", false);
        if !again {
            println!("Login cancelled");
            return Ok(());
        }
    }

    println!("Requesting device authorization...");
    let session = svc.start_login().await?;

    println!();
    println!("Visit: {}", session.display_uri());
    println!("Enter code: {}", session.user_code);
    println!();

    if !args.no_browser && confirm("Open browser automatically?", true) {
        open_verification_page(&session);
    }

    println!(
        "Waiting for authorization (expires in {} minutes)...",
        session.expires_in_secs / 60
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let progress: ProgressFn = Arc::new(|progress: &PollProgress| {
        if progress.phase.is_terminal() {
            return;
        }
        let note = if progress.phase == PollPhase::SlowDown {
            " (server asked to slow down)"
        } else {
            ""
        };
        eprint!(
            "\r  Polling: attempt {}, next check in {}s{note}   ",
            progress.attempt, progress.interval_secs
        );
        let _ = std::io::stderr().flush();
    });

    let result = svc.complete_login(&session, &cancel, Some(progress)).await;
    eprintln!();
    let outcome = result?;

    if let Err(e) = &outcome.persisted {
        println!("Warning: could not save authentication token: {e}");
        println!("You may need to login again on next use.");
    }

    let name = match svc.fetch_session(&outcome.credential).await {
        Ok(Some(user)) => user.display_name().to_string(),
        Ok(None) => "User".to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "session lookup after login failed");
            "User".to_string()
        }
    };
    println!("Login successful! Welcome {name}");
    if outcome.persisted.is_ok() {
        println!("Token saved to: {}", config.credential_path().display());
    }
    Ok(())
}

/// Handle `orbit logout`.
pub async fn handle_logout(args: LogoutArgs) -> Result<(), AuthError> {
    let config = OrbitConfig::load()?;
    let store = file_store(&config);

    if !store.path().exists() {
        println!("You're not logged in.");
        return Ok(());
    }
    if !args.yes && !confirm("Are you sure you want to logout?", false) {
        println!("Logout cancelled");
        return Ok(());
    }

    let svc = build_service(&config, session_params(&config));
    svc.logout()?;
    println!("Logged out");
    Ok(())
}

/// Handle `orbit whoami`.
pub async fn handle_whoami(args: ServerArgs) -> Result<(), AuthError> {
    let config = OrbitConfig::load()?.with_overrides(args.server_url, None, None);
    let svc = build_service(&config, session_params(&config));

    let identity = svc.whoami().await?;
    match identity.user {
        Ok(Some(user)) => {
            println!("User: {}", user.name.as_deref().unwrap_or("-"));
            println!("Email: {}", user.email.as_deref().unwrap_or("-"));
            println!("ID: {}", user.id.as_deref().unwrap_or("-"));
        }
        Ok(None) => {
            println!("The server did not return a session for this token.");
            print_credential(&identity.credential);
        }
        Err(e) => {
            println!("Could not reach the auth server: {e}");
            print_credential(&identity.credential);
        }
    }
    Ok(())
}

/// Handle `orbit status`.
pub async fn handle_status() -> Result<(), AuthError> {
    let config = OrbitConfig::load()?;
    let svc = build_service(&config, session_params(&config));

    println!("Authentication Status\n");
    match svc.current_credential() {
        Ok(Some(credential)) => {
            let status = if !credential.is_expired_at(Utc::now()) {
                match credential.expires_at {
                    Some(expires) => format!("Logged in (expires {})", expires.format("%Y-%m-%d %H:%M")),
                    None => "Logged in".to_string(),
                }
            } else {
                "Session expired (run `orbit login`)".to_string()
            };
            println!("  {status}");
        }
        Ok(None) => println!("  Not logged in"),
        Err(e) => println!("  Error: {e}"),
    }
    println!("\nCredential file: {}", config.credential_path().display());
    println!("Server: {}", config.server_url);
    Ok(())
}

fn file_store(config: &OrbitConfig) -> FileCredentialStore {
    FileCredentialStore::new(CredentialStoreConfig::new(config.credential_path()))
}

fn build_service(config: &OrbitConfig, params: DeviceAuthParams) -> AuthService {
    AuthService::new(
        Arc::new(DeviceAuthClient::new(params)),
        Arc::new(file_store(config)),
    )
    .with_retry_policy(config.retry_policy())
}

/// Params for commands that only need the server, not a client id.
fn session_params(config: &OrbitConfig) -> DeviceAuthParams {
    DeviceAuthParams::builder()
        .base_url(config.server_url.clone())
        .client_id(config.client_id.clone().unwrap_or_default())
        .scope(config.scope.clone())
        .build()
}

/// Best effort: the URI and code are already on screen.
fn open_verification_page(session: &DeviceSession) {
    let uri = session.display_uri();
    if let Err(e) = open::that(uri) {
        tracing::debug!(error = %e, uri = %uri, "failed to open browser");
        println!("Could not open a browser. Open the link above manually.");
    }
}

fn print_credential(credential: &Credential) {
    println!("Token type: {}", credential.token_type);
    if let Some(scope) = &credential.scope {
        println!("Scope: {scope}");
    }
    println!("Logged in at: {}", credential.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(expires) = credential.expires_at {
        let left = (expires - Utc::now()).num_minutes().max(0);
        println!("Expires: {} ({left} minutes left)", expires.format("%Y-%m-%d %H:%M"));
    }
}

/// Ask a yes/no question on stdin. Read failures count as the default.
fn confirm(prompt: &str, default: bool) -> bool {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{prompt} {hint} ");
    if std::io::stdout().flush().is_err() {
        return default;
    }
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return default;
    }
    parse_confirmation(&answer, default)
}

fn parse_confirmation(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}
