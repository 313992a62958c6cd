//! CLI-specific error formatting for user-facing messages.

use crate::auth::AuthError;

/// Exit status used when the user aborts a login.
pub const EXIT_CANCELLED: i32 = 130;

/// Map an [`AuthError`] to a user-facing help string with actionable guidance.
pub fn format_error_help(err: &AuthError) -> String {
    match err {
        AuthError::Configuration(msg) => {
            format!("Configuration error: {msg}. Fix your environment or .env, then run: orbit login")
        }
        AuthError::AuthorizationRequest { .. } => {
            format!("{err}. Fix the server URL or client id, then run: orbit login")
        }
        AuthError::PollingDenied => {
            "Access was denied in the browser. Run `orbit login` to start over with a new code.".to_string()
        }
        AuthError::PollingExpired => {
            "The device code expired before it was approved. Run `orbit login` to get a new code.".to_string()
        }
        AuthError::PollingFatal { code, .. } if code == "network_error" => {
            format!("{err}. This looks like a transient network failure; wait a moment and run `orbit login` again.")
        }
        AuthError::PollingFatal { .. } => {
            format!("{err}. Run `orbit login` to retry with a new code.")
        }
        AuthError::Network(_) => {
            format!("{err}. Check that the auth server is reachable and try again.")
        }
        AuthError::Cancelled => "Login cancelled.".to_string(),
        AuthError::Unauthenticated => "Not authenticated. Please run `orbit login` first.".to_string(),
        AuthError::CredentialExpired { .. } => {
            "Your session has expired. Please login again: orbit login".to_string()
        }
        other => format!("{other}"),
    }
}

/// Process exit status for a failed command.
pub fn exit_code(err: &AuthError) -> i32 {
    match err {
        AuthError::Cancelled => EXIT_CANCELLED,
        _ => 1,
    }
}
