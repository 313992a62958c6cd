use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why the device-code request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationRequestFailure {
    /// HTTP 404: the server URL is probably wrong or the server is not running.
    EndpointNotFound,
    /// HTTP 400: the client identifier is probably misconfigured.
    BadRequest,
    /// Any other non-success status.
    Rejected,
}

impl AuthorizationRequestFailure {
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::EndpointNotFound,
            400 => Self::BadRequest,
            _ => Self::Rejected,
        }
    }

    pub fn diagnostic(&self) -> &'static str {
        match self {
            Self::EndpointNotFound => {
                "device authorization endpoint not found; make sure the auth server is running and the server URL is correct"
            }
            Self::BadRequest => "bad request; check the configured client id",
            Self::Rejected => "the authorization server rejected the device code request",
        }
    }
}

/// Errors produced by the device flow, the credential store and the session guard.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Device authorization failed (status {status}): {}{}", .failure.diagnostic(), describe(.code, .description))]
    AuthorizationRequest {
        failure: AuthorizationRequestFailure,
        status: u16,
        code: Option<String>,
        description: Option<String>,
    },

    #[error("Access was denied by the user")]
    PollingDenied,

    #[error("The device code has expired")]
    PollingExpired,

    #[error("Polling failed: {code}{}", describe(&None, .description))]
    PollingFatal {
        code: String,
        description: Option<String>,
    },

    #[error("Login cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Session expired{}", expired_suffix(.expires_at))]
    CredentialExpired { expires_at: Option<DateTime<Utc>> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn describe(code: &Option<String>, description: &Option<String>) -> String {
    match (code, description) {
        (Some(code), Some(desc)) => format!(" ({code}: {desc})"),
        (Some(code), None) => format!(" ({code})"),
        (None, Some(desc)) => format!(" ({desc})"),
        (None, None) => String::new(),
    }
}

fn expired_suffix(expires_at: &Option<DateTime<Utc>>) -> String {
    expires_at
        .map(|at| format!(" at {}", at.to_rfc3339()))
        .unwrap_or_default()
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
