use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::token::offset_by_secs;

/// Interval used when the server omits `interval`.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Device-code session issued by the authorization server.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use orbit::auth::DeviceSession;
///
/// let session = DeviceSession {
///     device_code: "D1".to_string(),
///     user_code: "ABCD-1234".to_string(),
///     verification_uri: "http://localhost:3005/device".to_string(),
///     verification_uri_complete: None,
///     interval_secs: 5,
///     expires_in_secs: 600,
///     issued_at: Utc::now(),
/// };
/// assert_eq!(session.display_uri(), "http://localhost:3005/device");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub interval_secs: u64,
    pub expires_in_secs: u64,
    pub issued_at: DateTime<Utc>,
}

impl DeviceSession {
    /// Saturates at the latest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        offset_by_secs(self.issued_at, self.expires_in_secs).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// URI to show the user; prefers the variant with the code embedded.
    pub fn display_uri(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(&self.verification_uri)
    }
}

/// Successful body of `POST /device/code`.
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(default)]
    pub interval: Option<u64>,
    pub expires_in: u64,
}

impl DeviceCodeResponse {
    pub(crate) fn into_session(self, issued_at: DateTime<Utc>) -> DeviceSession {
        DeviceSession {
            device_code: self.device_code,
            user_code: self.user_code,
            verification_uri: self.verification_uri,
            verification_uri_complete: self.verification_uri_complete,
            interval_secs: self
                .interval
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            expires_in_secs: self.expires_in,
            issued_at,
        }
    }
}

/// OAuth error object (`{error, error_description}`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
