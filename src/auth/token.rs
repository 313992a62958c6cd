use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lookahead, in seconds, applied by [`Credential::is_expired_at`] so a token
/// does not lapse in the middle of a request.
pub const EXPIRY_GRACE_SECS: i64 = 5 * 60;

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Raw token payload returned by the token endpoint on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Persisted credential, replaced wholesale on every successful login.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use orbit::auth::{Credential, TokenResponse};
///
/// let response = TokenResponse {
///     access_token: "T1".to_string(),
///     refresh_token: None,
///     token_type: None,
///     scope: None,
///     expires_in: Some(3600),
/// };
/// let credential = Credential::from_token_response(response, Utc::now());
/// assert_eq!(credential.token_type, "Bearer");
/// assert!(!credential.is_expired_at(credential.created_at));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// `at + secs`, or `None` when the result is not representable.
pub(crate) fn offset_by_secs(at: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    at.checked_add_signed(Duration::try_seconds(secs)?)
}

impl Credential {
    /// Build a credential from a token payload received at `issued_at`.
    ///
    /// The relative `expires_in` is converted to an absolute timestamp here
    /// and never recomputed. An `expires_in` too large to represent leaves
    /// `expires_at` unset, which reads as expired.
    pub fn from_token_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_at = response.expires_in.and_then(|secs| {
            let at = offset_by_secs(issued_at, secs);
            if at.is_none() {
                tracing::warn!(expires_in = secs, "token expiry out of range; treating as expired");
            }
            at
        });
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response
                .token_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(default_token_type),
            scope: response.scope,
            expires_at,
            created_at: issued_at,
        }
    }

    /// Unknown expiry counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at
                .checked_sub_signed(Duration::seconds(EXPIRY_GRACE_SECS))
                .map_or(true, |edge| now >= edge),
            None => true,
        }
    }

    /// Value for an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
