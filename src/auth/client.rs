//! HTTP client for the authorization server's device endpoints.

use async_trait::async_trait;
use bon::Builder;
use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::device_code::{DeviceCodeResponse, DeviceSession, ProviderError};
use super::error::{AuthError, AuthorizationRequestFailure};
use super::token::{Credential, TokenResponse};

pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const CLIENT_USER_AGENT: &str = concat!("orbit-cli/", env!("CARGO_PKG_VERSION"));

/// Inputs for starting a device authorization.
///
/// # Example
/// ```
/// use orbit::auth::DeviceAuthParams;
///
/// let params = DeviceAuthParams::builder()
///     .base_url("http://localhost:3005/api/auth")
///     .client_id("my-client")
///     .build();
/// assert_eq!(params.scope, "openid profile email");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct DeviceAuthParams {
    #[builder(into)]
    pub base_url: String,
    #[builder(into)]
    pub client_id: String,
    #[builder(into, default = DEFAULT_SCOPE.to_string())]
    pub scope: String,
}

/// One answer from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPollResponse {
    Granted(TokenResponse),
    Rejected(ProviderError),
}

/// Seam between the poller and the token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// One poll attempt. Transport failures are returned as `Err`.
    async fn request_token(&self, session: &DeviceSession) -> Result<TokenPollResponse, AuthError>;
}

/// User profile returned by `GET /get-session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl SessionUser {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

/// Device authorization client (initiator and token endpoint).
pub struct DeviceAuthClient {
    client: reqwest::Client,
    params: DeviceAuthParams,
}

impl DeviceAuthClient {
    pub fn new(params: DeviceAuthParams) -> Self {
        Self {
            client: reqwest::Client::new(),
            params,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.params.base_url.trim_end_matches('/'), path)
    }

    /// Request a device code / user code pair.
    pub async fn start_device_code(&self) -> Result<DeviceSession, AuthError> {
        let url = self.endpoint("device/code");
        tracing::debug!(url = %url, client_id = %self.params.client_id, "requesting device code");
        let resp = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&DeviceCodeRequest {
                client_id: &self.params.client_id,
                scope: &self.params.scope,
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let provider = serde_json::from_str::<ProviderError>(&body).ok();
            tracing::warn!(status = status.as_u16(), body = %body, "device code request rejected");
            return Err(AuthError::AuthorizationRequest {
                failure: AuthorizationRequestFailure::from_status(status.as_u16()),
                status: status.as_u16(),
                code: provider.as_ref().map(|p| p.error.clone()),
                description: provider.and_then(|p| p.error_description),
            });
        }
        let payload: DeviceCodeResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("device code response: {e}")))?;
        Ok(payload.into_session(Utc::now()))
    }

    /// Look up the user behind a credential.
    ///
    /// Returns `Ok(None)` when the server answers without a session.
    pub async fn fetch_session(&self, credential: &Credential) -> Result<Option<SessionUser>, AuthError> {
        let resp = self
            .client
            .get(self.endpoint("get-session"))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(AUTHORIZATION, credential.authorization_header())
            .send()
            .await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::CredentialExpired {
                expires_at: credential.expires_at,
            });
        }
        if !status.is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "session lookup failed with status {status}"
            )));
        }
        let body: Option<SessionResponse> = resp.json().await?;
        Ok(body.and_then(|b| b.user))
    }
}

#[async_trait]
impl TokenEndpoint for DeviceAuthClient {
    async fn request_token(&self, session: &DeviceSession) -> Result<TokenPollResponse, AuthError> {
        let resp = self
            .client
            .post(self.endpoint("device/token"))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&TokenRequest {
                grant_type: DEVICE_CODE_GRANT_TYPE,
                device_code: &session.device_code,
                client_id: &self.params.client_id,
            })
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        parse_token_poll(status, &body)
    }
}

/// Token endpoints report pending/slow_down with 4xx statuses, so the body
/// decides, not the status.
pub(crate) fn parse_token_poll(status: u16, body: &str) -> Result<TokenPollResponse, AuthError> {
    let value: Value = serde_json::from_str(body).map_err(|_| {
        AuthError::InvalidResponse(format!(
            "token endpoint returned status {status} with a non-JSON body"
        ))
    })?;
    if value.get("access_token").and_then(Value::as_str).is_some() {
        let token: TokenResponse = serde_json::from_value(value)?;
        return Ok(TokenPollResponse::Granted(token));
    }
    if value.get("error").and_then(Value::as_str).is_some() {
        let error: ProviderError = serde_json::from_value(value)?;
        return Ok(TokenPollResponse::Rejected(error));
    }
    Err(AuthError::InvalidResponse(format!(
        "token response (status {status}) missing token and error"
    )))
}

#[derive(Serialize)]
struct DeviceCodeRequest<'a> {
    client_id: &'a str,
    scope: &'a str,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    device_code: &'a str,
    client_id: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(default)]
    user: Option<SessionUser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_token_poll_reads_pending_error_from_bad_request() {
        let parsed = parse_token_poll(400, r#"{"error":"authorization_pending"}"#).unwrap();
        assert_eq!(
            parsed,
            TokenPollResponse::Rejected(ProviderError {
                error: "authorization_pending".into(),
                error_description: None,
            })
        );
    }

    #[test]
    fn parse_token_poll_reads_granted_token() {
        let parsed =
            parse_token_poll(200, r#"{"access_token":"T1","expires_in":3600}"#).unwrap();
        match parsed {
            TokenPollResponse::Granted(token) => {
                assert_eq!(token.access_token, "T1");
                assert_eq!(token.expires_in, Some(3600));
            }
            other => panic!("expected Granted, got {other:?}"),
        }
    }

    #[test]
    fn parse_token_poll_rejects_non_json() {
        let err = parse_token_poll(502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(msg) if msg.contains("502")));
    }

    #[test]
    fn parse_token_poll_rejects_empty_object() {
        assert!(matches!(
            parse_token_poll(200, "{}"),
            Err(AuthError::InvalidResponse(_))
        ));
    }

    #[test]
    fn session_user_display_name_prefers_name_then_email() {
        let user = SessionUser {
            id: None,
            name: None,
            email: Some("a@b.c".into()),
        };
        assert_eq!(user.display_name(), "a@b.c");
        assert_eq!(SessionUser::default().display_name(), "User");
    }
}
