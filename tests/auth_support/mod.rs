#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbit::auth::{
    AuthError, DeviceSession, ProviderError, TokenEndpoint, TokenPollResponse, TokenResponse,
};

type Hook = Box<dyn Fn(usize) + Send + Sync>;

/// Token endpoint that replays a fixed script of answers.
///
/// Once the script runs out every call answers `authorization_pending`.
pub struct ScriptedEndpoint {
    responses: Mutex<VecDeque<Result<TokenPollResponse, AuthError>>>,
    calls: AtomicUsize,
    hook: Option<Hook>,
}

impl ScriptedEndpoint {
    pub fn new(responses: Vec<Result<TokenPollResponse, AuthError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            hook: None,
        }
    }

    /// Run `hook` with the 1-based call number on every request.
    pub fn with_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for ScriptedEndpoint {
    async fn request_token(&self, session: &DeviceSession) -> Result<TokenPollResponse, AuthError> {
        assert!(!session.device_code.is_empty(), "device code must be sent");
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.hook {
            hook(call);
        }
        self.responses
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| pending())
    }
}

pub fn rejected(code: &str) -> Result<TokenPollResponse, AuthError> {
    Ok(TokenPollResponse::Rejected(ProviderError {
        error: code.to_string(),
        error_description: None,
    }))
}

pub fn pending() -> Result<TokenPollResponse, AuthError> {
    rejected("authorization_pending")
}

pub fn slow_down() -> Result<TokenPollResponse, AuthError> {
    rejected("slow_down")
}

pub fn token_payload(access_token: &str, expires_in: Option<u64>) -> TokenResponse {
    TokenResponse {
        access_token: access_token.to_string(),
        refresh_token: None,
        token_type: None,
        scope: None,
        expires_in,
    }
}

pub fn granted(access_token: &str, expires_in: Option<u64>) -> Result<TokenPollResponse, AuthError> {
    Ok(TokenPollResponse::Granted(token_payload(access_token, expires_in)))
}

pub fn session(interval_secs: u64, expires_in_secs: u64, issued_at: DateTime<Utc>) -> DeviceSession {
    DeviceSession {
        device_code: "D1".to_string(),
        user_code: "ABCD-1234".to_string(),
        verification_uri: "http://localhost:3005/device".to_string(),
        verification_uri_complete: None,
        interval_secs,
        expires_in_secs,
        issued_at,
    }
}
