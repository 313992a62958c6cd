//! Token polling state machine for the device authorization grant.
//!
//! All mutable polling state lives in [`PollState`], which is threaded through
//! every attempt. Time comes from an injected [`Clock`], so transitions can be
//! exercised without real timers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strum::Display;
use tokio_util::sync::CancellationToken;

use super::client::{TokenEndpoint, TokenPollResponse};
use super::clock::{Clock, SystemClock};
use super::device_code::DeviceSession;
use super::error::AuthError;
use super::token::TokenResponse;
use crate::util::retry::RetryPolicy;

/// Seconds added to the interval for every `slow_down` answer.
pub const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

/// Phase of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PollPhase {
    Pending,
    SlowDown,
    Succeeded,
    Denied,
    Expired,
    Fatal,
}

impl PollPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Denied | Self::Expired | Self::Fatal
        )
    }
}

/// What ended an `Expired` session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCause {
    /// The session deadline passed before the user approved.
    Deadline,
    /// The server answered `expired_token`.
    ServerReported,
}

/// Final result of [`TokenPoller::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded(TokenResponse),
    Denied,
    Expired(ExpiryCause),
    Fatal {
        code: String,
        description: Option<String>,
    },
    Cancelled,
}

impl PollOutcome {
    pub fn into_result(self) -> Result<TokenResponse, AuthError> {
        match self {
            Self::Succeeded(token) => Ok(token),
            Self::Denied => Err(AuthError::PollingDenied),
            Self::Expired(_) => Err(AuthError::PollingExpired),
            Self::Fatal { code, description } => Err(AuthError::PollingFatal { code, description }),
            Self::Cancelled => Err(AuthError::Cancelled),
        }
    }
}

/// Snapshot handed to the progress callback after each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProgress {
    pub attempt: u32,
    pub phase: PollPhase,
    pub interval_secs: u64,
}

pub type ProgressFn = Arc<dyn Fn(&PollProgress) + Send + Sync>;

/// Polling state carried between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    pub phase: PollPhase,
    /// Never decreases during a session.
    pub interval_secs: u64,
    pub deadline: DateTime<Utc>,
    pub attempts: u32,
    pub transport_failures: u32,
}

impl PollState {
    pub fn new(session: &DeviceSession) -> Self {
        Self {
            phase: PollPhase::Pending,
            interval_secs: session.interval_secs,
            deadline: session.expires_at(),
            attempts: 0,
            transport_failures: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Apply one server answer. Returns the outcome when it is terminal.
    pub fn apply(&mut self, response: TokenPollResponse) -> Option<PollOutcome> {
        match response {
            TokenPollResponse::Granted(token) => {
                self.phase = PollPhase::Succeeded;
                Some(PollOutcome::Succeeded(token))
            }
            TokenPollResponse::Rejected(error) => match error.error.as_str() {
                "authorization_pending" => {
                    self.phase = PollPhase::Pending;
                    None
                }
                "slow_down" => {
                    self.phase = PollPhase::SlowDown;
                    self.interval_secs = self.interval_secs.saturating_add(SLOW_DOWN_INCREMENT_SECS);
                    None
                }
                "access_denied" => {
                    self.phase = PollPhase::Denied;
                    Some(PollOutcome::Denied)
                }
                "expired_token" => {
                    self.phase = PollPhase::Expired;
                    Some(PollOutcome::Expired(ExpiryCause::ServerReported))
                }
                _ => {
                    self.phase = PollPhase::Fatal;
                    Some(PollOutcome::Fatal {
                        code: error.error,
                        description: error.error_description,
                    })
                }
            },
        }
    }

    pub fn expire(&mut self) -> PollOutcome {
        self.phase = PollPhase::Expired;
        PollOutcome::Expired(ExpiryCause::Deadline)
    }

    pub fn fail(&mut self, error: &AuthError) -> PollOutcome {
        self.phase = PollPhase::Fatal;
        let code = match error {
            AuthError::Network(_) => "network_error",
            AuthError::InvalidResponse(_) | AuthError::Serialization(_) => "invalid_response",
            _ => "unexpected_error",
        };
        PollOutcome::Fatal {
            code: code.to_string(),
            description: Some(error.to_string()),
        }
    }

    fn progress(&self) -> PollProgress {
        PollProgress {
            attempt: self.attempts,
            phase: self.phase,
            interval_secs: self.interval_secs,
        }
    }
}

/// Drives a [`DeviceSession`] to a terminal [`PollOutcome`].
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use orbit::auth::{DeviceAuthClient, DeviceAuthParams, TokenPoller};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), orbit::auth::AuthError> {
/// let client = Arc::new(DeviceAuthClient::new(
///     DeviceAuthParams::builder()
///         .base_url("http://localhost:3005/api/auth")
///         .client_id("my-client")
///         .build(),
/// ));
/// let session = client.start_device_code().await?;
/// let token = TokenPoller::new(client)
///     .poll(&session, &CancellationToken::new())
///     .await
///     .into_result()?;
/// println!("{}", token.access_token);
/// # Ok(())
/// # }
/// ```
pub struct TokenPoller {
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    progress: Option<ProgressFn>,
}

impl TokenPoller {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            endpoint,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::none(),
            progress: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Poll until a terminal state, the session deadline, or cancellation.
    ///
    /// Waits the current interval before every attempt, including the first.
    pub async fn poll(&self, session: &DeviceSession, cancel: &CancellationToken) -> PollOutcome {
        let mut state = PollState::new(session);
        let mut wait = state.interval();

        loop {
            if cancel.is_cancelled() {
                return self.cancelled(&state);
            }
            let now = self.clock.now();
            if state.is_past_deadline(now) {
                tracing::info!(attempts = state.attempts, "device code expired before authorization");
                return state.expire();
            }

            let wait_for = wait.min(state.remaining(now));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(&state),
                _ = self.clock.sleep(wait_for) => {}
            }
            if cancel.is_cancelled() {
                return self.cancelled(&state);
            }
            if state.is_past_deadline(self.clock.now()) {
                tracing::info!(attempts = state.attempts, "device code expired before authorization");
                return state.expire();
            }

            state.attempts += 1;
            let outcome = match self.endpoint.request_token(session).await {
                Ok(response) => {
                    state.transport_failures = 0;
                    state.apply(response)
                }
                Err(error) => {
                    state.transport_failures += 1;
                    if self.retry.allows_retry(state.transport_failures) {
                        tracing::warn!(
                            attempt = state.attempts,
                            failures = state.transport_failures,
                            error = %error,
                            "token poll failed; retrying"
                        );
                        None
                    } else {
                        Some(state.fail(&error))
                    }
                }
            };

            tracing::debug!(
                attempt = state.attempts,
                phase = %state.phase,
                interval_secs = state.interval_secs,
                "token poll attempt finished"
            );
            if let Some(progress) = &self.progress {
                progress(&state.progress());
            }

            if let Some(outcome) = outcome {
                return outcome;
            }

            wait = if state.transport_failures > 0 {
                self.retry
                    .backoff_for(state.transport_failures)
                    .max(state.interval())
            } else {
                state.interval()
            };
        }
    }

    fn cancelled(&self, state: &PollState) -> PollOutcome {
        tracing::info!(attempts = state.attempts, "device code polling cancelled");
        PollOutcome::Cancelled
    }
}
