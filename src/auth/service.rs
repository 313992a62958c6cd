use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::client::{DeviceAuthClient, SessionUser};
use super::clock::{Clock, SystemClock};
use super::device_code::DeviceSession;
use super::error::AuthError;
use super::guard::SessionGuard;
use super::poller::{ProgressFn, TokenPoller};
use super::store::CredentialStore;
use super::token::Credential;
use crate::util::retry::RetryPolicy;

/// Result of a completed device login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub credential: Credential,
    /// Persistence failure does not undo the login; the caller decides
    /// whether to warn or abort.
    pub persisted: Result<(), AuthError>,
}

/// Stored credential plus the server's view of it.
#[derive(Debug)]
pub struct Identity {
    pub credential: Credential,
    /// Lookup failures other than a rejected token are kept here so the
    /// caller can still show the local credential.
    pub user: Result<Option<SessionUser>, AuthError>,
}

/// Pure service facade for the login, logout and protected-action flows.
///
/// All I/O decisions (printing, prompting, exit codes) belong to the caller.
/// `AuthService` only returns typed results and errors.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use orbit::auth::{
///     AuthService, CredentialStoreConfig, DeviceAuthClient, DeviceAuthParams, FileCredentialStore,
/// };
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), orbit::auth::AuthError> {
/// let client = DeviceAuthClient::new(
///     DeviceAuthParams::builder()
///         .base_url("http://localhost:3005/api/auth")
///         .client_id("my-client")
///         .build(),
/// );
/// let store = FileCredentialStore::new(CredentialStoreConfig::in_dir("/tmp/orbit"));
/// let svc = AuthService::new(Arc::new(client), Arc::new(store));
/// let session = svc.start_login().await?;
/// let outcome = svc.complete_login(&session, &CancellationToken::new(), None).await?;
/// println!("{}", outcome.credential.access_token);
/// # Ok(())
/// # }
/// ```
pub struct AuthService {
    client: Arc<DeviceAuthClient>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl AuthService {
    pub fn new(client: Arc<DeviceAuthClient>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            store,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::none(),
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

    /// Request a device code; nothing is persisted.
    pub async fn start_login(&self) -> Result<DeviceSession, AuthError> {
        self.client.start_device_code().await
    }

    /// Poll `session` to completion and persist the resulting credential.
    ///
    /// Nothing is written unless polling succeeds.
    pub async fn complete_login(
        &self,
        session: &DeviceSession,
        cancel: &CancellationToken,
        progress: Option<ProgressFn>,
    ) -> Result<LoginOutcome, AuthError> {
        let mut poller = TokenPoller::new(self.client.clone())
            .with_clock(self.clock.clone())
            .with_retry_policy(self.retry.clone());
        if let Some(progress) = progress {
            poller = poller.with_progress(progress);
        }
        let token = poller.poll(session, cancel).await.into_result()?;
        let credential = Credential::from_token_response(token, self.clock.now());
        let persisted = self.store.write(&credential);
        if let Err(err) = &persisted {
            tracing::warn!(error = %err, "failed to persist credential");
        }
        Ok(LoginOutcome {
            credential,
            persisted,
        })
    }

    pub fn current_credential(&self) -> Result<Option<Credential>, AuthError> {
        self.store.read()
    }

    /// Whether a stored credential exists and is outside its grace window.
    pub fn has_valid_credential(&self) -> bool {
        self.guard().require_valid_credential().is_ok()
    }

    /// Remove the stored credential. Returns whether one was present.
    pub fn logout(&self) -> Result<bool, AuthError> {
        self.store.clear()
    }

    pub fn guard(&self) -> SessionGuard {
        SessionGuard::new(self.store.clone()).with_clock(self.clock.clone())
    }

    pub fn require_valid_credential(&self) -> Result<Credential, AuthError> {
        self.guard().require_valid_credential()
    }

    /// Protected action: resolve the user behind the stored credential.
    ///
    /// Fails when the guard rejects the credential or the server answers 401.
    pub async fn whoami(&self) -> Result<Identity, AuthError> {
        let credential = self.require_valid_credential()?;
        let user = match self.client.fetch_session(&credential).await {
            Err(AuthError::CredentialExpired { expires_at }) => {
                return Err(AuthError::CredentialExpired { expires_at })
            }
            Err(err) => {
                tracing::warn!(error = %err, "session lookup failed");
                Err(err)
            }
            Ok(user) => Ok(user),
        };
        Ok(Identity { credential, user })
    }

    pub async fn fetch_session(&self, credential: &Credential) -> Result<Option<SessionUser>, AuthError> {
        self.client.fetch_session(credential).await
    }
}
