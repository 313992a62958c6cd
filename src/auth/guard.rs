//! Gate for actions that need a fresh stored credential.

use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::error::AuthError;
use super::store::CredentialStore;
use super::token::Credential;

/// Validates presence and freshness of the stored credential.
///
/// Never refreshes: an expired credential means a new device login.
pub struct SessionGuard {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl SessionGuard {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn require_valid_credential(&self) -> Result<Credential, AuthError> {
        let credential = match self.store.read() {
            Ok(Some(credential)) => credential,
            Ok(None) => return Err(AuthError::Unauthenticated),
            Err(err) => {
                tracing::warn!(error = %err, "stored credential unreadable; treating as logged out");
                return Err(AuthError::Unauthenticated);
            }
        };
        if credential.is_expired_at(self.clock.now()) {
            return Err(AuthError::CredentialExpired {
                expires_at: credential.expires_at,
            });
        }
        Ok(credential)
    }
}
