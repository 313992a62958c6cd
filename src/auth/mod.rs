//! OAuth device authorization grant: initiation, polling, credential storage
//! and the session guard.

pub mod client;
pub mod clock;
pub mod device_code;
pub mod error;
pub mod guard;
pub mod poller;
pub mod service;
pub mod store;
pub mod token;

pub use client::{DeviceAuthClient, DeviceAuthParams, SessionUser, TokenEndpoint, TokenPollResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use device_code::{DeviceSession, ProviderError};
pub use error::{AuthError, AuthorizationRequestFailure};
pub use guard::SessionGuard;
pub use poller::{ExpiryCause, PollOutcome, PollPhase, PollProgress, PollState, TokenPoller};
pub use service::{AuthService, Identity, LoginOutcome};
pub use store::{CredentialStore, CredentialStoreConfig, FileCredentialStore, InMemoryCredentialStore};
pub use token::{Credential, TokenResponse};
