//! Orbit: OAuth 2.0 device authorization for command-line clients.
//!
//! Requests a device code, polls the token endpoint until the user approves
//! in a browser, stores the resulting credential and guards later commands
//! on its presence and freshness.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use orbit::auth::{AuthService, CredentialStoreConfig, DeviceAuthClient, FileCredentialStore};
//! use orbit::config::OrbitConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), orbit::auth::AuthError> {
//! let config = OrbitConfig::load()?;
//! let client = DeviceAuthClient::new(config.device_auth_params()?);
//! let store = FileCredentialStore::new(CredentialStoreConfig::new(config.credential_path()));
//! let svc = AuthService::new(Arc::new(client), Arc::new(store));
//!
//! let session = svc.start_login().await?;
//! println!("Visit {} and enter {}", session.display_uri(), session.user_code);
//! svc.complete_login(&session, &CancellationToken::new(), None).await?;
//!
//! let credential = svc.require_valid_credential()?;
//! # let _ = credential;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
