//! Configuration system (layered: defaults > config file > env > flags).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::auth::client::{DeviceAuthParams, DEFAULT_SCOPE};
use crate::auth::error::AuthError;
use crate::util::retry::RetryPolicy;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3005/api/auth";
const CONFIG_FILE_NAME: &str = "config.toml";
const TOKEN_FILE_NAME: &str = "token.json";

/// Layered configuration for Orbit.
///
/// Resolution order, later layers winning:
/// 1. Built-in defaults
/// 2. `<home>/config.toml`
/// 3. Environment (`.env` is loaded first when present)
/// 4. Command-line overrides via [`OrbitConfig::with_overrides`]
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitConfig {
    pub server_url: String,
    pub client_id: Option<String>,
    pub scope: String,
    pub home_dir: PathBuf,
    pub poll_retries: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    client_id: Option<String>,
    scope: Option<String>,
    poll_retries: Option<u32>,
}

impl OrbitConfig {
    pub fn defaults(home_dir: PathBuf) -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            client_id: None,
            scope: DEFAULT_SCOPE.to_string(),
            home_dir,
            poll_retries: 0,
        }
    }

    /// `~/.orbit`, or `.orbit` when no home directory is known.
    pub fn default_home() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".orbit"))
            .unwrap_or_else(|| PathBuf::from(".orbit"))
    }

    /// Load from `.env`, the process environment and the config file.
    pub fn load() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`OrbitConfig::load`] with an explicit environment lookup.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let home_dir = non_empty(env("ORBIT_HOME"))
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_home);
        let mut config = Self::defaults(home_dir);
        let path = config.config_path();
        config.apply_file(&path)?;
        config.apply_env(env)?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), AuthError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(AuthError::Configuration(format!(
                    "cannot read {}: {err}",
                    path.display()
                )))
            }
        };
        let file: FileConfig = toml::from_str(&raw)
            .map_err(|e| AuthError::Configuration(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        if let Some(url) = non_empty(file.server_url) {
            self.server_url = url;
        }
        if let Some(id) = non_empty(file.client_id) {
            self.client_id = Some(id);
        }
        if let Some(scope) = non_empty(file.scope) {
            self.scope = scope;
        }
        if let Some(retries) = file.poll_retries {
            self.poll_retries = retries;
        }
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), AuthError> {
        if let Some(url) = non_empty(env("ORBIT_SERVER_URL")) {
            self.server_url = url;
        }
        if let Some(id) = non_empty(env("ORBIT_CLIENT_ID")).or_else(|| non_empty(env("GITHUB_CLIENT_ID"))) {
            self.client_id = Some(id);
        }
        if let Some(scope) = non_empty(env("ORBIT_SCOPE")) {
            self.scope = scope;
        }
        if let Some(raw) = non_empty(env("ORBIT_POLL_RETRIES")) {
            self.poll_retries = raw.trim().parse().map_err(|_| {
                AuthError::Configuration(format!("ORBIT_POLL_RETRIES must be a number, got '{raw}'"))
            })?;
        }
        Ok(())
    }

    /// Apply command-line flags; `None` keeps the current value.
    pub fn with_overrides(
        mut self,
        server_url: Option<String>,
        client_id: Option<String>,
        scope: Option<String>,
    ) -> Self {
        if let Some(url) = non_empty(server_url) {
            self.server_url = url;
        }
        if let Some(id) = non_empty(client_id) {
            self.client_id = Some(id);
        }
        if let Some(scope) = non_empty(scope) {
            self.scope = scope;
        }
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.home_dir.join(CONFIG_FILE_NAME)
    }

    pub fn credential_path(&self) -> PathBuf {
        self.home_dir.join(TOKEN_FILE_NAME)
    }

    pub fn require_client_id(&self) -> Result<&str, AuthError> {
        self.client_id.as_deref().ok_or_else(|| {
            AuthError::Configuration(
                "client id is not set; set ORBIT_CLIENT_ID (or GITHUB_CLIENT_ID) in your environment or .env file, or pass --client-id".to_string(),
            )
        })
    }

    pub fn device_auth_params(&self) -> Result<DeviceAuthParams, AuthError> {
        Ok(DeviceAuthParams::builder()
            .base_url(self.server_url.clone())
            .client_id(self.require_client_id()?)
            .scope(self.scope.clone())
            .build())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.poll_retries)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
