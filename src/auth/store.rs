use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use super::error::AuthError;
use super::token::Credential;

const TOKEN_FILE_NAME: &str = "token.json";

/// Storage abstraction for the persisted credential.
pub trait CredentialStore: Send + Sync {
    fn read(&self) -> Result<Option<Credential>, AuthError>;

    /// Replace the stored credential as a whole.
    fn write(&self, credential: &Credential) -> Result<(), AuthError>;

    /// Remove the stored credential. Returns whether anything was removed.
    fn clear(&self) -> Result<bool, AuthError>;

    fn is_expired(&self, credential: &Credential) -> bool {
        credential.is_expired_at(Utc::now())
    }
}

/// Configuration for file-backed credential storage.
#[derive(Debug, Clone)]
pub struct CredentialStoreConfig {
    pub path: PathBuf,
}

impl CredentialStoreConfig {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<dir>/token.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(TOKEN_FILE_NAME))
    }
}

/// JSON file credential store.
///
/// # Example
/// ```no_run
/// use chrono::Utc;
/// use orbit::auth::{Credential, CredentialStore, CredentialStoreConfig, FileCredentialStore};
///
/// let store = FileCredentialStore::new(CredentialStoreConfig::in_dir("/tmp/orbit"));
/// let credential = Credential {
///     access_token: "access".to_string(),
///     refresh_token: None,
///     token_type: "Bearer".to_string(),
///     scope: None,
///     expires_at: None,
///     created_at: Utc::now(),
/// };
/// store.write(&credential)?;
/// # Ok::<(), orbit::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(config: CredentialStoreConfig) -> Self {
        Self { path: config.path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| TOKEN_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn read(&self) -> Result<Option<Credential>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Storage(err.to_string())),
        };
        let credential = serde_json::from_str(&raw).map_err(|e| {
            AuthError::Storage(format!("{} is not a valid credential: {e}", self.path.display()))
        })?;
        Ok(Some(credential))
    }

    fn write(&self, credential: &Credential) -> Result<(), AuthError> {
        Self::ensure_parent(&self.path)?;
        let serialized = serde_json::to_string_pretty(credential)?;
        let tmp = self.temp_path();
        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<bool, AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(AuthError::Storage(err.to_string())),
        }
    }
}

/// Process-local store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn read(&self) -> Result<Option<Credential>, AuthError> {
        let guard = self
            .credential
            .lock()
            .map_err(|_| AuthError::Storage("credential lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn write(&self, credential: &Credential) -> Result<(), AuthError> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| AuthError::Storage("credential lock poisoned".into()))?;
        *guard = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<bool, AuthError> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| AuthError::Storage("credential lock poisoned".into()))?;
        Ok(guard.take().is_some())
    }
}
