use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::Credentials;
use crate::util::fs::atomic_write;

const CREDENTIALS_FILE: &str = "credentials.toml";
const CREDENTIALS_FILE_VERSION: u32 = 1;

/// Persistence collaborator for the monitored account's credentials.
///
/// Hosts that already own a config store (a settings database, a keychain)
/// implement this directly; [`FileTokenStore`] covers everything else.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>, AuthError>;
    fn save(&self, credentials: &Credentials) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// File-backed token store using a TOML file.
///
/// Saves replace the file atomically with owner-only permissions, so a crash
/// mid-write leaves the previous credentials readable.
///
/// # Example
/// ```no_run
/// use chrono::Utc;
/// use claude_meter::auth::{Credentials, FileTokenStore, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let creds = Credentials::issued("access", Some("refresh".to_string()), 3600, Utc::now());
/// store.save(&creds)?;
/// # Ok::<(), claude_meter::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn new_default() -> Self {
        Self::new(crate::config::default_data_dir())
    }

    pub fn path(&self) -> PathBuf {
        self.base_dir.join(CREDENTIALS_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Credentials>, AuthError> {
        let path = self.path();
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: CredentialsFile = toml::from_str(&raw)?;
        if file.version != CREDENTIALS_FILE_VERSION {
            return Err(AuthError::Serialization(format!(
                "unsupported credentials file version {} at {}",
                file.version,
                path.display()
            )));
        }
        Ok(Some(file.credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let file = CredentialsFile {
            version: CREDENTIALS_FILE_VERSION,
            saved_at: Utc::now(),
            credentials: credentials.clone(),
        };
        let serialized = toml::to_string(&file)?;
        atomic_write(&self.path(), serialized.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialsFile {
    version: u32,
    saved_at: DateTime<Utc>,
    credentials: Credentials,
}
