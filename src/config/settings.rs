//! User-chosen settings persisted next to the credentials.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::PollInterval;
use crate::error::MeterError;
use crate::util::fs::atomic_write;

pub const SETTINGS_FILE: &str = "settings.json";
const SETTINGS_FILE_VERSION: u32 = 1;

/// Settings the user changes through the host (`config interval`, login).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub poll_interval_secs: Option<u64>,
    /// Cached account label from the profile endpoint.
    pub account_title: Option<String>,
}

impl Settings {
    /// Load settings from a path.
    ///
    /// Returns defaults if the file does not exist.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, MeterError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(MeterError::Io(err)),
        };

        let file: SettingsFile = serde_json::from_str(&raw)?;
        if file.version != SETTINGS_FILE_VERSION {
            return Err(MeterError::Configuration(format!(
                "Unsupported settings file version {} at {}",
                file.version,
                path.display()
            )));
        }
        if let Some(secs) = file.poll_interval_secs {
            PollInterval::from_secs(secs)?;
        }

        Ok(Self {
            poll_interval_secs: file.poll_interval_secs,
            account_title: file.account_title,
        })
    }

    /// Save settings to a path, replacing the file atomically.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), MeterError> {
        let file = SettingsFile {
            version: SETTINGS_FILE_VERSION,
            poll_interval_secs: self.poll_interval_secs,
            account_title: self.account_title.clone(),
        };
        let serialized = serde_json::to_vec_pretty(&file)?;
        atomic_write(path.as_ref(), &serialized)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Result<PollInterval, MeterError> {
        self.poll_interval_secs
            .map_or_else(|| Ok(PollInterval::default()), PollInterval::from_secs)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    version: u32,
    #[serde(default)]
    poll_interval_secs: Option<u64>,
    #[serde(default)]
    account_title: Option<String>,
}

