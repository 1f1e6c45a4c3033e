//! Configuration system (layered: defaults < `.env` < environment < code).

pub mod settings;

pub use settings::Settings;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::{AUTHORIZE_URL, PROFILE_URL, TOKEN_URL, USAGE_URL};
use crate::error::MeterError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const MIN_POLL_INTERVAL_SECS: u64 = 60;
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Time between two scheduled polls, always within 60..=3600 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollInterval(Duration);

impl PollInterval {
    pub fn from_secs(secs: u64) -> Result<Self, MeterError> {
        if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&secs) {
            return Err(MeterError::InvalidArgument(format!(
                "poll interval must be between {MIN_POLL_INTERVAL_SECS} and \
                 {MAX_POLL_INTERVAL_SECS} seconds, got {secs}"
            )));
        }
        Ok(Self(Duration::from_secs(secs)))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS))
    }
}

impl fmt::Display for PollInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Runtime configuration for the client and coordinator.
#[derive(Debug, Clone)]
pub struct MeterConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub usage_url: String,
    pub profile_url: String,
    pub request_timeout: Duration,
    pub poll_interval: PollInterval,
    /// Directory holding `credentials.toml` and `settings.json`.
    pub data_dir: PathBuf,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            usage_url: USAGE_URL.to_string(),
            profile_url: PROFILE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: PollInterval::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl MeterConfig {
    /// Load from environment variables, reading `.env` first if present.
    ///
    /// Recognized: `CLAUDE_METER_HOME`, `CLAUDE_METER_POLL_INTERVAL`,
    /// `CLAUDE_METER_TIMEOUT` (seconds), `CLAUDE_METER_TOKEN_URL`,
    /// `CLAUDE_METER_USAGE_URL`, `CLAUDE_METER_PROFILE_URL`.
    pub fn from_env() -> Result<Self, MeterError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MeterError> {
        let mut config = Self::default();

        if let Some(home) = lookup("CLAUDE_METER_HOME") {
            config.data_dir = PathBuf::from(home);
        }
        if let Some(raw) = lookup("CLAUDE_METER_POLL_INTERVAL") {
            config.poll_interval = PollInterval::from_secs(parse_secs("CLAUDE_METER_POLL_INTERVAL", &raw)?)?;
        }
        if let Some(raw) = lookup("CLAUDE_METER_TIMEOUT") {
            let secs = parse_secs("CLAUDE_METER_TIMEOUT", &raw)?;
            if secs == 0 {
                return Err(MeterError::Configuration(
                    "CLAUDE_METER_TIMEOUT must be at least 1 second".to_string(),
                ));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        let url_overrides: [(&str, &mut String); 3] = [
            ("CLAUDE_METER_TOKEN_URL", &mut config.token_url),
            ("CLAUDE_METER_USAGE_URL", &mut config.usage_url),
            ("CLAUDE_METER_PROFILE_URL", &mut config.profile_url),
        ];
        for (env_var, slot) in url_overrides {
            if let Some(url) = lookup(env_var) {
                *slot = url;
            }
        }

        Ok(config)
    }

    /// Overlay values the user saved through the settings file.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<(), MeterError> {
        if let Some(secs) = settings.poll_interval_secs {
            self.poll_interval = PollInterval::from_secs(secs)?;
        }
        Ok(())
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(settings::SETTINGS_FILE)
    }
}

/// Default data directory (`~/.claude-meter`).
pub fn default_data_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".claude-meter"))
        .unwrap_or_else(|| PathBuf::from(".claude-meter"))
}

fn parse_secs(name: &str, raw: &str) -> Result<u64, MeterError> {
    raw.trim().parse::<u64>().map_err(|_| {
        MeterError::Configuration(format!("{name} must be a whole number of seconds, got {raw:?}"))
    })
}
