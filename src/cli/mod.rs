//! CLI entry point for claude-meter.

pub mod auth;
pub mod usage;

use clap::{Parser, Subcommand};

use crate::config::{MeterConfig, Settings};
use crate::error::{ErrorCategory, MeterError, Result};

/// Exit status for authentication failures.
pub const EXIT_AUTH: i32 = 2;
/// Exit status for failures worth retrying later (sysexits `EX_TEMPFAIL`).
pub const EXIT_TEMPFAIL: i32 = 75;

/// Claude subscription usage meter
#[derive(Parser, Debug)]
#[command(
    name = "claude-meter",
    version,
    about = "Track Claude subscription usage from the terminal"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
    /// Fetch usage once and print it
    Usage(UsageArgs),
    /// Poll usage until interrupted
    Watch,
    /// Change persisted settings
    Config(ConfigArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands for login, status, and logout.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in through the browser (PKCE)
    Login,
    /// Show authentication status
    Status,
    /// Forget stored credentials
    Logout,
}

/// Arguments for `claude-meter usage`.
#[derive(Parser, Debug)]
pub struct UsageArgs {
    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `config` subcommand group.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Set the poll interval in seconds (60-3600)
    Interval {
        secs: u64,
    },
}

/// Environment configuration with the saved settings applied on top.
pub fn load_config() -> Result<(MeterConfig, Settings)> {
    let mut config = MeterConfig::from_env()?;
    let settings = Settings::load_from_path(config.settings_path())?;
    config.apply_settings(&settings)?;
    Ok((config, settings))
}

/// Process exit status for a failed command.
pub fn exit_code(err: &MeterError) -> i32 {
    match err.category() {
        ErrorCategory::Authentication => EXIT_AUTH,
        _ if err.is_retryable() => EXIT_TEMPFAIL,
        _ => 1,
    }
}

/// Follow-up advice printed under the error message.
pub fn hint(err: &MeterError) -> Option<&'static str> {
    match err.category() {
        ErrorCategory::Authentication => Some("Run `claude-meter auth login` to sign in again."),
        _ if err.is_retryable() => Some("This looks temporary; try again in a moment."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::client::FetchError;
    use clap::Parser;

    #[test]
    fn auth_failures_exit_with_auth_status() {
        let err = MeterError::Auth(AuthError::RefreshRepeated);
        assert_eq!(exit_code(&err), EXIT_AUTH);
        assert!(hint(&err).unwrap().contains("auth login"));
    }

    #[test]
    fn transient_failures_exit_with_tempfail() {
        let err = MeterError::Fetch(FetchError::Transient {
            status: Some(503),
            message: "HTTP 503".to_string(),
        });
        assert_eq!(exit_code(&err), EXIT_TEMPFAIL);
        assert!(hint(&err).is_some());

        let err = MeterError::Auth(AuthError::Timeout(200));
        assert_eq!(exit_code(&err), EXIT_TEMPFAIL);
    }

    #[test]
    fn other_failures_exit_with_one() {
        let err = MeterError::InvalidArgument("interval out of range".to_string());
        assert_eq!(exit_code(&err), 1);
        assert!(hint(&err).is_none());
    }

    #[test]
    fn parse_auth_login() {
        let cli = Cli::try_parse_from(["claude-meter", "auth", "login"]).unwrap();
        match cli.command {
            Commands::Auth(auth) => assert!(matches!(auth.command, AuthCommands::Login)),
            other => panic!("expected Auth, got {other:?}"),
        }
        assert!(!cli.debug);
    }

    #[test]
    fn parse_auth_status() {
        let cli = Cli::try_parse_from(["claude-meter", "auth", "status"]).unwrap();
        match cli.command {
            Commands::Auth(auth) => assert!(matches!(auth.command, AuthCommands::Status)),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn parse_usage_json_flag() {
        let cli = Cli::try_parse_from(["claude-meter", "usage", "--json"]).unwrap();
        match cli.command {
            Commands::Usage(args) => assert!(args.json),
            other => panic!("expected Usage, got {other:?}"),
        }
    }

    #[test]
    fn debug_flag_is_global() {
        let cli = Cli::try_parse_from(["claude-meter", "watch", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Watch));
    }

    #[test]
    fn parse_config_interval() {
        let cli = Cli::try_parse_from(["claude-meter", "config", "interval", "600"]).unwrap();
        match cli.command {
            Commands::Config(config) => match config.command {
                ConfigCommands::Interval { secs } => assert_eq!(secs, 600),
            },
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn parse_config_interval_requires_number() {
        assert!(Cli::try_parse_from(["claude-meter", "config", "interval", "often"]).is_err());
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["claude-meter"]).is_err());
    }
}
