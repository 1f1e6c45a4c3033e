//! claude-meter: Claude subscription usage poller.
//!
//! Authenticates a single account through the OAuth 2.0 authorization-code
//! flow with PKCE, keeps the resulting credentials fresh, and polls the usage
//! endpoint on a fixed interval. Hosts subscribe to the published
//! [`coordinator::CoordinatorState`] and render it however they like.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use claude_meter::auth::{CredentialManager, FileTokenStore};
//! use claude_meter::client::OAuthClient;
//! use claude_meter::config::MeterConfig;
//! use claude_meter::coordinator::UsageCoordinator;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> claude_meter::error::Result<()> {
//! let config = MeterConfig::from_env()?;
//! let api = Arc::new(OAuthClient::from_config(&config));
//! let store = Arc::new(FileTokenStore::new(config.data_dir.clone()));
//! let credentials = Arc::new(CredentialManager::load(api.clone(), store)?);
//!
//! let coordinator = Arc::new(UsageCoordinator::new(api, credentials, config.poll_interval));
//! let mut states = coordinator.subscribe();
//! let shutdown = CancellationToken::new();
//! let handle = coordinator.spawn(shutdown.clone());
//!
//! states.changed().await.ok();
//! println!("{:?}", *states.borrow());
//! shutdown.cancel();
//! handle.await.ok();
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod usage;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
