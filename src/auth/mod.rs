//! OAuth PKCE authorization, credential storage, and refresh coordination.

pub mod error;
pub mod flow;
pub mod manager;
pub mod pkce;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use flow::{AuthorizationFlow, AuthorizationSession};
pub use manager::CredentialManager;
pub use pkce::PkceChallenge;
pub use store::{FileTokenStore, TokenStore};
pub use token::Credentials;
