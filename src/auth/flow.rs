use std::sync::Arc;

use reqwest::Url;

use super::error::AuthError;
use super::pkce::{random_url_safe, PkceChallenge};
use super::token::Credentials;
use crate::client::{OAuthApi, AUTHORIZE_URL, CLIENT_ID, REDIRECT_URI, SCOPES};

const STATE_BYTES: usize = 32;

/// One pending authorization attempt.
///
/// The user opens `authorize_url`, approves access, and pastes back what the
/// callback page shows. The session owns the PKCE verifier and is consumed by
/// [`AuthorizationFlow::complete`], whether the exchange succeeds or not.
#[derive(Debug)]
pub struct AuthorizationSession {
    pub authorize_url: String,
    pub state: String,
    pkce: PkceChallenge,
}

impl AuthorizationSession {
    pub fn code_challenge(&self) -> &str {
        self.pkce.challenge()
    }
}

/// Builds authorize URLs and completes the code exchange.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use claude_meter::auth::AuthorizationFlow;
/// use claude_meter::client::OAuthClient;
///
/// # async fn example() -> Result<(), claude_meter::auth::AuthError> {
/// let flow = AuthorizationFlow::new(Arc::new(OAuthClient::new()));
/// let session = flow.start()?;
/// println!("Visit {}", session.authorize_url);
/// let credentials = flow.complete(session, "pasted-code#pasted-state").await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthorizationFlow {
    api: Arc<dyn OAuthApi>,
    authorize_url: String,
    redirect_uri: String,
}

impl AuthorizationFlow {
    pub fn new(api: Arc<dyn OAuthApi>) -> Self {
        Self {
            api,
            authorize_url: AUTHORIZE_URL.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
        }
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    /// Begin an attempt with a fresh verifier and CSRF `state`.
    pub fn start(&self) -> Result<AuthorizationSession, AuthError> {
        let pkce = PkceChallenge::generate();
        let state = random_url_safe(STATE_BYTES);

        let url = Url::parse_with_params(
            &self.authorize_url,
            &[
                ("code", "true"),
                ("client_id", CLIENT_ID),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("code_challenge", pkce.challenge()),
                ("code_challenge_method", pkce.method()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|err| AuthError::InvalidUrl(err.to_string()))?;

        Ok(AuthorizationSession {
            authorize_url: url.into(),
            state,
            pkce,
        })
    }

    /// Exchange what the user pasted for credentials.
    ///
    /// Accepts `code#state`, a bare `code`, or the full callback URL. A
    /// returned state that differs from the session's is rejected before any
    /// network call.
    pub async fn complete(
        &self,
        session: AuthorizationSession,
        pasted: &str,
    ) -> Result<Credentials, AuthError> {
        let (code, state) = parse_auth_response(pasted);
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }
        if let Some(returned) = state.as_deref() {
            if returned != session.state {
                tracing::error!("OAuth state mismatch; refusing code exchange");
                return Err(AuthError::StateMismatch {
                    expected: session.state,
                    returned: returned.to_string(),
                });
            }
        }

        self.api
            .exchange_code(
                &code,
                session.pkce.verifier(),
                &self.redirect_uri,
                Some(session.state.as_str()),
            )
            .await
    }
}

fn parse_auth_response(input: &str) -> (String, Option<String>) {
    let input = input.trim();
    if let Ok(url) = Url::parse(input) {
        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }
        if let Some(code) = code {
            let state = state.or_else(|| url.fragment().map(str::to_string));
            return (code, state.filter(|s| !s.is_empty()));
        }
    }
    match input.split_once('#') {
        Some((code, state)) => (
            code.trim().to_string(),
            Some(state.trim().to_string()).filter(|s| !s.is_empty()),
        ),
        None => (input.to_string(), None),
    }
}
