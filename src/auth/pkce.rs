use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_BYTES: usize = 32;

/// PKCE verifier and its S256 challenge for one authorization attempt.
///
/// Not `Clone`; the code exchange consumes it.
///
/// # Example
/// ```
/// use claude_meter::auth::PkceChallenge;
///
/// let pkce = PkceChallenge::generate();
/// assert_eq!(pkce.verifier().len(), 43);
/// assert_eq!(
///     PkceChallenge::from_verifier(pkce.verifier()).challenge(),
///     pkce.challenge(),
/// );
/// ```
#[derive(Debug)]
pub struct PkceChallenge {
    verifier: String,
    challenge: String,
}

impl PkceChallenge {
    /// Draw a fresh verifier from the OS random source.
    pub fn generate() -> Self {
        Self::from_verifier(&random_url_safe(VERIFIER_BYTES))
    }

    /// Rebuild the pair from a known verifier.
    pub fn from_verifier(verifier: &str) -> Self {
        Self {
            verifier: verifier.to_string(),
            challenge: compute_code_challenge(verifier),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Always `S256`; the plain method is never offered.
    pub fn method(&self) -> &'static str {
        "S256"
    }
}

/// URL-safe, unpadded base64 of `byte_count` random bytes.
pub(crate) fn random_url_safe(byte_count: usize) -> String {
    let mut buf = vec![0u8; byte_count];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
