//! Account credentials and the short references used to log them.
//!
//! A token is never printed in full. Logs name an account by its
//! fingerprint: the first bytes of SHA-256(token), hex-encoded.

use sha2::{Digest, Sha256};

/// Number of hex characters in a credential reference.
const REF_LEN: usize = 12;

/// An opaque authentication token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the identify payload only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short, stable, log-safe reference to this credential.
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        let mut fp = hex::encode(hash);
        fp.truncate(REF_LEN);
        fp
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&self.fingerprint()).finish()
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token:{}", self.fingerprint())
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
