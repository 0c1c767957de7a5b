use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque version token of a medication record
///
/// A fresh token is minted on every successful write. Callers hand the token they
/// last read back to the update path, which only succeeds while it still matches.
/// Tokens carry no structure beyond opacity and uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Mint a new random version token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing token (used for reconstruction from storage or requests)
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the inner token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
