use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Opaque token identifying one logical conversation.
///
/// Created client-side at conversation start and immutable for the
/// conversation's lifetime. Used as the routing key for the persistent
/// connection and for chat-history rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session identity.
    ///
    /// Combines millisecond timestamp entropy with a random hex component,
    /// unique with overwhelming probability across the process lifetime.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut rng = rand::rng();
        let bytes: [u8; 8] = rng.random();
        SessionId(format!("{:x}-{}", millis, hex::encode(bytes)))
    }

    /// Wrap an existing identity string (e.g. from a URL path segment).
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        SessionId(id)
    }
}
