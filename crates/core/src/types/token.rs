//! Session token type.
//!
//! Type-safe wrapper for the opaque credential that proves a live session.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};

/// An opaque session token issued by the credential store.
///
/// The token is never interpreted locally; it is carried in the session
/// cache and presented back to the credential store. Wrapping it in
/// [`SecretString`] keeps it out of `Debug` output and log lines.
#[derive(Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Create a session token from the raw string issued by the provider.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for transmission or persistence.
    ///
    /// Call sites should be the only places the token leaves the wrapper:
    /// the session cache writer and the HTTP client request builder.
    #[must_use]
    pub fn reveal(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_returns_original() {
        let token = SessionToken::new("tok_123");
        assert_eq!(token.reveal(), "tok_123");
    }

    #[test]
    fn test_debug_redacts() {
        let token = SessionToken::new("tok_super_secret");
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("tok_super_secret"));
    }

    #[test]
    fn test_clone_preserves_value() {
        let token = SessionToken::new("tok_123");
        let clone = token.clone();
        assert_eq!(clone.reveal(), token.reveal());
    }
}
