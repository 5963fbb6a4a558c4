//! Account service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STUDYHALL_FIREBASE_API_KEY` - Firebase web API key (placeholder and entropy checked)
//! - `STUDYHALL_FIREBASE_PROJECT_ID` - Firebase project holding the profile documents
//!
//! ## Optional
//! - `STUDYHALL_IDENTITY_ENDPOINT` - Identity Toolkit base URL (default: `https://identitytoolkit.googleapis.com/v1`)
//! - `STUDYHALL_SECURE_TOKEN_ENDPOINT` - Secure Token base URL (default: `https://securetoken.googleapis.com/v1`)
//! - `STUDYHALL_FIRESTORE_ENDPOINT` - Firestore REST base URL (default: `https://firestore.googleapis.com/v1`)
//! - `STUDYHALL_SESSION_DIR` - Directory for the on-disk session cache (default: `.studyhall`)
//! - `STUDYHALL_SESSION_TTL_MINUTES` - Cached session lifetime (default: 60)
//!
//! The endpoint variables exist so development builds can point at the
//! emulator suite instead of production Firebase.

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

use crate::session::SessionCache;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Substrings that mark a value as a stand-in rather than a real key.
/// Matched case-insensitively.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "add-your",
    "changeme",
    "demo",
    "dummy",
    "enter-",
    "example",
    "fixme",
    "insert",
    "password",
    "placeholder",
    "put-your",
    "replace",
    "sample",
    "secret",
    "todo",
    "xxx",
    "your-",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingEnvVar(String),
    #[error("environment variable {0} is invalid: {1}")]
    InvalidEnvVar(String, String),
    #[error("environment variable {0} holds a weak secret: {1}")]
    InsecureSecret(String, String),
}

/// Account service configuration.
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// Firebase project and endpoint configuration
    pub firebase: FirebaseConfig,
    /// Local session cache configuration
    pub session: SessionConfig,
}

/// Firebase project and endpoint configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key sent with every request
    pub api_key: SecretString,
    /// Project ID (e.g., studyhall-prod)
    pub project_id: String,
    /// Identity Toolkit base URL
    pub identity_endpoint: String,
    /// Secure Token base URL
    pub token_endpoint: String,
    /// Firestore REST base URL
    pub firestore_endpoint: String,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("identity_endpoint", &self.identity_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("firestore_endpoint", &self.firestore_endpoint)
            .finish()
    }
}

/// Local session cache configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the cache files
    pub dir: PathBuf,
    /// Minutes a cached session stays loadable
    pub ttl_minutes: i64,
}

impl AccountsConfig {
    /// Build the configuration from `STUDYHALL_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is unset, a numeric
    /// variable fails to parse, or the API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; deployments set the variables directly.
        let _ = dotenvy::dotenv();

        let firebase = FirebaseConfig::from_env()?;
        let session = SessionConfig::from_env()?;

        Ok(Self { firebase, session })
    }
}

impl FirebaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: validated_secret("STUDYHALL_FIREBASE_API_KEY")?,
            project_id: required_env("STUDYHALL_FIREBASE_PROJECT_ID")?,
            identity_endpoint: env_or(
                "STUDYHALL_IDENTITY_ENDPOINT",
                "https://identitytoolkit.googleapis.com/v1",
            ),
            token_endpoint: env_or(
                "STUDYHALL_SECURE_TOKEN_ENDPOINT",
                "https://securetoken.googleapis.com/v1",
            ),
            firestore_endpoint: env_or(
                "STUDYHALL_FIRESTORE_ENDPOINT",
                "https://firestore.googleapis.com/v1",
            ),
        })
    }
}

impl SessionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let dir = PathBuf::from(env_or("STUDYHALL_SESSION_DIR", ".studyhall"));
        let ttl_minutes = env_or(
            "STUDYHALL_SESSION_TTL_MINUTES",
            &SessionCache::DEFAULT_TTL_MINUTES.to_string(),
        )
        .parse::<i64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("STUDYHALL_SESSION_TTL_MINUTES".to_string(), e.to_string())
        })?;

        if ttl_minutes < 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STUDYHALL_SESSION_TTL_MINUTES".to_string(),
                format!("must be non-negative (got {ttl_minutes})"),
            ));
        }

        Ok(Self { dir, ttl_minutes })
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

/// Read an environment variable, erroring when unset.
fn required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Read an environment variable, falling back to a default.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Shannon entropy of the string, in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let total = s.chars().count();
    if total == 0 {
        return 0.0;
    }

    let mut counts: HashMap<char, u32> = HashMap::new();
    for ch in s.chars() {
        *counts.entry(ch).or_default() += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Key lengths are far below f64 precision limits
    let total = total as f64;
    counts
        .values()
        .map(|&n| f64::from(n) / total)
        .map(|p| -p * p.log2())
        .sum()
}

/// Reject obvious stand-ins and values too uniform to be a console key.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lowered = secret.to_lowercase();
    if let Some(marker) = PLACEHOLDER_MARKERS
        .iter()
        .copied()
        .find(|m| lowered.contains(*m))
    {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("looks like a placeholder (contains '{marker}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "only {entropy:.2} bits/char of entropy (need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}); use the web API key from the Firebase console"
            ),
        ));
    }

    Ok(())
}

/// Read a secret from the environment and run it through the strength checks.
fn validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_of_degenerate_strings_is_zero() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
        assert!(shannon_entropy("zzzzzzzz").abs() < f64::EPSILON);
    }

    #[test]
    fn test_entropy_of_an_even_two_char_mix_is_one_bit() {
        assert!((shannon_entropy("abababab") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_a_console_style_key_passes_validation() {
        let result = validate_secret_strength(
            "AIzaSyD8k2mQ9xW4nR7pJ3vT6yB1cF5hL0gN8e",
            "STUDYHALL_FIREBASE_API_KEY",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_placeholder_keys_are_rejected() {
        for value in ["your-api-key-here", "CHANGEME-now-123", "sk-example-0000"] {
            let err =
                validate_secret_strength(value, "STUDYHALL_FIREBASE_API_KEY").unwrap_err();
            assert!(
                matches!(err, ConfigError::InsecureSecret(_, _)),
                "{value} should have been rejected"
            );
        }
    }

    #[test]
    fn test_repetitive_keys_are_rejected_for_low_entropy() {
        let err = validate_secret_strength("abcabcabcabcabcabcabcabc", "KEY").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("bits/char"), "unexpected message: {text}");
    }

    #[test]
    fn test_firebase_config_debug_redacts_the_api_key() {
        let config = FirebaseConfig {
            api_key: SecretString::from("AIzaSyB4dQ7mX2nK9pL3rT6uW8zC1vF5gH0jE7"),
            project_id: "studyhall-test".to_string(),
            identity_endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
            token_endpoint: "https://securetoken.googleapis.com/v1".to_string(),
            firestore_endpoint: "https://firestore.googleapis.com/v1".to_string(),
        };

        let rendered = format!("{config:?}");

        assert!(rendered.contains("studyhall-test"));
        assert!(rendered.contains("identitytoolkit"));

        // The key itself must never surface.
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("AIzaSyB4dQ7mX2nK9pL3rT6uW8zC1vF5gH0jE7"));
    }
}
