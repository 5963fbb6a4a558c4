//! Store contracts for the two managed backends.
//!
//! The account manager is wired against these traits, never against a
//! concrete provider. Production implementations live in [`firebase`];
//! in-process implementations for tests and offline development live in
//! [`memory`].
//!
//! # Failure domains
//!
//! [`CredentialStore`] failures are part of the account error taxonomy and
//! surface to callers. [`ProfileStore`] failures use their own error type
//! with no conversion into [`AuthError`]: the profile store is best-effort
//! by contract, and keeping the types apart means a profile failure cannot
//! accidentally fail an account operation.

pub mod firebase;
pub mod memory;

pub use firebase::{FirebaseAuthClient, FirestoreProfiles};
pub use memory::{MemoryCredentialStore, MemoryProfiles};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use studyhall_core::{Email, IdentityId, SessionToken};

use crate::error::AuthError;
use crate::models::{Identity, ProfilePatch, ProfileRecord};

/// Managed identity provider holding the authoritative account records.
///
/// Implementations own the active session: creating or verifying an
/// identity activates a session, and the mutating operations act on it.
/// Password hashing, token issuance, rate limiting and abuse protection
/// are all on the provider's side of this boundary.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a new identity from an email/password pair and activate a
    /// session for it.
    ///
    /// # Errors
    ///
    /// `EmailAlreadyInUse`, `InvalidEmail`, `WeakPassword`,
    /// `RegistrationDisabled`, `TooManyAttempts`, plus transport failures.
    async fn create_identity(&self, email: &Email, password: &str)
    -> Result<Identity, AuthError>;

    /// Verify an email/password pair and activate a session for it.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for both unknown addresses and wrong passwords
    /// (indistinguishable by design), `AccountDisabled`, `TooManyAttempts`,
    /// plus transport failures.
    async fn verify_identity(&self, email: &Email, password: &str)
    -> Result<Identity, AuthError>;

    /// End the active session. Succeeds when no session is active.
    ///
    /// # Errors
    ///
    /// Provider-dependent; ending a session locally cannot fail, remote
    /// revocation can.
    async fn end_session(&self) -> Result<(), AuthError>;

    /// Subscribe to the current-session signal.
    ///
    /// The receiver observes `Some(identity)` while a session is active and
    /// `None` otherwise. Implementations publish every transition; callers
    /// take one long-lived receiver rather than polling.
    fn identity_signal(&self) -> watch::Receiver<Option<Identity>>;

    /// Update the display fields of the active session's identity.
    ///
    /// A `None` photo URL leaves the stored one unchanged.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` without an active session, `RequiresRecentLogin`,
    /// plus transport failures.
    async fn update_display_fields(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Identity, AuthError>;

    /// Replace the active identity's password.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `WeakPassword`, `RequiresRecentLogin`, plus
    /// transport failures.
    async fn change_credential(&self, new_password: &str) -> Result<(), AuthError>;

    /// Re-verify the password of the active session's identity.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` without an active session, `WrongPassword` when
    /// the challenge fails, `TooManyAttempts`, plus transport failures.
    async fn reauthenticate(&self, password: &str) -> Result<(), AuthError>;

    /// Ask the provider to send a password reset email.
    ///
    /// Does not require an active session.
    ///
    /// # Errors
    ///
    /// `UserNotFound`, `InvalidEmail`, plus transport failures.
    async fn send_reset_email(&self, email: &Email) -> Result<(), AuthError>;

    /// Permanently delete the active session's identity.
    ///
    /// On success the session is gone and the signal publishes `None`.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `RequiresRecentLogin`, plus transport failures.
    async fn delete_identity(&self) -> Result<(), AuthError>;

    /// Mint a fresh token for the active session.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` without an active session, plus transport failures.
    async fn session_token(&self) -> Result<SessionToken, AuthError>;
}

/// Errors from the profile record store.
///
/// Deliberately not convertible into [`AuthError`]: callers log these and
/// carry on.
#[derive(Debug, Error)]
pub enum ProfileStoreError {
    /// Transport to the document store failed.
    #[error("profile transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The document store rejected the request.
    #[error("profile store rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the store.
        status: u16,
        /// Error detail from the response body.
        message: String,
    },

    /// A stored document could not be decoded.
    #[error("malformed profile document: {0}")]
    Malformed(String),

    /// No usable session for authorizing the request.
    #[error("no session for profile access: {0}")]
    Session(String),
}

/// Document store holding the denormalized profile records.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Merge `patch` into the record for `id`, creating it if absent.
    ///
    /// Fields absent from the patch are left untouched.
    ///
    /// # Errors
    ///
    /// Transport and store rejections; callers treat every failure as
    /// recoverable.
    async fn write(&self, id: &IdentityId, patch: ProfilePatch) -> Result<(), ProfileStoreError>;

    /// Read the record for `id`, `Ok(None)` when no document exists.
    ///
    /// # Errors
    ///
    /// Transport and decode failures; callers treat every failure as
    /// recoverable.
    async fn read(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileStoreError>;
}
