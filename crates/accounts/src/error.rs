//! Account operation error types.

use thiserror::Error;

use studyhall_core::EmailError;

/// Errors that can occur during account lifecycle operations.
///
/// Every fallible operation on the account manager and the credential store
/// reports through this taxonomy. Provider-specific failure codes are
/// translated at the store boundary; unrecognized codes surface as
/// [`AuthError::Unknown`] with the raw code preserved for diagnostics.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email failed validation, locally or at the credential store.
    #[error("invalid email: {0}")]
    InvalidEmail(String),

    /// Email/password pair rejected at login.
    ///
    /// Deliberately covers both "no such account" and "wrong password" so
    /// login failures never disclose whether an address is registered.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Registration attempted with an email that already has an account.
    #[error("email already in use")]
    EmailAlreadyInUse,

    /// Password rejected by the credential store's strength policy.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Re-authentication challenge failed for the active session.
    #[error("wrong password")]
    WrongPassword,

    /// The session is too old for a sensitive operation; sign in again.
    #[error("recent login required")]
    RequiresRecentLogin,

    /// The credential store is rate limiting this account or address.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// The account exists but has been administratively disabled.
    #[error("account disabled")]
    AccountDisabled,

    /// Email/password sign-up is switched off for this project.
    #[error("password registration is disabled")]
    RegistrationDisabled,

    /// No account exists for the given address.
    ///
    /// Only surfaced by operations that are allowed to disclose existence,
    /// such as password reset.
    #[error("user not found")]
    UserNotFound,

    /// Transport to the credential store failed.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(#[from] reqwest::Error),

    /// Operation requires an active session and there is none.
    #[error("not signed in")]
    Unauthenticated,

    /// Anything the taxonomy does not name, with the provider detail kept.
    #[error("unexpected account failure: {0}")]
    Unknown(String),
}

impl From<EmailError> for AuthError {
    fn from(err: EmailError) -> Self {
        Self::InvalidEmail(err.to_string())
    }
}
