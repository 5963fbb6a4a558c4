//! Mapping from Identity Toolkit error codes to [`AuthError`].
//!
//! The API reports failures as an upper-snake code in the error body's
//! `message` field. A handful of codes are context-sensitive: the same
//! `INVALID_PASSWORD` means "bad login" during sign-in but "wrong current
//! password" during re-authentication, so callers pass the operation they
//! were performing.

use tracing::debug;

use crate::error::AuthError;

use super::types::ApiErrorBody;

/// The credential operation an API error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpContext {
    /// `accounts:signUp`
    SignUp,
    /// `accounts:signInWithPassword` for a fresh login
    SignIn,
    /// `accounts:signInWithPassword` to confirm the active user's password
    Reauth,
    /// `accounts:sendOobCode` with a password-reset request
    Reset,
    /// Token-authorized account operations: update, delete, lookup, refresh
    Account,
}

/// Convert a non-success response into the matching [`AuthError`].
///
/// Consumes the response body. Unparseable bodies fall back to
/// [`AuthError::Unknown`] carrying the HTTP status and a body prefix.
pub async fn api_error(response: reqwest::Response, ctx: OpContext) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let code = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_default();

    if code.is_empty() {
        return AuthError::Unknown(format!(
            "HTTP {status}: {}",
            body.chars().take(200).collect::<String>()
        ));
    }

    debug!(code = %code, context = ?ctx, "credential API rejected request");
    map_api_code(&code, ctx)
}

/// Map a raw API code (optionally `"CODE : detail"`) to an [`AuthError`].
pub fn map_api_code(message: &str, ctx: OpContext) -> AuthError {
    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (message.trim(), None),
    };

    match code {
        "EMAIL_EXISTS" => AuthError::EmailAlreadyInUse,
        "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => AuthError::RegistrationDisabled,
        "WEAK_PASSWORD" | "MISSING_PASSWORD" => AuthError::WeakPassword(
            detail.unwrap_or("password does not meet requirements").to_owned(),
        ),
        "INVALID_EMAIL" | "MISSING_EMAIL" => {
            AuthError::InvalidEmail("address rejected by the credential store".to_owned())
        }
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => match ctx {
            OpContext::Reauth => AuthError::WrongPassword,
            OpContext::Reset => AuthError::UserNotFound,
            _ => AuthError::InvalidCredentials,
        },
        "USER_DISABLED" => AuthError::AccountDisabled,
        "USER_NOT_FOUND" => AuthError::UserNotFound,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
        "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" | "TOKEN_EXPIRED" => AuthError::RequiresRecentLogin,
        "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" => AuthError::Unauthenticated,
        _ => AuthError::Unknown(message.to_owned()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_codes() {
        assert!(matches!(
            map_api_code("EMAIL_EXISTS", OpContext::SignUp),
            AuthError::EmailAlreadyInUse
        ));
        assert!(matches!(
            map_api_code("OPERATION_NOT_ALLOWED", OpContext::SignUp),
            AuthError::RegistrationDisabled
        ));
    }

    #[test]
    fn test_weak_password_carries_the_detail() {
        let err = map_api_code(
            "WEAK_PASSWORD : Password should be at least 6 characters",
            OpContext::SignUp,
        );
        match err {
            AuthError::WeakPassword(detail) => {
                assert_eq!(detail, "Password should be at least 6 characters");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_password_is_a_weak_password() {
        assert!(matches!(
            map_api_code("MISSING_PASSWORD", OpContext::SignUp),
            AuthError::WeakPassword(_)
        ));
    }

    #[test]
    fn test_login_failures_collapse_to_invalid_credentials() {
        for code in ["EMAIL_NOT_FOUND", "INVALID_PASSWORD", "INVALID_LOGIN_CREDENTIALS"] {
            assert!(matches!(
                map_api_code(code, OpContext::SignIn),
                AuthError::InvalidCredentials
            ));
        }
    }

    #[test]
    fn test_same_codes_mean_wrong_password_during_reauth() {
        for code in ["INVALID_PASSWORD", "INVALID_LOGIN_CREDENTIALS"] {
            assert!(matches!(
                map_api_code(code, OpContext::Reauth),
                AuthError::WrongPassword
            ));
        }
    }

    #[test]
    fn test_unknown_address_during_reset_is_user_not_found() {
        assert!(matches!(
            map_api_code("EMAIL_NOT_FOUND", OpContext::Reset),
            AuthError::UserNotFound
        ));
    }

    #[test]
    fn test_account_operation_codes() {
        for code in ["CREDENTIAL_TOO_OLD_LOGIN_AGAIN", "TOKEN_EXPIRED"] {
            assert!(matches!(
                map_api_code(code, OpContext::Account),
                AuthError::RequiresRecentLogin
            ));
        }
        assert!(matches!(
            map_api_code("INVALID_ID_TOKEN", OpContext::Account),
            AuthError::Unauthenticated
        ));
        assert!(matches!(
            map_api_code("USER_DISABLED", OpContext::Account),
            AuthError::AccountDisabled
        ));
        assert!(matches!(
            map_api_code("TOO_MANY_ATTEMPTS_TRY_LATER", OpContext::SignIn),
            AuthError::TooManyAttempts
        ));
    }

    #[test]
    fn test_unrecognized_code_is_preserved() {
        let err = map_api_code("QUOTA_EXCEEDED : too many signups", OpContext::SignUp);
        match err {
            AuthError::Unknown(message) => {
                assert_eq!(message, "QUOTA_EXCEEDED : too many signups");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
