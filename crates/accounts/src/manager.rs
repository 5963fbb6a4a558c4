//! Account lifecycle manager.
//!
//! Single entry point for registration, login, session state, profile
//! updates, and account deletion. Wired against the store traits so the
//! same workflows run against production Firebase or the in-process
//! stores.
//!
//! The manager subscribes to the credential store's session signal once,
//! at construction, and answers every session-state question from that
//! one receiver. Profile-store failures never fail an account operation;
//! they are logged and the operation carries on with credential-store
//! data.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use studyhall_core::Email;

use crate::config::AccountsConfig;
use crate::error::AuthError;
use crate::models::{Identity, ProfilePatch, Session};
use crate::session::{FileKv, SessionCache};
use crate::store::{CredentialStore, FirebaseAuthClient, FirestoreProfiles, ProfileStore};

/// Display fields a signed-in user may change.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    /// New display name.
    pub username: String,
    /// New avatar URL; `None` leaves the current one unchanged.
    pub photo_url: Option<String>,
}

/// Account lifecycle manager.
///
/// Holds the store handles and the single long-lived session signal
/// receiver. Cheap to share behind an `Arc`.
pub struct AccountManager {
    credentials: Arc<dyn CredentialStore>,
    profiles: Arc<dyn ProfileStore>,
    cache: SessionCache,
    signal: watch::Receiver<Option<Identity>>,
}

impl AccountManager {
    /// Create a manager over the given stores.
    ///
    /// Subscribes to the credential store's session signal here, once; no
    /// other subscription is ever taken.
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        profiles: Arc<dyn ProfileStore>,
        cache: SessionCache,
    ) -> Self {
        let signal = credentials.identity_signal();
        Self {
            credentials,
            profiles,
            cache,
            signal,
        }
    }

    /// Create a manager wired to production Firebase and an on-disk
    /// session cache.
    #[must_use]
    pub fn from_config(config: &AccountsConfig) -> Self {
        let auth = FirebaseAuthClient::new(&config.firebase);
        let profiles = FirestoreProfiles::new(&config.firebase, auth.clone());

        let credentials: Arc<dyn CredentialStore> = Arc::new(auth);
        let kv = Arc::new(FileKv::new(config.session.dir.clone()));
        let cache = SessionCache::new(kv, credentials.clone(), config.session.ttl_minutes);

        Self::new(credentials, Arc::new(profiles), cache)
    }

    // =========================================================================
    // Registration and Login
    // =========================================================================

    /// Register a new account and open a session for it.
    ///
    /// The returned identity always carries the requested username, even
    /// when the follow-up writes that record it fail; those failures are
    /// logged and never undo a successful registration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email does not parse.
    /// Returns `AuthError::EmailAlreadyInUse` if the address is taken.
    /// Returns `AuthError::WeakPassword` if the provider rejects the password.
    /// Returns `AuthError::RegistrationDisabled` if sign-up is turned off.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Identity, AuthError> {
        // Validate email
        let email = Email::parse(email)?;

        // Create the identity; this opens the session
        let created = self.credentials.create_identity(&email, password).await?;

        // Record the display name, keeping it locally if the store refuses
        let identity = match self.credentials.update_display_fields(username, None).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(error = %e, "display name not stored at registration");
                Identity {
                    display_name: Some(username.to_owned()),
                    ..created
                }
            }
        };

        // One profile write attempt, then the session snapshot
        if let Err(e) = self
            .profiles
            .write(&identity.id, ProfilePatch::registration(&identity))
            .await
        {
            warn!(error = %e, "profile record not written at registration");
        }
        if let Err(e) = self.cache.save(&identity).await {
            warn!(error = %e, "session not cached at registration");
        }

        info!(id = %identity.id, "account registered");
        Ok(identity)
    }

    /// Log in with an email/password pair.
    ///
    /// Display data from the profile record takes precedence in the
    /// returned identity; the credential store stays authoritative for
    /// `id` and `email`. If the profile read or the session snapshot
    /// fails, the login still succeeds with credential-store fields.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown address or a
    /// wrong password (indistinguishable by design).
    /// Returns `AuthError::AccountDisabled` for administratively disabled
    /// accounts and `AuthError::TooManyAttempts` when throttled.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        // Validate email
        let email = Email::parse(email)?;

        // Verify the credentials; this opens the session
        let verified = self.credentials.verify_identity(&email, password).await?;

        // Stamp the login time on the profile record
        if let Err(e) = self
            .profiles
            .write(&verified.id, ProfilePatch::last_login(verified.last_login_at))
            .await
        {
            warn!(error = %e, "login time not recorded on profile");
        }

        // Merge profile display data into the returned identity
        let identity = match self.profiles.read(&verified.id).await {
            Ok(Some(record)) => verified.merged_with(&record),
            Ok(None) => verified.clone(),
            Err(e) => {
                warn!(error = %e, "profile read failed, using credential fields");
                verified.clone()
            }
        };

        // Cache the session; on failure the login still succeeds with the
        // credential-store fields
        match self.cache.save(&identity).await {
            Ok(_) => {
                info!(id = %identity.id, "logged in");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "session not cached at login");
                info!(id = %verified.id, "logged in");
                Ok(verified)
            }
        }
    }

    /// End the session. Never fails.
    ///
    /// A credential store that refuses to end the session is logged and
    /// the local cache is cleared regardless, so no caller ever observes a
    /// stale authenticated state.
    pub async fn logout(&self) {
        if let Err(e) = self.credentials.end_session().await {
            warn!(error = %e, "credential store sign-out failed");
        }
        self.cache.clear();
        info!("logged out");
    }

    // =========================================================================
    // Session State
    // =========================================================================

    /// The signed-in identity, or `None` when signed out.
    ///
    /// Observes the held session signal once and enriches the result with
    /// profile display data when the record is readable. Never writes.
    pub async fn current_user(&self) -> Option<Identity> {
        let identity = self.signal.borrow().clone()?;

        match self.profiles.read(&identity.id).await {
            Ok(Some(record)) => Some(identity.merged_with(&record)),
            Ok(None) => Some(identity),
            Err(e) => {
                warn!(error = %e, "profile enrichment failed, using credential fields");
                Some(identity)
            }
        }
    }

    /// Whether a session is currently active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.signal.borrow().is_some()
    }

    /// The locally cached session, if present and fresh.
    ///
    /// Expired or unreadable entries are cleared by the cache on the way
    /// out and read as `None`.
    #[must_use]
    pub fn cached_session(&self) -> Option<Session> {
        self.cache.load()
    }

    // =========================================================================
    // Credential Management
    // =========================================================================

    /// Ask the provider to email a password reset link.
    ///
    /// Returns a confirmation message for display; never a token or code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email does not parse.
    /// Returns `AuthError::UserNotFound` if no account has the address.
    pub async fn reset_password(&self, email: &str) -> Result<String, AuthError> {
        let email = Email::parse(email)?;
        self.credentials.send_reset_email(&email).await?;

        info!("password reset email requested");
        Ok(format!(
            "Password reset email sent to {email}. Check your inbox."
        ))
    }

    /// Change the signed-in user's password.
    ///
    /// The current password is re-verified first, on every call; the
    /// change is never attempted when the challenge fails.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` without an active session.
    /// Returns `AuthError::WrongPassword` if `current` fails the challenge.
    /// Returns `AuthError::WeakPassword` if the provider rejects `new`.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<String, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::Unauthenticated);
        }

        // Re-verify before touching the credential
        self.credentials.reauthenticate(current).await?;
        self.credentials.change_credential(new).await?;

        info!("password changed");
        Ok("Password changed successfully.".to_string())
    }

    // =========================================================================
    // Profile and Account
    // =========================================================================

    /// Update the signed-in user's display fields.
    ///
    /// The credential store is updated first; the profile record and the
    /// cached session snapshot follow best-effort. Nothing is written when
    /// no session is active.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` without an active session.
    /// Any other store failure surfaces as `AuthError::Unknown`.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Identity, AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::Unauthenticated);
        }

        // Update the authoritative display fields
        let identity = match self
            .credentials
            .update_display_fields(&update.username, update.photo_url.as_deref())
            .await
        {
            Ok(identity) => identity,
            Err(AuthError::Unauthenticated) => return Err(AuthError::Unauthenticated),
            Err(e) => return Err(AuthError::Unknown(e.to_string())),
        };

        // Mirror the same fields onto the profile record
        if let Err(e) = self
            .profiles
            .write(
                &identity.id,
                ProfilePatch::display(&update.username, update.photo_url.as_deref()),
            )
            .await
        {
            warn!(error = %e, "profile record not updated");
        }

        // Refresh the cached snapshot
        if let Err(e) = self.cache.save(&identity).await {
            warn!(error = %e, "session snapshot not refreshed");
        }

        info!(id = %identity.id, "profile updated");
        Ok(identity)
    }

    /// Permanently delete the signed-in user's account.
    ///
    /// The password is re-verified first. The profile record is
    /// tombstoned before the identity is deleted; a failed tombstone is
    /// logged and does not stop the deletion. On success the session
    /// cache is cleared unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` without an active session.
    /// Returns `AuthError::WrongPassword` if the challenge fails.
    /// Returns `AuthError::RequiresRecentLogin` if the provider demands a
    /// fresh login despite the challenge.
    pub async fn delete_account(&self, password: &str) -> Result<String, AuthError> {
        let identity = self
            .signal
            .borrow()
            .clone()
            .ok_or(AuthError::Unauthenticated)?;

        // Re-verify before anything destructive
        self.credentials.reauthenticate(password).await?;

        // Tombstone the profile record, then delete the identity
        if let Err(e) = self
            .profiles
            .write(&identity.id, ProfilePatch::tombstone(Utc::now()))
            .await
        {
            warn!(error = %e, "tombstone not written, deleting the identity anyway");
        }
        self.credentials.delete_identity().await?;

        self.cache.clear();
        info!(id = %identity.id, "account deleted");
        Ok("Your account has been deleted.".to_string())
    }
}
