//! In-process store implementations.
//!
//! Used by tests and offline development. The credential store enforces the
//! same account rules the managed provider does (duplicate addresses,
//! minimum password length, disabled accounts, indistinguishable login
//! failures) so code exercised against it sees the real error taxonomy.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use tokio::sync::watch;
use uuid::Uuid;

use studyhall_core::{Email, IdentityId, SessionToken};

use crate::error::AuthError;
use crate::models::{Identity, ProfilePatch, ProfileRecord};
use crate::store::{CredentialStore, ProfileStore, ProfileStoreError};

/// Provider-side minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

struct StoredAccount {
    identity: Identity,
    password: String,
    disabled: bool,
}

#[derive(Default)]
struct MemoryState {
    /// Accounts keyed by lowercased email, matching provider canonicalization.
    accounts: HashMap<String, StoredAccount>,
    active: Option<IdentityId>,
    reset_requests: Vec<Email>,
}

/// In-process credential store.
pub struct MemoryCredentialStore {
    state: Mutex<MemoryState>,
    signal: watch::Sender<Option<Identity>>,
}

impl MemoryCredentialStore {
    /// Create an empty store with no active session.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(None);
        Self {
            state: Mutex::new(MemoryState::default()),
            signal,
        }
    }

    /// Administratively disable an account. No-op for unknown addresses.
    pub fn disable(&self, email: &Email) {
        let mut state = self.lock();
        if let Some(account) = state.accounts.get_mut(&canonical(email)) {
            account.disabled = true;
        }
    }

    /// Addresses a reset email was requested for, in request order.
    #[must_use]
    pub fn reset_requests(&self) -> Vec<Email> {
        self.lock().reset_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical(email: &Email) -> String {
    email.as_str().to_lowercase()
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn mint_token() -> SessionToken {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    SessionToken::new(URL_SAFE_NO_PAD.encode(bytes))
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        check_password(password)?;

        let identity = {
            let mut state = self.lock();
            if state.accounts.contains_key(&canonical(email)) {
                return Err(AuthError::EmailAlreadyInUse);
            }

            let now = Utc::now();
            let identity = Identity {
                id: IdentityId::new(Uuid::new_v4().to_string()),
                email: email.clone(),
                display_name: None,
                photo_url: None,
                created_at: now,
                last_login_at: now,
            };
            state.accounts.insert(
                canonical(email),
                StoredAccount {
                    identity: identity.clone(),
                    password: password.to_owned(),
                    disabled: false,
                },
            );
            state.active = Some(identity.id.clone());
            identity
        };

        self.signal.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn verify_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let identity = {
            let mut state = self.lock();
            let account = state
                .accounts
                .get_mut(&canonical(email))
                .ok_or(AuthError::InvalidCredentials)?;

            if account.disabled {
                return Err(AuthError::AccountDisabled);
            }
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }

            account.identity.last_login_at = Utc::now();
            let identity = account.identity.clone();
            state.active = Some(identity.id.clone());
            identity
        };

        self.signal.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn end_session(&self) -> Result<(), AuthError> {
        self.lock().active = None;
        self.signal.send_replace(None);
        Ok(())
    }

    fn identity_signal(&self) -> watch::Receiver<Option<Identity>> {
        self.signal.subscribe()
    }

    async fn update_display_fields(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let identity = {
            let mut state = self.lock();
            let active_id = state.active.clone().ok_or(AuthError::Unauthenticated)?;
            let account = state
                .accounts
                .values_mut()
                .find(|a| a.identity.id == active_id)
                .ok_or(AuthError::Unauthenticated)?;

            account.identity.display_name = Some(display_name.to_owned());
            if let Some(url) = photo_url {
                account.identity.photo_url = Some(url.to_owned());
            }
            account.identity.clone()
        };

        self.signal.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn change_credential(&self, new_password: &str) -> Result<(), AuthError> {
        let mut state = self.lock();
        let active_id = state.active.clone().ok_or(AuthError::Unauthenticated)?;
        check_password(new_password)?;

        let account = state
            .accounts
            .values_mut()
            .find(|a| a.identity.id == active_id)
            .ok_or(AuthError::Unauthenticated)?;
        account.password = new_password.to_owned();
        Ok(())
    }

    async fn reauthenticate(&self, password: &str) -> Result<(), AuthError> {
        let state = self.lock();
        let active_id = state.active.clone().ok_or(AuthError::Unauthenticated)?;
        let account = state
            .accounts
            .values()
            .find(|a| a.identity.id == active_id)
            .ok_or(AuthError::Unauthenticated)?;

        if account.password != password {
            return Err(AuthError::WrongPassword);
        }
        Ok(())
    }

    async fn send_reset_email(&self, email: &Email) -> Result<(), AuthError> {
        let mut state = self.lock();
        if !state.accounts.contains_key(&canonical(email)) {
            return Err(AuthError::UserNotFound);
        }
        state.reset_requests.push(email.clone());
        Ok(())
    }

    async fn delete_identity(&self) -> Result<(), AuthError> {
        {
            let mut state = self.lock();
            let active_id = state.active.clone().ok_or(AuthError::Unauthenticated)?;
            state.accounts.retain(|_, a| a.identity.id != active_id);
            state.active = None;
        }

        self.signal.send_replace(None);
        Ok(())
    }

    async fn session_token(&self) -> Result<SessionToken, AuthError> {
        let state = self.lock();
        if state.active.is_none() {
            return Err(AuthError::Unauthenticated);
        }
        Ok(mint_token())
    }
}

/// In-process profile store. Never fails.
#[derive(Default)]
pub struct MemoryProfiles {
    records: RwLock<HashMap<IdentityId, ProfileRecord>>,
}

impl MemoryProfiles {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn write(&self, id: &IdentityId, patch: ProfilePatch) -> Result<(), ProfileStoreError> {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let record = records.entry(id.clone()).or_default();
        patch.apply_to(record);
        Ok(())
    }

    async fn read(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        let records = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(id).cloned())
    }
}
