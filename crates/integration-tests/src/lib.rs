//! Integration tests for Studyhall accounts.
//!
//! Cross-module scenarios for the account manager: full lifecycle flows,
//! session cache behavior, and the best-effort handling of profile store
//! failures. Everything runs against the in-process stores; nothing here
//! talks to Firebase.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p studyhall-integration-tests
//! ```
//!
//! # Harness
//!
//! - [`TestBackend`] - a manager wired to fresh in-memory stores
//! - [`RecordingCredentials`] - records credential-store call order
//! - [`RefusingSignOut`] - session ends locally, remote revocation fails
//! - [`UnreliableProfiles`] - profile store with injectable failures

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use studyhall_accounts::error::AuthError;
use studyhall_accounts::manager::AccountManager;
use studyhall_accounts::models::{Identity, ProfilePatch, ProfileRecord};
use studyhall_accounts::session::{MemoryKv, SessionCache};
use studyhall_accounts::store::{
    CredentialStore, MemoryCredentialStore, MemoryProfiles, ProfileStore, ProfileStoreError,
};
use studyhall_core::{Email, IdentityId, SessionToken};

/// Initialize test tracing once per process.
///
/// Honors `RUST_LOG`; output goes through the test writer so it only
/// shows for failing tests.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// =============================================================================
// TestBackend
// =============================================================================

/// An account manager wired to fresh in-memory stores.
///
/// The store handles stay accessible so tests can inspect or mutate state
/// behind the manager's back.
pub struct TestBackend {
    pub credentials: Arc<MemoryCredentialStore>,
    pub profiles: Arc<MemoryProfiles>,
    pub kv: Arc<MemoryKv>,
    pub manager: AccountManager,
}

impl TestBackend {
    /// Backend with the default one-hour session TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(SessionCache::DEFAULT_TTL_MINUTES)
    }

    /// Backend with an explicit session TTL in minutes.
    #[must_use]
    pub fn with_ttl(ttl_minutes: i64) -> Self {
        init_tracing();

        let credentials = Arc::new(MemoryCredentialStore::new());
        let profiles = Arc::new(MemoryProfiles::new());
        let kv = Arc::new(MemoryKv::new());
        let cache = SessionCache::new(kv.clone(), credentials.clone(), ttl_minutes);
        let manager = AccountManager::new(credentials.clone(), profiles.clone(), cache);

        Self {
            credentials,
            profiles,
            kv,
            manager,
        }
    }
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RecordingCredentials
// =============================================================================

/// Credential store decorator that records the order of operations.
pub struct RecordingCredentials {
    inner: Arc<dyn CredentialStore>,
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingCredentials {
    #[must_use]
    pub fn new(inner: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Operation names in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, op: &'static str) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

#[async_trait]
impl CredentialStore for RecordingCredentials {
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.record("create_identity");
        self.inner.create_identity(email, password).await
    }

    async fn verify_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.record("verify_identity");
        self.inner.verify_identity(email, password).await
    }

    async fn end_session(&self) -> Result<(), AuthError> {
        self.record("end_session");
        self.inner.end_session().await
    }

    fn identity_signal(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.identity_signal()
    }

    async fn update_display_fields(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.record("update_display_fields");
        self.inner
            .update_display_fields(display_name, photo_url)
            .await
    }

    async fn change_credential(&self, new_password: &str) -> Result<(), AuthError> {
        self.record("change_credential");
        self.inner.change_credential(new_password).await
    }

    async fn reauthenticate(&self, password: &str) -> Result<(), AuthError> {
        self.record("reauthenticate");
        self.inner.reauthenticate(password).await
    }

    async fn send_reset_email(&self, email: &Email) -> Result<(), AuthError> {
        self.record("send_reset_email");
        self.inner.send_reset_email(email).await
    }

    async fn delete_identity(&self) -> Result<(), AuthError> {
        self.record("delete_identity");
        self.inner.delete_identity().await
    }

    async fn session_token(&self) -> Result<SessionToken, AuthError> {
        self.record("session_token");
        self.inner.session_token().await
    }
}

// =============================================================================
// RefusingSignOut
// =============================================================================

/// Credential store whose remote sign-out always reports failure.
///
/// The session still ends locally before the error, mirroring a provider
/// that signs out client-side but fails to revoke server-side.
pub struct RefusingSignOut {
    inner: Arc<dyn CredentialStore>,
}

impl RefusingSignOut {
    #[must_use]
    pub fn new(inner: Arc<dyn CredentialStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CredentialStore for RefusingSignOut {
    async fn create_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.inner.create_identity(email, password).await
    }

    async fn verify_identity(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.inner.verify_identity(email, password).await
    }

    async fn end_session(&self) -> Result<(), AuthError> {
        let _ = self.inner.end_session().await;
        Err(AuthError::Unknown("revocation endpoint unreachable".to_owned()))
    }

    fn identity_signal(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.identity_signal()
    }

    async fn update_display_fields(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.inner
            .update_display_fields(display_name, photo_url)
            .await
    }

    async fn change_credential(&self, new_password: &str) -> Result<(), AuthError> {
        self.inner.change_credential(new_password).await
    }

    async fn reauthenticate(&self, password: &str) -> Result<(), AuthError> {
        self.inner.reauthenticate(password).await
    }

    async fn send_reset_email(&self, email: &Email) -> Result<(), AuthError> {
        self.inner.send_reset_email(email).await
    }

    async fn delete_identity(&self) -> Result<(), AuthError> {
        self.inner.delete_identity().await
    }

    async fn session_token(&self) -> Result<SessionToken, AuthError> {
        self.inner.session_token().await
    }
}

// =============================================================================
// UnreliableProfiles
// =============================================================================

/// Profile store with injectable failures and a write-attempt counter.
pub struct UnreliableProfiles {
    inner: MemoryProfiles,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    write_attempts: AtomicUsize,
}

impl UnreliableProfiles {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryProfiles::new(),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            write_attempts: AtomicUsize::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Write attempts observed so far, including failed ones.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Read the underlying record directly, bypassing failure injection.
    ///
    /// # Errors
    ///
    /// Propagates the in-memory store's errors (it has none in practice).
    pub async fn stored_record(
        &self,
        id: &IdentityId,
    ) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        self.inner.read(id).await
    }
}

impl Default for UnreliableProfiles {
    fn default() -> Self {
        Self::new()
    }
}

fn injected() -> ProfileStoreError {
    ProfileStoreError::Rejected {
        status: 503,
        message: "injected failure".to_owned(),
    }
}

#[async_trait]
impl ProfileStore for UnreliableProfiles {
    async fn write(&self, id: &IdentityId, patch: ProfilePatch) -> Result<(), ProfileStoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.write(id, patch).await
    }

    async fn read(&self, id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.read(id).await
    }
}
