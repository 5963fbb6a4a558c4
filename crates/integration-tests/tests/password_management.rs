//! Integration tests for password reset and change.
//!
//! The ordering test is the load-bearing one: a password change must
//! re-verify the current password before anything touches the stored
//! credential, every time.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use studyhall_accounts::error::AuthError;
use studyhall_accounts::manager::AccountManager;
use studyhall_accounts::session::{MemoryKv, SessionCache};
use studyhall_accounts::store::{MemoryCredentialStore, MemoryProfiles};
use studyhall_integration_tests::{RecordingCredentials, TestBackend};

fn recorded_manager() -> (AccountManager, Arc<RecordingCredentials>) {
    let backing = Arc::new(MemoryCredentialStore::new());
    let credentials = Arc::new(RecordingCredentials::new(backing));
    let profiles = Arc::new(MemoryProfiles::new());
    let kv = Arc::new(MemoryKv::new());
    let cache = SessionCache::new(kv, credentials.clone(), 60);
    let manager = AccountManager::new(credentials.clone(), profiles, cache);
    (manager, credentials)
}

// =============================================================================
// Password Change
// =============================================================================

#[tokio::test]
async fn test_change_password_reauthenticates_before_changing() {
    let (manager, credentials) = recorded_manager();
    manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    manager.change_password("secret1", "secret2").await.unwrap();

    let calls = credentials.calls();
    let reauth = calls.iter().position(|op| *op == "reauthenticate").unwrap();
    let change = calls
        .iter()
        .position(|op| *op == "change_credential")
        .unwrap();
    assert!(
        reauth < change,
        "reauthenticate must come before change_credential, got {calls:?}"
    );
}

#[tokio::test]
async fn test_failed_reauth_never_reaches_the_credential() {
    let (manager, credentials) = recorded_manager();
    manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    let err = manager.change_password("not-it", "secret2").await.unwrap_err();
    assert!(matches!(err, AuthError::WrongPassword));
    assert!(!credentials.calls().contains(&"change_credential"));

    // The old password still works.
    manager.logout().await;
    assert!(manager.login("a@x.com", "secret1").await.is_ok());
}

#[tokio::test]
async fn test_change_password_without_a_session() {
    let t = TestBackend::new();

    let err = t
        .manager
        .change_password("secret1", "secret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}

#[tokio::test]
async fn test_new_password_must_meet_the_policy() {
    let t = TestBackend::new();
    t.manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    let err = t.manager.change_password("secret1", "tiny").await.unwrap_err();
    assert!(matches!(err, AuthError::WeakPassword(_)));
}

#[tokio::test]
async fn test_changed_password_takes_effect_on_next_login() {
    let t = TestBackend::new();
    t.manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    t.manager.change_password("secret1", "secret2").await.unwrap();
    t.manager.logout().await;

    let err = t.manager.login("a@x.com", "secret1").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(t.manager.login("a@x.com", "secret2").await.is_ok());
}

// =============================================================================
// Password Reset
// =============================================================================

#[tokio::test]
async fn test_reset_password_for_a_known_address() {
    let t = TestBackend::new();
    t.manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();
    t.manager.logout().await;

    let message = t.manager.reset_password("a@x.com").await.unwrap();

    assert!(message.contains("a@x.com"));
    assert_eq!(t.credentials.reset_requests().len(), 1);
}

#[tokio::test]
async fn test_reset_password_for_an_unknown_address() {
    let t = TestBackend::new();

    let err = t.manager.reset_password("nobody@x.com").await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));
}

#[tokio::test]
async fn test_reset_password_rejects_a_malformed_address() {
    let t = TestBackend::new();

    let err = t.manager.reset_password("not-an-email").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail(_)));
    assert!(t.credentials.reset_requests().is_empty());
}
