//! Integration tests for session caching across launches.
//!
//! The on-disk cache is what lets a shell restore the signed-in state
//! without a network round trip, so these scenarios run two cache
//! instances over the same directory to simulate an app restart.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use studyhall_accounts::manager::AccountManager;
use studyhall_accounts::models::session::keys;
use studyhall_accounts::session::{FileKv, KvStore, SessionCache};
use studyhall_accounts::store::{MemoryCredentialStore, MemoryProfiles};
use studyhall_integration_tests::TestBackend;

#[tokio::test]
async fn test_zero_ttl_session_is_gone_on_the_next_load() {
    let t = TestBackend::with_ttl(0);
    t.manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    // Let the deadline pass.
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(t.manager.cached_session().is_none());
    for key in keys::ALL {
        assert!(t.kv.get(key).unwrap().is_none(), "key {key} still present");
    }
}

#[tokio::test]
async fn test_fresh_session_loads_repeatedly() {
    let t = TestBackend::new();
    t.manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    let first = t.manager.cached_session().unwrap();
    let second = t.manager.cached_session().unwrap();

    assert_eq!(first.user, second.user);
    assert_eq!(first.expires_at, second.expires_at);
}

#[tokio::test]
async fn test_session_survives_a_relaunch_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = Arc::new(MemoryCredentialStore::new());
    let profiles = Arc::new(MemoryProfiles::new());

    // First launch: sign in, which persists the session.
    let kv = Arc::new(FileKv::new(dir.path()));
    let cache = SessionCache::new(kv, credentials.clone(), 60);
    let manager = AccountManager::new(credentials.clone(), profiles.clone(), cache);
    let identity = manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    // Second launch: a fresh cache over the same directory restores it.
    let kv = Arc::new(FileKv::new(dir.path()));
    let cache = SessionCache::new(kv, credentials.clone(), 60);

    let restored = cache.load().unwrap();
    assert_eq!(restored.user.id, identity.id);
    assert_eq!(restored.user.email.as_str(), "a@x.com");
    assert_eq!(restored.user.display_name.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_tampered_snapshot_reads_as_signed_out_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = Arc::new(MemoryCredentialStore::new());
    let profiles = Arc::new(MemoryProfiles::new());

    let kv = Arc::new(FileKv::new(dir.path()));
    let cache = SessionCache::new(kv, credentials.clone(), 60);
    let manager = AccountManager::new(credentials.clone(), profiles, cache);
    manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();

    // Corrupt the user snapshot on disk.
    std::fs::write(dir.path().join(keys::USER), "{broken").unwrap();

    let kv = Arc::new(FileKv::new(dir.path()));
    let cache = SessionCache::new(kv, credentials, 60);
    assert!(cache.load().is_none());

    // The unreadable entry was fully removed, not left half-present.
    assert!(!dir.path().join(keys::TOKEN).exists());
    assert!(!dir.path().join(keys::USER).exists());
    assert!(!dir.path().join(keys::EXPIRES_AT).exists());
}

#[tokio::test]
async fn test_logout_on_one_launch_is_seen_by_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = Arc::new(MemoryCredentialStore::new());
    let profiles = Arc::new(MemoryProfiles::new());

    let kv = Arc::new(FileKv::new(dir.path()));
    let cache = SessionCache::new(kv, credentials.clone(), 60);
    let manager = AccountManager::new(credentials.clone(), profiles, cache);
    manager
        .register("a@x.com", "secret1", "alice")
        .await
        .unwrap();
    manager.logout().await;

    let kv = Arc::new(FileKv::new(dir.path()));
    let cache = SessionCache::new(kv, credentials, 60);
    assert!(cache.load().is_none());
}
