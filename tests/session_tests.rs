use conf_portal::{
    persistence::{
        FileSessionPersistence, MemorySessionPersistence, SessionPersistence, SessionSnapshot,
    },
    registry::SessionRegistry,
    roles::Role,
    session::{AuthPayload, Session, SessionProvider, SessionStore, SessionUser, SessionView},
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

fn payload(role: Role) -> AuthPayload {
    AuthPayload {
        user: SessionUser {
            id: "u-7".to_string(),
            role,
            email: None,
            name: Some("Ada".to_string()),
        },
        access_token: "access".to_string(),
        refresh_token: Some("refresh".to_string()),
    }
}

// --- SessionStore ---

#[test]
fn test_store_starts_empty_and_login_populates_it() {
    let store = SessionStore::default();
    assert_eq!(store.get_session(), Session::default());

    store.login(payload(Role::Reviewer));

    let session = store.get_session();
    assert!(session.has_token());
    assert_eq!(session.role(), Some(Role::Reviewer));
    assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
    assert!(!session.loading);
}

#[test]
fn test_logout_clears_everything() {
    let store = SessionStore::default();
    store.login(payload(Role::Admin));

    store.logout();

    assert_eq!(store.get_session(), Session::default());
}

#[test]
fn test_expiring_access_token_keeps_refresh_token() {
    let store = SessionStore::default();
    store.login(payload(Role::Organizer));

    store.expire_access_token();

    let session = store.get_session();
    assert!(!session.has_token());
    assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
    assert!(session.user.is_some());
}

#[test]
fn test_token_update_keeps_refresh_token_when_none_is_issued() {
    let store = SessionStore::default();
    store.login(payload(Role::Organizer));

    let mut renewed = payload(Role::Organizer);
    renewed.access_token = "access-2".to_string();
    renewed.refresh_token = None;
    store.update_tokens(renewed);

    let session = store.get_session();
    assert_eq!(session.access_token.as_deref(), Some("access-2"));
    assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn test_subscribers_see_every_write() {
    let store = SessionStore::default();
    let mut changes = store.subscribe();

    store.login(payload(Role::Speaker));
    changes.changed().await.unwrap();
    assert_eq!(changes.borrow_and_update().role(), Some(Role::Speaker));

    store.reset();
    changes.changed().await.unwrap();
    assert!(!changes.borrow_and_update().has_token());
}

#[test]
fn test_pending_store_clears_loading_on_rehydrate() {
    let store = SessionStore::pending();
    assert!(store.get_session().loading);

    store.rehydrate(None);

    let session = store.get_session();
    assert!(!session.loading);
    assert!(!session.has_token());
}

#[test]
fn test_session_view_hides_tokens() {
    let session = Session::from(payload(Role::Attendee));
    let json = serde_json::to_string(&SessionView::from(&session)).unwrap();

    assert!(json.contains(r#""authenticated":true"#));
    assert!(json.contains(r#""role":"attendee""#));
    assert!(!json.contains("access"));
    assert!(!json.contains("refresh"));
}

#[test]
fn test_loading_flag_is_never_serialized() {
    let json = serde_json::to_string(&Session::pending()).unwrap();
    assert!(!json.contains("loading"));

    let restored: Session = serde_json::from_str(&json).unwrap();
    assert!(!restored.loading);
}

// --- SessionRegistry ---

#[tokio::test]
async fn test_registry_reports_loading_until_rehydrated() {
    let sid = Uuid::new_v4();
    let mut snapshot = SessionSnapshot::new();
    snapshot.insert(sid, Session::from(payload(Role::Collaborator)));
    let persistence = MemorySessionPersistence::with_snapshot(snapshot);

    let registry = SessionRegistry::new();
    assert!(registry.session_for(Some(&sid)).loading);
    assert!(registry.session_for(None).loading);

    registry.rehydrate(&persistence).await;

    let session = registry.session_for(Some(&sid));
    assert!(!session.loading);
    assert_eq!(session.role(), Some(Role::Collaborator));
    assert!(!registry.session_for(None).loading);
    assert!(!registry.session_for(Some(&Uuid::new_v4())).has_token());
}

#[tokio::test]
async fn test_failed_rehydration_still_leaves_pending_state() {
    let registry = SessionRegistry::new();

    registry.rehydrate(&MemorySessionPersistence::new_failing()).await;

    assert!(registry.is_rehydrated());
    assert!(registry.is_empty());
    assert!(!registry.session_for(None).loading);
}

#[tokio::test]
async fn test_wait_rehydrated_resolves_after_background_restore() {
    let registry = SessionRegistry::new();
    let background = registry.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        background.rehydrate(&MemorySessionPersistence::new()).await;
    });

    tokio::time::timeout(Duration::from_secs(1), registry.wait_rehydrated())
        .await
        .expect("rehydration should complete");
    assert!(registry.is_rehydrated());
}

#[tokio::test]
async fn test_session_opened_during_rehydration_is_not_overwritten() {
    let registry = SessionRegistry::new();
    let (sid, store) = registry.open();
    store.login(payload(Role::Admin));

    let mut stale = SessionSnapshot::new();
    stale.insert(sid, Session::from(payload(Role::Guest)));
    registry
        .rehydrate(&MemorySessionPersistence::with_snapshot(stale))
        .await;

    assert_eq!(registry.session_for(Some(&sid)).role(), Some(Role::Admin));
}

#[tokio::test]
async fn test_persist_writes_only_sessions_with_tokens() {
    let registry = SessionRegistry::ready();
    let persistence = MemorySessionPersistence::new();

    let (signed_in, store) = registry.open();
    store.login(payload(Role::Organizer));
    let (_anonymous, _) = registry.open();

    registry.persist(&persistence).await;

    let stored = persistence.stored().expect("snapshot should be saved");
    assert_eq!(stored.len(), 1);
    assert!(stored.contains_key(&signed_in));
}

#[tokio::test]
async fn test_persist_during_rehydration_keeps_restored_sessions() {
    let restored_sid = Uuid::new_v4();
    let mut snapshot = SessionSnapshot::new();
    snapshot.insert(restored_sid, Session::from(payload(Role::Organizer)));
    let persistence = Arc::new(MemorySessionPersistence::with_snapshot(snapshot));

    let registry = SessionRegistry::new();
    let (early_sid, _) = registry.open_with(payload(Role::Admin));

    let pending = {
        let registry = registry.clone();
        let persistence = persistence.clone();
        tokio::spawn(async move { registry.persist(persistence.as_ref()).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!pending.is_finished(), "persist must wait for rehydration");
    let untouched = persistence.stored().unwrap();
    assert_eq!(untouched.len(), 1);
    assert!(untouched.contains_key(&restored_sid));

    registry.rehydrate(persistence.as_ref()).await;
    tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("persist should finish after rehydration")
        .unwrap();

    let stored = persistence.stored().unwrap();
    assert!(stored.contains_key(&restored_sid));
    assert!(stored.contains_key(&early_sid));

    let restarted = SessionRegistry::new();
    restarted.rehydrate(persistence.as_ref()).await;
    assert_eq!(
        restarted.session_for(Some(&restored_sid)).role(),
        Some(Role::Organizer)
    );
    assert_eq!(
        restarted.session_for(Some(&early_sid)).role(),
        Some(Role::Admin)
    );
}

#[tokio::test]
async fn test_persist_evicts_sessions_without_tokens() {
    let registry = SessionRegistry::ready();
    let persistence = MemorySessionPersistence::new();

    let (empty_sid, _) = registry.open();
    let (expired_sid, expired) = registry.open_with(payload(Role::Speaker));
    expired.expire_access_token();

    registry.persist(&persistence).await;

    assert!(registry.get(&empty_sid).is_none());
    // Still refreshable, so it stays.
    assert!(registry.get(&expired_sid).is_some());
    assert_eq!(registry.len(), 1);
    assert!(persistence.stored().unwrap().contains_key(&expired_sid));
}

#[test]
fn test_discard_evicts_and_clears_for_subscribers() {
    let registry = SessionRegistry::ready();
    let (sid, store) = registry.open_with(payload(Role::Reviewer));

    registry.discard(&sid);

    assert!(registry.get(&sid).is_none());
    assert_eq!(store.get_session(), Session::default());
}

#[tokio::test]
async fn test_persisting_after_last_logout_purges() {
    let registry = SessionRegistry::ready();
    let persistence = MemorySessionPersistence::new();

    let (sid, _) = registry.open_with(payload(Role::Attendee));
    registry.persist(&persistence).await;
    assert!(persistence.stored().is_some());

    registry.remove(&sid);
    registry.persist(&persistence).await;
    assert!(persistence.stored().is_none());
}

#[tokio::test]
async fn test_remove_clears_store_for_existing_subscribers() {
    let registry = SessionRegistry::ready();
    let (sid, store) = registry.open();
    store.login(payload(Role::Reviewer));

    let held = store.clone();
    registry.remove(&sid);

    assert!(registry.get(&sid).is_none());
    assert!(!held.get_session().has_token());
}

// --- Persistence ---

#[tokio::test]
async fn test_file_persistence_survives_a_restart() {
    let path = std::env::temp_dir()
        .join(format!("conf-portal-{}", Uuid::new_v4()))
        .join("sessions.json");
    let persistence = FileSessionPersistence::new(&path);

    assert!(persistence.load().await.unwrap().is_none());

    let registry = SessionRegistry::ready();
    let (sid, store) = registry.open();
    store.login(payload(Role::Speaker));
    registry.persist(&persistence).await;

    let restarted = SessionRegistry::new();
    restarted.rehydrate(&FileSessionPersistence::new(&path)).await;
    let session = restarted.session_for(Some(&sid));
    assert_eq!(session.role(), Some(Role::Speaker));
    assert_eq!(session.access_token.as_deref(), Some("access"));

    persistence.purge().await.unwrap();
    assert!(persistence.load().await.unwrap().is_none());
    // Purging twice is fine.
    persistence.purge().await.unwrap();

    let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_file_saves_all_succeed() {
    let dir = std::env::temp_dir().join(format!("conf-portal-overlap-{}", Uuid::new_v4()));
    let persistence = Arc::new(FileSessionPersistence::new(dir.join("sessions.json")));

    let handles = (0..16)
        .map(|_| {
            let persistence = persistence.clone();
            tokio::spawn(async move {
                let mut snapshot = SessionSnapshot::new();
                snapshot.insert(Uuid::new_v4(), Session::from(payload(Role::Attendee)));
                persistence.save(&snapshot).await
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let stored = persistence.load().await.unwrap().expect("snapshot on disk");
    assert_eq!(stored.len(), 1);
    assert!(!dir.join("sessions.json.tmp").exists());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_are_all_persisted() {
    let dir = std::env::temp_dir().join(format!("conf-portal-logins-{}", Uuid::new_v4()));
    let persistence = Arc::new(FileSessionPersistence::new(dir.join("sessions.json")));
    let registry = SessionRegistry::ready();

    let handles = (0..16)
        .map(|_| {
            let registry = registry.clone();
            let persistence = persistence.clone();
            tokio::spawn(async move {
                let (sid, _) = registry.open_with(payload(Role::Attendee));
                registry.persist(persistence.as_ref()).await;
                sid
            })
        })
        .collect::<Vec<_>>();

    let mut sids = Vec::new();
    for handle in handles {
        sids.push(handle.await.unwrap());
    }

    // The last write happened after every login, so it holds all of them.
    let stored = persistence.load().await.unwrap().expect("snapshot on disk");
    assert_eq!(stored.len(), sids.len());
    assert!(sids.iter().all(|sid| stored.contains_key(sid)));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_corrupt_file_is_reported() {
    let path = std::env::temp_dir().join(format!("conf-portal-corrupt-{}.json", Uuid::new_v4()));
    tokio::fs::write(&path, b"{ not json").await.unwrap();

    let result = FileSessionPersistence::new(&path).load().await;
    assert!(result.is_err());

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn test_memory_persistence_failure_switch() {
    let persistence = MemorySessionPersistence::new_failing();
    assert!(persistence.load().await.is_err());
    assert!(persistence.save(&SessionSnapshot::new()).await.is_err());
    assert!(persistence.purge().await.is_err());
}
