use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::{
    persistence::{SessionPersistence, SessionSnapshot},
    session::{AuthPayload, Session, SessionProvider, SessionStore},
};

/// SessionRegistry
///
/// Process-wide owner of every browser session, keyed by the id carried in the
/// `portal_sid` cookie. Until `rehydrate` has run, lookups answer with a loading
/// session so the guard holds instead of redirecting.
///
/// The map lock is only held for map access, never across an `.await`. Writes to
/// persistence are serialized by a separate async lock so snapshots land in the
/// order they were taken.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, SessionStore>>>,
    rehydrated: Arc<watch::Sender<bool>>,
    persist_lock: Arc<Mutex<()>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// A registry waiting for rehydration.
    pub fn new() -> Self {
        let (rehydrated, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            rehydrated: Arc::new(rehydrated),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A registry that skips rehydration entirely.
    pub fn ready() -> Self {
        let registry = Self::new();
        registry.rehydrated.send_replace(true);
        registry
    }

    pub fn is_rehydrated(&self) -> bool {
        *self.rehydrated.borrow()
    }

    /// Resolves once rehydration has completed.
    pub async fn wait_rehydrated(&self) {
        let mut rx = self.rehydrated.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// rehydrate
    ///
    /// Restores the persisted snapshot. A failed load is logged and the registry
    /// starts empty; either way the registry leaves the pending state.
    pub async fn rehydrate(&self, persistence: &dyn SessionPersistence) {
        let restored = match persistence.load().await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                tracing::error!(error = %e, "Session rehydration failed, starting with no sessions");
                SessionSnapshot::new()
            }
        };

        let count = restored.len();
        if let Ok(mut map) = self.inner.write() {
            for (sid, session) in restored {
                // Sessions opened while loading win over stale persisted copies.
                map.entry(sid).or_insert_with(|| {
                    let store = SessionStore::pending();
                    store.rehydrate(Some(session));
                    store
                });
            }
        }

        self.rehydrated.send_replace(true);
        tracing::info!(sessions = count, "Session registry rehydrated");
    }

    /// Opens a fresh, empty session and returns its id.
    pub fn open(&self) -> (Uuid, SessionStore) {
        self.insert(SessionStore::default())
    }

    /// Opens a session that is already signed in. The entry never exists in an
    /// empty state, so a concurrent `persist` cannot prune it before login lands.
    pub fn open_with(&self, payload: AuthPayload) -> (Uuid, SessionStore) {
        self.insert(SessionStore::new(Session::from(payload)))
    }

    fn insert(&self, store: SessionStore) -> (Uuid, SessionStore) {
        let sid = Uuid::new_v4();
        if let Ok(mut map) = self.inner.write() {
            map.insert(sid, store.clone());
        }
        (sid, store)
    }

    pub fn get(&self, sid: &Uuid) -> Option<SessionStore> {
        self.inner.read().ok().and_then(|map| map.get(sid).cloned())
    }

    /// session_for
    ///
    /// The session the guard should see for `sid`: loading before rehydration,
    /// empty for unknown or absent ids.
    pub fn session_for(&self, sid: Option<&Uuid>) -> Session {
        if !self.is_rehydrated() {
            return Session::pending();
        }

        sid.and_then(|sid| self.get(sid))
            .map(|store| store.get_session())
            .unwrap_or_default()
    }

    /// Drops a session entirely (logout).
    pub fn remove(&self, sid: &Uuid) -> Option<SessionStore> {
        let removed = self.inner.write().ok().and_then(|mut map| map.remove(sid));
        if let Some(store) = &removed {
            store.logout();
        }
        removed
    }

    /// Forced reset: clears the session for current subscribers and evicts it.
    pub fn discard(&self, sid: &Uuid) {
        let removed = self.inner.write().ok().and_then(|mut map| map.remove(sid));
        if let Some(store) = removed {
            store.reset();
        }
    }

    /// prune
    ///
    /// Evicts every entry that holds neither an access nor a refresh token.
    /// Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let Ok(mut map) = self.inner.write() else {
            return 0;
        };
        let before = map.len();
        map.retain(|_, store| {
            let session = store.get_session();
            session.has_token() || session.refresh_token.is_some()
        });
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every session that still holds a token. Empty sessions are not
    /// worth persisting; a session whose access token expired is kept for its
    /// refresh token.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner
            .read()
            .map(|map| {
                map.iter()
                    .map(|(sid, store)| (*sid, store.get_session()))
                    .filter(|(_, session)| session.has_token() || session.refresh_token.is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// persist
    ///
    /// Writes the current snapshot, or purges persisted state once no session is
    /// left. Waits for rehydration first: until then the map does not hold the
    /// restored sessions and writing it would erase them.
    ///
    /// Failures are logged, not returned: losing a snapshot only costs users a
    /// re-login after restart.
    pub async fn persist(&self, persistence: &dyn SessionPersistence) {
        if !self.is_rehydrated() {
            tracing::debug!("Deferring session persist until rehydration completes");
            self.wait_rehydrated().await;
        }

        let _writer = self.persist_lock.lock().await;

        let pruned = self.prune();
        if pruned > 0 {
            tracing::debug!(pruned, "Evicted empty sessions");
        }

        let snapshot = self.snapshot();
        let result = if snapshot.is_empty() {
            persistence.purge().await
        } else {
            persistence.save(&snapshot).await
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to persist session snapshot");
        }
    }
}
