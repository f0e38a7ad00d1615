use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::{error::PortalError, session::Session};

/// Snapshot of every open session, keyed by session id.
pub type SessionSnapshot = HashMap<Uuid, Session>;

// 1. SessionPersistence Contract
/// SessionPersistence
///
/// Durable storage for the session registry. The registry restores from it once at
/// startup and writes a fresh snapshot after every login, refresh and logout.
/// Swapping the file-backed implementation for the in-memory one keeps the router
/// testable without touching the filesystem.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    /// Returns `None` when nothing has been persisted yet.
    async fn load(&self) -> Result<Option<SessionSnapshot>, PortalError>;

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PortalError>;

    /// Removes all persisted state.
    async fn purge(&self) -> Result<(), PortalError>;
}

// 2. The Real Implementation (JSON file)
/// FileSessionPersistence
///
/// Stores the snapshot as one JSON document. Writes go to a sibling temp file that
/// is renamed over the target, so a crash mid-write leaves the previous snapshot
/// intact. Writes and purges on one instance (and its clones) take turns on
/// `write_lock`; the temp file is never shared by two writers.
#[derive(Debug, Clone)]
pub struct FileSessionPersistence {
    path: PathBuf,
    write_lock: Arc<AsyncMutex<()>>,
}

impl FileSessionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sessions.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SessionPersistence for FileSessionPersistence {
    async fn load(&self) -> Result<Option<SessionSnapshot>, PortalError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortalError::Persistence(e.to_string())),
        };

        let snapshot = serde_json::from_str::<SessionSnapshot>(&raw)
            .map_err(|e| PortalError::Persistence(e.to_string()))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PortalError> {
        let _writer = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortalError::Persistence(e.to_string()))?;
        }

        let body = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| PortalError::Persistence(e.to_string()))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, body)
            .await
            .map_err(|e| PortalError::Persistence(e.to_string()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| PortalError::Persistence(e.to_string()))
    }

    async fn purge(&self) -> Result<(), PortalError> {
        let _writer = self.write_lock.lock().await;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortalError::Persistence(e.to_string())),
        }
    }
}

// 3. The Mock Implementation (For Tests)
/// MemorySessionPersistence
///
/// Keeps the snapshot in memory. `new_failing` builds an instance whose every
/// operation errors, for exercising the degraded paths.
#[derive(Debug, Default)]
pub struct MemorySessionPersistence {
    snapshot: Mutex<Option<SessionSnapshot>>,
    should_fail: bool,
}

impl MemorySessionPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            snapshot: Mutex::new(None),
            should_fail: true,
        }
    }

    /// What the last `save` wrote, if anything.
    pub fn stored(&self) -> Option<SessionSnapshot> {
        self.snapshot.lock().ok().and_then(|guard| guard.clone())
    }

    fn check(&self) -> Result<(), PortalError> {
        if self.should_fail {
            return Err(PortalError::Persistence(
                "Mock Persistence Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<SessionSnapshot>>, PortalError> {
        self.snapshot
            .lock()
            .map_err(|_| PortalError::Persistence("snapshot lock poisoned".to_string()))
    }
}

#[async_trait]
impl SessionPersistence for MemorySessionPersistence {
    async fn load(&self) -> Result<Option<SessionSnapshot>, PortalError> {
        self.check()?;
        Ok(self.slot()?.clone())
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PortalError> {
        self.check()?;
        *self.slot()? = Some(snapshot.clone());
        Ok(())
    }

    async fn purge(&self) -> Result<(), PortalError> {
        self.check()?;
        *self.slot()? = None;
        Ok(())
    }
}

/// PersistenceState
///
/// The shared handle stored in the application state.
pub type PersistenceState = Arc<dyn SessionPersistence>;
