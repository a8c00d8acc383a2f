use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use reliquary_types::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The single client-local key holding the serialized session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable sessions count as "no session".
    pub fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionStoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Ignoring corrupt session at {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let json = serde_json::to_vec(session)?;

        // Write-then-rename: readers only ever see a whole session.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|source| SessionStoreError::Io {
                path: self.path.clone(),
                source,
            })
    }

    pub fn clear(&self) -> Result<(), SessionStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// The session, loaded once at start and handed to every guard and view.
///
/// Only the entry flow writes it; everything else reads.
#[derive(Debug, Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// `None` keeps the session in memory only.
    store: Option<SessionStore>,
    current: RwLock<Option<Session>>,
}

impl SessionContext {
    pub fn load(store: SessionStore) -> Result<Self, SessionStoreError> {
        let current = store.load()?;
        match &current {
            Some(session) => info!("Restored {:?} session from {}", session, store.path().display()),
            None => info!("No stored session at {}", store.path().display()),
        }
        Ok(Self::build(Some(store), current))
    }

    /// A context that never touches disk.
    pub fn ephemeral(current: Option<Session>) -> Self {
        Self::build(None, current)
    }

    fn build(store: Option<SessionStore>, current: Option<Session>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                current: RwLock::new(current),
            }),
        }
    }

    pub fn current(&self) -> Option<Session> {
        *self.inner.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist first, then publish, so a failed write leaves the old session in place.
    pub fn establish(&self, session: Session) -> Result<(), SessionStoreError> {
        if let Some(store) = &self.inner.store {
            store.save(&session)?;
        }
        *self.inner.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionStoreError> {
        if let Some(store) = &self.inner.store {
            store.clear()?;
        }
        *self.inner.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn temp_store() -> SessionStore {
        SessionStore::new(std::env::temp_dir().join(format!("reliquary-session-{}.json", Uuid::new_v4())))
    }

    #[test]
    fn missing_file_means_no_session() {
        let store = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn saved_session_reloads() {
        let store = temp_store();
        let session = Session::Player {
            character_id: Uuid::new_v4(),
        };
        store.save(&session).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"role\":\"player\""));
        assert!(raw.contains("\"characterId\""));

        let context = SessionContext::load(store.clone()).unwrap();
        assert_eq!(context.current(), Some(session));

        context.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_fails_closed() {
        let store = temp_store();
        std::fs::write(store.path(), b"{\"role\":\"wizard\"}").unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn establish_replaces_current() {
        let context = SessionContext::ephemeral(None);
        context.establish(Session::Admin).unwrap();
        assert_eq!(context.current(), Some(Session::Admin));

        let clone = context.clone();
        clone.clear().unwrap();
        assert_eq!(context.current(), None);
    }
}
