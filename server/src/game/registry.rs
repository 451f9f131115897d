//! Registry of live and finished games.
//!
//! The map guards only membership. Lookups clone the `Arc<Session>` out and
//! drop the map guard before any session lock is taken.
//!
//! Store writes go through `persist`. `clear_all` holds it across the map and
//! store wipe, and every other writer re-checks membership under it, so a
//! game removed by `clear_all` is never written back.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::db::sessions::SessionStore;
use crate::error::{GameError, StoreError};
use crate::game::session::{GamePhase, Session, SessionId};

pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    store: Arc<dyn SessionStore>,
    persist: Mutex<()>,
    /// High-water mark of issued id timestamps (unix nanos).
    last_id: AtomicI64,
}

impl SessionRegistry {
    /// An empty registry backed by `store`.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            persist: Mutex::new(()),
            last_id: AtomicI64::new(0),
        }
    }

    /// Build a registry from every snapshot in `store`.
    pub fn restore(store: Arc<dyn SessionStore>) -> Result<Self, StoreError> {
        let records = store.load_all()?;
        let registry = Self::new(store);
        for record in records {
            if let Some(nanos) = record
                .id
                .strip_prefix("game_")
                .and_then(|n| n.parse::<i64>().ok())
            {
                registry.last_id.fetch_max(nanos, Ordering::SeqCst);
            }
            let session = Session::restore(record);
            registry
                .sessions
                .insert(session.id().to_string(), Arc::new(session));
        }
        tracing::info!(count = registry.sessions.len(), "Restored games from store");
        Ok(registry)
    }

    /// Time-derived id, strictly increasing even under concurrent creation.
    fn next_id(&self) -> SessionId {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut last = self.last_id.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self.last_id.compare_exchange(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return format!("game_{}", candidate),
                Err(actual) => last = actual,
            }
        }
    }

    /// Create a lobby game and persist it.
    ///
    /// A persistence failure is returned, but the game stays registered.
    pub fn create(&self, name: &str) -> Result<Arc<Session>, GameError> {
        let session = Arc::new(Session::new(self.next_id(), name));
        let _persist = self.persist.lock();
        self.sessions
            .insert(session.id().to_string(), session.clone());
        tracing::info!(game_id = %session.id(), name = %name, "Game created");

        self.store.save(&session.record()).map_err(|e| {
            tracing::error!(game_id = %session.id(), error = %e, "Failed to persist new game");
            GameError::from(e)
        })?;
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, GameError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GameError::NotFound(format!("game not found: {}", id)))
    }

    /// Shallow copy of all games in creation order.
    pub fn list_all(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| id_order(a.id()).cmp(&id_order(b.id())));
        sessions
    }

    /// The oldest game still accepting players, if any.
    pub fn first_open(&self) -> Option<Arc<Session>> {
        self.list_all()
            .into_iter()
            .find(|s| s.phase() == GamePhase::Lobby)
    }

    /// End a game and persist the result. Unknown ids are ignored.
    pub fn end(&self, id: &str) -> Result<(), GameError> {
        let Some(session) = self.sessions.get(id).map(|e| e.value().clone()) else {
            return Ok(());
        };
        session.end();
        self.save_if_registered(&session)?;
        Ok(())
    }

    /// Forget every game, in memory and in the store.
    /// Player connections must be closed separately through the hub.
    pub fn clear_all(&self) -> Result<(), GameError> {
        let _persist = self.persist.lock();
        let count = self.sessions.len();
        self.sessions.clear();
        self.store.clear_all()?;
        tracing::info!(count, "Cleared all games");
        Ok(())
    }

    /// Save every game. Failures are logged and skipped.
    /// Returns the number of games written.
    pub fn snapshot_all(&self) -> usize {
        let mut saved = 0;
        for session in self.list_all() {
            match self.save_if_registered(&session) {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(game_id = %session.id(), error = %e, "Snapshot failed");
                }
            }
        }
        saved
    }

    /// Write `session` unless it has left the registry. Returns whether it
    /// was written.
    fn save_if_registered(&self, session: &Session) -> Result<bool, StoreError> {
        let _persist = self.persist.lock();
        if !self.sessions.contains_key(session.id()) {
            return Ok(false);
        }
        self.store.save(&session.record())?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Sort key for `game_<nanos>` ids; unparseable ids sort last, by text.
fn id_order(id: &str) -> (i64, &str) {
    let nanos = id
        .strip_prefix("game_")
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(i64::MAX);
    (nanos, id)
}
