//! Connection hub: who is connected to which game, and fan-out to them.
//!
//! Targets are snapshotted under the hub's map guards, which are released
//! before any frame is enqueued. A connection whose queue is closed or full
//! is evicted: its player leaves the game and the remaining players and all
//! admins get a `playerLeft`. Evictions caused while announcing a departure
//! are queued and processed the same way, so cascades terminate once every
//! dead connection is gone.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::protocol::ServerEvent;
use super::{ConnectionHandle, ConnectionId};
use crate::error::GameError;
use crate::game::session::{PlayerId, PlayerView, Session, SessionId};

#[derive(Default)]
struct HubInner {
    players: DashMap<SessionId, HashMap<PlayerId, ConnectionHandle>>,
    admins: DashMap<ConnectionId, ConnectionHandle>,
    next_connection: AtomicU64,
}

#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a connection id and its bounded outbound queue.
    pub fn open_connection(&self, capacity: usize) -> (ConnectionHandle, mpsc::Receiver<Message>) {
        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        ConnectionHandle::new(id, capacity)
    }

    /// Bind `conn` to a player. A previous connection for the same player is closed.
    pub fn register_player(&self, session_id: &str, player_id: &str, conn: ConnectionHandle) {
        let previous = self
            .inner
            .players
            .entry(session_id.to_string())
            .or_default()
            .insert(player_id.to_string(), conn);

        if let Some(previous) = previous {
            tracing::debug!(
                game_id = %session_id,
                player_id = %player_id,
                connection = previous.id,
                "Replacing player connection"
            );
            previous.close();
        }
    }

    /// Drop the binding if it still points at `connection`.
    fn unregister_player(&self, session_id: &str, player_id: &str, connection: ConnectionId) {
        if let Some(mut conns) = self.inner.players.get_mut(session_id) {
            if conns.get(player_id).map(|c| c.id) == Some(connection) {
                conns.remove(player_id);
            }
        }
        self.inner
            .players
            .remove_if(session_id, |_, conns| conns.is_empty());
    }

    pub fn register_admin(&self, conn: ConnectionHandle) {
        tracing::debug!(connection = conn.id, "Admin connection registered");
        self.inner.admins.insert(conn.id, conn);
    }

    pub fn unregister_admin(&self, connection: ConnectionId) {
        self.inner.admins.remove(&connection);
        tracing::debug!(connection, "Admin connection unregistered");
    }

    fn player_targets(&self, session_id: &str) -> Vec<(PlayerId, ConnectionHandle)> {
        self.inner
            .players
            .get(session_id)
            .map(|conns| {
                conns
                    .iter()
                    .map(|(pid, conn)| (pid.clone(), conn.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn player_connection_count(&self, session_id: &str) -> usize {
        self.inner
            .players
            .get(session_id)
            .map(|conns| conns.len())
            .unwrap_or(0)
    }

    pub fn admin_count(&self) -> usize {
        self.inner.admins.len()
    }

    /// Send `event` to every connected player of `session`.
    pub fn broadcast_to_players(&self, session: &Session, event: &ServerEvent) {
        let mut pending = VecDeque::from([event.clone()]);

        while let Some(event) = pending.pop_front() {
            let frame = match event.encode() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(kind = event.kind(), error = %e, "Failed to encode event");
                    continue;
                }
            };

            for (player_id, conn) in self.player_targets(session.id()) {
                if let Err(e) = conn.deliver(frame.clone()) {
                    tracing::warn!(
                        game_id = %session.id(),
                        player_id = %player_id,
                        connection = conn.id,
                        error = %e,
                        "Player send failed, evicting"
                    );
                    if let Some(left) = self.evict(session, &player_id, &conn) {
                        self.broadcast_to_admins(&left);
                        pending.push_back(left);
                    }
                }
            }
        }
    }

    /// Send `event` to every admin. Admins that cannot take it are dropped.
    pub fn broadcast_to_admins(&self, event: &ServerEvent) {
        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(kind = event.kind(), error = %e, "Failed to encode event");
                return;
            }
        };

        let admins: Vec<ConnectionHandle> = self
            .inner
            .admins
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for conn in admins {
            if let Err(e) = conn.deliver(frame.clone()) {
                tracing::warn!(connection = conn.id, error = %e, "Admin send failed, dropping");
                conn.close();
                self.unregister_admin(conn.id);
            }
        }
    }

    /// Close `conn` and remove its player, returning the `playerLeft` to announce.
    fn evict(
        &self,
        session: &Session,
        player_id: &str,
        conn: &ConnectionHandle,
    ) -> Option<ServerEvent> {
        conn.close();
        self.unregister_player(session.id(), player_id, conn.id);
        let remaining = session.remove_player(player_id, Some(conn.id))?;
        Some(ServerEvent::player_left(player_id, remaining))
    }

    /// A player's connection went away. Removes the player unless a newer
    /// connection has taken over, then announces the departure.
    pub fn disconnect_player(&self, session: &Session, player_id: &str, connection: ConnectionId) {
        self.unregister_player(session.id(), player_id, connection);
        if let Some(remaining) = session.remove_player(player_id, Some(connection)) {
            self.announce_departure(session, player_id, remaining);
        }
    }

    /// Remove a player on request, closing its connection if it has one.
    pub fn remove_player(&self, session: &Session, player_id: &str) -> Result<(), GameError> {
        let conn = self
            .inner
            .players
            .get_mut(session.id())
            .and_then(|mut conns| conns.remove(player_id));
        self.inner
            .players
            .remove_if(session.id(), |_, conns| conns.is_empty());
        if let Some(conn) = conn {
            conn.close();
        }

        let remaining = session
            .remove_player(player_id, None)
            .ok_or_else(|| GameError::NotFound(format!("player not found: {}", player_id)))?;
        self.announce_departure(session, player_id, remaining);
        Ok(())
    }

    fn announce_departure(&self, session: &Session, player_id: &str, remaining: Vec<PlayerView>) {
        tracing::info!(game_id = %session.id(), player_id = %player_id, "Player left");
        let left = ServerEvent::player_left(player_id, remaining);
        self.broadcast_to_admins(&left);
        self.broadcast_to_players(session, &left);
    }

    /// Close every player connection in every game.
    pub fn disconnect_all_players(&self) {
        let sessions: Vec<SessionId> = self
            .inner
            .players
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut closed = 0;
        for session_id in sessions {
            if let Some((_, conns)) = self.inner.players.remove(&session_id) {
                for conn in conns.into_values() {
                    conn.close();
                    closed += 1;
                }
            }
        }
        tracing::info!(closed, "Closed all player connections");
    }
}
