use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::GameError;
use crate::game::session::{PlayerId, Session};
use crate::state::AppState;
use crate::ws::actor;

/// Name given to the game created when a player connects and no game is open.
pub const DEFAULT_GAME_NAME: &str = "Rookie of the Year";

/// Query parameters for the player WebSocket.
///
/// `game` picks a game (default: the oldest one still in its lobby, or a new
/// one). `player` re-attaches to an existing player; otherwise a new player
/// named `name` joins.
#[derive(Debug, Default, Deserialize)]
pub struct PlayerWsQuery {
    pub game: Option<String>,
    pub name: Option<String>,
    pub player: Option<String>,
}

/// WebSocket close codes for rejected player connections:
/// 4004 = unknown game or player
/// 4009 = game already running
/// 1011 = server error
const CLOSE_NOT_FOUND: u16 = 4004;
const CLOSE_GAME_ACTIVE: u16 = 4009;
const CLOSE_INTERNAL: u16 = 1011;

/// GET /ws/game?game=&name=&player=
/// Admission happens after the upgrade so a rejection can carry a close code.
pub async fn player_ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<PlayerWsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_player(socket, state, params))
}

/// GET /ws/admin
pub async fn admin_ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| actor::run_admin_connection(socket, state))
}

async fn handle_player(mut socket: WebSocket, state: AppState, params: PlayerWsQuery) {
    match admit_player(&state, params).await {
        Ok((session, player_id)) => {
            actor::run_player_connection(socket, state, session, player_id).await;
        }
        Err(err) => {
            let (close_code, reason) = match &err {
                GameError::NotFound(_) => (CLOSE_NOT_FOUND, "Not found"),
                GameError::InvalidState(_) => (CLOSE_GAME_ACTIVE, "Game already active"),
                _ => (CLOSE_INTERNAL, "Internal error"),
            };

            tracing::warn!(
                close_code = close_code,
                error = %err,
                "Player WebSocket rejected"
            );

            let close_frame = CloseFrame {
                code: close_code,
                reason: reason.into(),
            };
            let _ = socket.send(Message::Close(Some(close_frame))).await;
        }
    }
}

/// Resolve the target game and the player this connection represents.
async fn admit_player(
    state: &AppState,
    params: PlayerWsQuery,
) -> Result<(Arc<Session>, PlayerId), GameError> {
    let session = match params.game.filter(|id| !id.is_empty()) {
        Some(id) => state.registry.get(&id)?,
        None => match state.registry.first_open() {
            Some(session) => session,
            None => {
                let registry = state.registry.clone();
                tokio::task::spawn_blocking(move || registry.create(DEFAULT_GAME_NAME)).await??
            }
        },
    };

    if let Some(player_id) = params.player.filter(|id| !id.is_empty()) {
        if !session.has_player(&player_id) {
            return Err(GameError::NotFound(format!("player not found: {}", player_id)));
        }
        return Ok((session, player_id));
    }

    let name = params
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Player_{}", Utc::now().timestamp_millis()));
    let player_id = session.join(&name)?;
    Ok((session, player_id))
}
