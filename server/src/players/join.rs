use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::game::session::PlayerView;
use crate::state::AppState;
use crate::ws::protocol::ServerEvent;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub game_id: String,
    pub player_id: String,
    pub players: Vec<PlayerView>,
}

/// POST /api/games/{id}/join
///
/// The returned player id is what `/ws/game?player=` expects.
pub async fn join_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<(StatusCode, Json<JoinResponse>), GameError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(GameError::Validation("player name must not be empty".to_string()));
    }

    let session = state.registry.get(&id)?;
    let player_id = session.join(name)?;

    state
        .hub
        .broadcast_to_players(&session, &ServerEvent::player_joined(&session));
    state
        .hub
        .broadcast_to_admins(&ServerEvent::player_list(&session));

    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            game_id: session.id().to_string(),
            player_id,
            players: session.roster(),
        }),
    ))
}

/// DELETE /api/games/{id}/players/{player_id}
pub async fn leave_game(
    State(state): State<AppState>,
    Path((id, player_id)): Path<(String, String)>,
) -> Result<StatusCode, GameError> {
    let session = state.registry.get(&id)?;
    state.hub.remove_player(&session, &player_id)?;
    Ok(StatusCode::NO_CONTENT)
}
