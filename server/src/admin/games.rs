use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::GameError;
use crate::game::question::Question;
use crate::game::session::{PlayerView, SessionStatus};
use crate::state::AppState;
use crate::ws::handler::DEFAULT_GAME_NAME;
use crate::ws::protocol::ServerEvent;

#[derive(Debug, Default, Deserialize)]
pub struct CreateGameRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// POST /api/admin/games
pub async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<SessionStatus>), GameError> {
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_GAME_NAME.to_string());

    let registry = state.registry.clone();
    let session = tokio::task::spawn_blocking(move || registry.create(&name)).await??;

    state
        .hub
        .broadcast_to_admins(&ServerEvent::game_status(&session));
    Ok((StatusCode::CREATED, Json(session.status())))
}

/// GET /api/admin/games
pub async fn list_games(State(state): State<AppState>) -> Json<Vec<SessionStatus>> {
    Json(
        state
            .registry
            .list_all()
            .iter()
            .map(|session| session.status())
            .collect(),
    )
}

/// GET /api/admin/games/{id}
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, GameError> {
    Ok(Json(state.registry.get(&id)?.status()))
}

/// GET /api/admin/games/{id}/players
pub async fn list_players(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PlayerView>>, GameError> {
    Ok(Json(state.registry.get(&id)?.roster()))
}

/// POST /api/admin/games/{id}/start
///
/// Snapshots the current question bank into the game.
pub async fn start_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, GameError> {
    let session = state.registry.get(&id)?;
    session.start(state.questions.all())?;

    state.hub.broadcast_to_players(
        &session,
        &ServerEvent::game_state(&session, "Game has started!"),
    );
    state
        .hub
        .broadcast_to_admins(&ServerEvent::player_list(&session));
    Ok(Json(session.status()))
}

/// POST /api/admin/games/{id}/next
pub async fn next_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Question>, GameError> {
    let session = state.registry.get(&id)?;
    let question = session.next_question()?;

    let message = format!(
        "Question {} of {}",
        session.round(),
        session.status().total_questions
    );
    state
        .hub
        .broadcast_to_players(&session, &ServerEvent::question(&session, message));
    state
        .hub
        .broadcast_to_admins(&ServerEvent::game_status(&session));
    Ok(Json(question))
}

/// POST /api/admin/games/{id}/end
///
/// Final scores are broadcast even if persisting the ended game fails.
pub async fn end_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, GameError> {
    let session = state.registry.get(&id)?;

    let registry = state.registry.clone();
    let persisted = tokio::task::spawn_blocking(move || registry.end(&id)).await?;

    state
        .hub
        .broadcast_to_players(&session, &ServerEvent::game_state(&session, "Game over!"));
    state
        .hub
        .broadcast_to_admins(&ServerEvent::player_list(&session));

    persisted?;
    Ok(Json(session.status()))
}

/// DELETE /api/admin/games
///
/// Closes every player connection, then forgets all games.
pub async fn clear_games(State(state): State<AppState>) -> Result<StatusCode, GameError> {
    state.hub.disconnect_all_players();

    let registry = state.registry.clone();
    tokio::task::spawn_blocking(move || registry.clear_all()).await??;
    Ok(StatusCode::NO_CONTENT)
}
