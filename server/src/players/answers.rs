use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::error::GameError;
use crate::game::session::AnswerReceipt;
use crate::state::AppState;
use crate::ws::protocol::ServerEvent;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub player_id: String,
    pub answer: String,
}

/// POST /api/games/{id}/answers
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerReceipt>, GameError> {
    let session = state.registry.get(&id)?;
    let receipt = session.submit_answer(&req.player_id, &req.answer)?;

    state.hub.broadcast_to_admins(&ServerEvent::player_answered(
        session.id(),
        &req.player_id,
        receipt.question_id,
        receipt.score,
    ));
    Ok(Json(receipt))
}
