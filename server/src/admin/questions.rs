use axum::{extract::State, http::StatusCode, Json};

use crate::error::GameError;
use crate::game::question::{NewQuestion, Question};
use crate::state::AppState;

/// POST /api/admin/questions
/// Games already started keep the questions they snapshotted.
pub async fn add_question(
    State(state): State<AppState>,
    Json(req): Json<NewQuestion>,
) -> Result<(StatusCode, Json<Question>), GameError> {
    let bank = state.questions.clone();
    let question = tokio::task::spawn_blocking(move || bank.add(req)).await??;
    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/admin/questions
pub async fn list_questions(State(state): State<AppState>) -> Json<Vec<Question>> {
    Json(state.questions.all())
}
