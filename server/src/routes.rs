use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::admin::{games, questions};
use crate::players::{answers, join};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Host controls: game lifecycle and question bank
    let admin_routes = Router::new()
        .route(
            "/api/admin/games",
            post(games::create_game)
                .get(games::list_games)
                .delete(games::clear_games),
        )
        .route("/api/admin/games/{id}", get(games::get_game))
        .route("/api/admin/games/{id}/players", get(games::list_players))
        .route("/api/admin/games/{id}/start", post(games::start_game))
        .route("/api/admin/games/{id}/next", post(games::next_question))
        .route("/api/admin/games/{id}/end", post(games::end_game))
        .route(
            "/api/admin/questions",
            get(questions::list_questions).post(questions::add_question),
        );

    // Player actions over HTTP
    let player_routes = Router::new()
        .route("/api/games/{id}/join", post(join::join_game))
        .route("/api/games/{id}/answers", post(answers::submit_answer))
        .route(
            "/api/games/{id}/players/{player_id}",
            delete(join::leave_game),
        );

    // WebSocket endpoints (upgrade from HTTP)
    let ws_routes = Router::new()
        .route("/ws/game", get(ws_handler::player_ws_upgrade))
        .route("/ws/admin", get(ws_handler::admin_ws_upgrade));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(admin_routes)
        .merge(player_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
