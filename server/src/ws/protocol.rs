//! Real-time message schema and inbound dispatch.
//!
//! Every frame is JSON `{ "kind": ..., "payload": { ... } }`. Outbound kinds
//! are the closed `ServerEvent` set; the only inbound kind is `answer`.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::game::question::Question;
use crate::game::session::{GamePhase, PlayerView, Session, SessionStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPayload {
    pub players: Vec<PlayerView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftPayload {
    pub player_id: String,
    pub players: Vec<PlayerView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub state: GamePhase,
    pub message: String,
    pub players: Vec<PlayerView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub state: GamePhase,
    pub message: String,
    pub questions: Vec<Question>,
    pub game_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAnsweredPayload {
    pub game_id: String,
    pub player_id: String,
    pub question_id: u32,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerListPayload {
    pub game_id: String,
    pub players: Vec<PlayerView>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatusPayload {
    pub game_id: String,
    pub status: SessionStatus,
}

/// Outbound events. Players receive the first four kinds, admins the rest
/// (plus `playerLeft`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    PlayerJoined(RosterPayload),
    PlayerLeft(PlayerLeftPayload),
    GameState(GameStatePayload),
    Question(QuestionPayload),
    PlayerAnswered(PlayerAnsweredPayload),
    PlayerList(PlayerListPayload),
    GameStatus(GameStatusPayload),
}

impl ServerEvent {
    pub fn player_joined(session: &Session) -> Self {
        Self::PlayerJoined(RosterPayload {
            players: session.roster(),
        })
    }

    pub fn player_left(player_id: &str, remaining: Vec<PlayerView>) -> Self {
        Self::PlayerLeft(PlayerLeftPayload {
            player_id: player_id.to_string(),
            players: remaining,
        })
    }

    pub fn game_state(session: &Session, message: impl Into<String>) -> Self {
        Self::GameState(GameStatePayload {
            state: session.phase(),
            message: message.into(),
            players: session.roster(),
        })
    }

    pub fn question(session: &Session, message: impl Into<String>) -> Self {
        Self::Question(QuestionPayload {
            state: session.phase(),
            message: message.into(),
            questions: session.questions(),
            game_id: session.id().to_string(),
        })
    }

    pub fn player_answered(game_id: &str, player_id: &str, question_id: u32, score: u32) -> Self {
        Self::PlayerAnswered(PlayerAnsweredPayload {
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            question_id,
            score,
        })
    }

    pub fn player_list(session: &Session) -> Self {
        let status = session.status();
        Self::PlayerList(PlayerListPayload {
            game_id: status.id,
            players: status.players,
            is_active: status.is_active,
        })
    }

    pub fn game_status(session: &Session) -> Self {
        Self::GameStatus(GameStatusPayload {
            game_id: session.id().to_string(),
            status: session.status(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayerJoined(_) => "playerJoined",
            Self::PlayerLeft(_) => "playerLeft",
            Self::GameState(_) => "gameState",
            Self::Question(_) => "question",
            Self::PlayerAnswered(_) => "playerAnswered",
            Self::PlayerList(_) => "playerList",
            Self::GameStatus(_) => "gameStatus",
        }
    }

    /// Serialize once into a text frame that can be cloned per recipient.
    pub fn encode(&self) -> Result<Message, TransportError> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerPayload {
    pub answer: String,
}

/// Inbound player messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    Answer(AnswerPayload),
}

/// Handle an incoming text frame from a player connection.
/// Malformed frames and rejected answers are logged and dropped.
pub fn handle_text_message(text: &str, state: &AppState, session: &Session, player_id: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(
                game_id = %session.id(),
                player_id = %player_id,
                error = %e,
                "Ignoring malformed client message"
            );
            return;
        }
    };

    match message {
        ClientMessage::Answer(AnswerPayload { answer }) => {
            match session.submit_answer(player_id, &answer) {
                Ok(receipt) => {
                    state.hub.broadcast_to_admins(&ServerEvent::player_answered(
                        session.id(),
                        player_id,
                        receipt.question_id,
                        receipt.score,
                    ));
                }
                Err(e) => {
                    tracing::debug!(
                        game_id = %session.id(),
                        player_id = %player_id,
                        error = %e,
                        "Answer rejected"
                    );
                }
            }
        }
    }
}
