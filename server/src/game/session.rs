//! One trivia game: roster, question snapshot, round counter and lifecycle.
//!
//! Every mutable field lives behind a single `RwLock`. State transitions take
//! it exclusively; roster and status snapshots take it shared. No method
//! performs I/O while holding the lock.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use crate::db::sessions::SessionRecord;
use crate::error::GameError;
use crate::game::question::{Question, POINTS_PER_CORRECT};
use crate::ws::ConnectionId;

pub type SessionId = String;
pub type PlayerId = String;

/// Lifecycle label of a session. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Lobby,
    Active,
    Ended,
}

/// A participant. Holds no transport handle, only the id of the
/// connection that currently represents it.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    /// question id -> last submitted answer
    pub answers: HashMap<u32, String>,
    pub connection: Option<ConnectionId>,
    seq: u64,
}

/// Roster entry sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub answered: usize,
}

impl From<&Player> for PlayerView {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            answered: p.answers.len(),
        }
    }
}

/// Point-in-time snapshot of a session for admins and the HTTP API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub id: SessionId,
    pub name: String,
    pub state: GamePhase,
    pub is_active: bool,
    pub round: usize,
    pub total_questions: usize,
    pub current_question: Option<Question>,
    pub players: Vec<PlayerView>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Outcome of one accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReceipt {
    pub question_id: u32,
    pub correct: bool,
    /// Player's running score after this answer.
    pub score: u32,
}

#[derive(Debug, Default)]
struct SessionState {
    players: HashMap<PlayerId, Player>,
    questions: Vec<Question>,
    round: usize,
    /// Index into `questions`; set iff active and round >= 1.
    current: Option<usize>,
    active: bool,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    next_player_seq: u64,
}

impl SessionState {
    fn phase(&self) -> GamePhase {
        if self.active {
            GamePhase::Active
        } else if self.ended_at.is_some() {
            GamePhase::Ended
        } else {
            GamePhase::Lobby
        }
    }

    fn roster(&self) -> Vec<PlayerView> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.seq);
        players.into_iter().map(PlayerView::from).collect()
    }

    fn current_question(&self) -> Option<&Question> {
        self.current.and_then(|i| self.questions.get(i))
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    state: RwLock<SessionState>,
}

impl Session {
    /// A fresh session in the lobby.
    pub fn new(id: SessionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Rebuild a session from its persisted snapshot. The roster starts empty.
    pub fn restore(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            state: RwLock::new(SessionState {
                questions: record.questions,
                active: record.is_active,
                started_at: record.started_at,
                ended_at: record.ended_at,
                ..SessionState::default()
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a player to the lobby. Rejected while the game is active.
    pub fn join(&self, name: &str) -> Result<PlayerId, GameError> {
        let mut state = self.state.write();
        if state.active {
            return Err(GameError::InvalidState(
                "cannot join an active game".to_string(),
            ));
        }

        state.next_player_seq += 1;
        let seq = state.next_player_seq;
        let id = format!("player_{}", seq);
        state.players.insert(
            id.clone(),
            Player {
                id: id.clone(),
                name: name.to_string(),
                score: 0,
                answers: HashMap::new(),
                connection: None,
                seq,
            },
        );

        tracing::debug!(game_id = %self.id, player_id = %id, "Player joined");
        Ok(id)
    }

    /// Record which connection currently represents `player_id`.
    pub fn attach_connection(
        &self,
        player_id: &str,
        connection: ConnectionId,
    ) -> Result<(), GameError> {
        let mut state = self.state.write();
        let player = state
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::NotFound(format!("player not found: {}", player_id)))?;
        player.connection = Some(connection);
        Ok(())
    }

    /// Remove a player and return the remaining roster.
    ///
    /// When `connection` is given, the player is only removed if that
    /// connection still represents it, so a stale socket closing after a
    /// reconnect leaves the player in place. Returns `None` if nothing was removed.
    pub fn remove_player(
        &self,
        player_id: &str,
        connection: Option<ConnectionId>,
    ) -> Option<Vec<PlayerView>> {
        let mut state = self.state.write();
        let current = state.players.get(player_id)?.connection;
        if connection.is_some() && current != connection {
            return None;
        }
        state.players.remove(player_id);
        tracing::debug!(game_id = %self.id, player_id = %player_id, "Player removed");
        Some(state.roster())
    }

    /// Snapshot `questions` into the session and open the first round.
    pub fn start(&self, questions: Vec<Question>) -> Result<(), GameError> {
        let mut state = self.state.write();
        match state.phase() {
            GamePhase::Active => {
                return Err(GameError::InvalidState("game already active".to_string()))
            }
            GamePhase::Ended => {
                return Err(GameError::InvalidState("game has ended".to_string()))
            }
            GamePhase::Lobby => {}
        }
        if questions.is_empty() {
            return Err(GameError::Validation("no questions available".to_string()));
        }
        if state.players.is_empty() {
            return Err(GameError::Validation("no players joined".to_string()));
        }

        state.questions = questions;
        state.active = true;
        state.round = 0;
        state.current = None;
        state.started_at = Some(Utc::now());

        tracing::info!(
            game_id = %self.id,
            players = state.players.len(),
            questions = state.questions.len(),
            "Game started"
        );
        Ok(())
    }

    /// Advance to the next question and return it.
    pub fn next_question(&self) -> Result<Question, GameError> {
        let mut state = self.state.write();
        if !state.active {
            return Err(GameError::InvalidState("game is not active".to_string()));
        }
        if state.round >= state.questions.len() {
            return Err(GameError::Exhausted);
        }

        state.round += 1;
        let index = state.round - 1;
        state.current = Some(index);
        Ok(state.questions[index].clone())
    }

    /// Record `answer` for the current question.
    ///
    /// A correct answer is credited immediately; resubmissions overwrite the
    /// stored answer. `end` recomputes scores from the stored answers.
    pub fn submit_answer(&self, player_id: &str, answer: &str) -> Result<AnswerReceipt, GameError> {
        let mut guard = self.state.write();
        let SessionState {
            players,
            questions,
            current,
            ..
        } = &mut *guard;

        let player = players
            .get_mut(player_id)
            .ok_or_else(|| GameError::NotFound(format!("player not found: {}", player_id)))?;
        let question = current
            .and_then(|i| questions.get(i))
            .ok_or_else(|| GameError::InvalidState("no active question".to_string()))?;

        player.answers.insert(question.id, answer.to_string());
        let correct = question.accepts(answer);
        if correct {
            player.score += POINTS_PER_CORRECT;
        }
        Ok(AnswerReceipt {
            question_id: question.id,
            correct,
            score: player.score,
        })
    }

    /// Close the game and recompute every score from the answer history.
    /// Calling it again changes nothing.
    pub fn end(&self) {
        let mut guard = self.state.write();
        let SessionState {
            players,
            questions,
            round,
            current,
            active,
            ended_at,
            ..
        } = &mut *guard;

        *active = false;
        *current = None;
        if ended_at.is_none() {
            *ended_at = Some(Utc::now());
        }

        for player in players.values_mut() {
            let correct = player
                .answers
                .iter()
                .filter(|(question_id, answer)| {
                    questions
                        .iter()
                        .any(|q| q.id == **question_id && q.accepts(answer))
                })
                .count() as u32;
            player.score = correct * POINTS_PER_CORRECT;
        }

        tracing::info!(game_id = %self.id, round = *round, "Game ended");
    }

    pub fn phase(&self) -> GamePhase {
        self.state.read().phase()
    }

    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    pub fn round(&self) -> usize {
        self.state.read().round
    }

    pub fn current_question(&self) -> Option<Question> {
        self.state.read().current_question().cloned()
    }

    pub fn questions(&self) -> Vec<Question> {
        self.state.read().questions.clone()
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.state.read().players.contains_key(player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<Player> {
        self.state.read().players.get(player_id).cloned()
    }

    /// Players in join order.
    pub fn roster(&self) -> Vec<PlayerView> {
        self.state.read().roster()
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.read();
        SessionStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            state: state.phase(),
            is_active: state.active,
            round: state.round,
            total_questions: state.questions.len(),
            current_question: state.current_question().cloned(),
            players: state.roster(),
            start_time: state.started_at,
            end_time: state.ended_at,
        }
    }

    /// The persisted shape of this session (roster excluded).
    pub fn record(&self) -> SessionRecord {
        let state = self.state.read();
        SessionRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            is_active: state.active,
            started_at: state.started_at,
            ended_at: state.ended_at,
            questions: state.questions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::question::QuestionKind;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn question(id: u32, correct: &str) -> Question {
        Question {
            id,
            text: format!("question {}", id),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            kind: QuestionKind::Single,
            correct: correct.to_string(),
            time_limit_secs: None,
        }
    }

    fn two_plus_two() -> Question {
        Question {
            id: 1,
            text: "2+2?".to_string(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            kind: QuestionKind::Single,
            correct: "4".to_string(),
            time_limit_secs: None,
        }
    }

    #[test]
    fn single_question_game_scenario() {
        let session = Session::new("game_1".to_string(), "S");
        let p1 = session.join("P1").unwrap();

        session.start(vec![two_plus_two()]).unwrap();
        assert!(session.is_active());
        assert_eq!(session.round(), 0);
        assert!(session.current_question().is_none());

        let q = session.next_question().unwrap();
        assert_eq!(q.text, "2+2?");
        assert_eq!(session.round(), 1);

        let receipt = session.submit_answer(&p1, "4").unwrap();
        assert_eq!(
            receipt,
            AnswerReceipt {
                question_id: 1,
                correct: true,
                score: 10
            }
        );
        assert!(matches!(session.next_question(), Err(GameError::Exhausted)));
        assert_eq!(session.round(), 1);

        session.end();
        assert_eq!(session.player(&p1).unwrap().score, 10);
        assert_eq!(session.phase(), GamePhase::Ended);
    }

    #[test]
    fn start_without_players_is_rejected() {
        let session = Session::new("game_1".to_string(), "S");
        let err = session.start(vec![two_plus_two()]).unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
        assert!(!session.is_active());
    }

    #[test]
    fn start_without_questions_is_rejected() {
        let session = Session::new("game_1".to_string(), "S");
        session.join("P1").unwrap();
        let err = session.start(Vec::new()).unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
        assert!(!session.is_active());
        assert_eq!(session.phase(), GamePhase::Lobby);
    }

    #[test]
    fn join_is_rejected_only_while_active() {
        let session = Session::new("game_1".to_string(), "S");
        session.join("early").unwrap();
        session.start(vec![two_plus_two()]).unwrap();

        let err = session.join("late").unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
        assert_eq!(session.roster().len(), 1);

        session.end();
        assert!(session.join("after").is_ok());
    }

    #[test]
    fn start_is_rejected_after_end_or_while_active() {
        let session = Session::new("game_1".to_string(), "S");
        session.join("P1").unwrap();
        session.start(vec![two_plus_two()]).unwrap();
        assert!(matches!(
            session.start(vec![two_plus_two()]),
            Err(GameError::InvalidState(_))
        ));

        session.end();
        assert!(matches!(
            session.start(vec![two_plus_two()]),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn next_question_requires_active_game() {
        let session = Session::new("game_1".to_string(), "S");
        assert!(matches!(
            session.next_question(),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn round_never_exceeds_question_count() {
        let session = Session::new("game_1".to_string(), "S");
        session.join("P1").unwrap();
        session
            .start(vec![question(1, "3"), question(2, "4"), question(3, "5")])
            .unwrap();

        for _ in 0..10 {
            let _ = session.next_question();
            let round = session.round();
            assert!(round <= 3);
            assert_eq!(session.current_question().map(|q| q.id), Some(round as u32));
        }
        assert_eq!(session.round(), 3);
    }

    #[test]
    fn answer_errors() {
        let session = Session::new("game_1".to_string(), "S");
        let p1 = session.join("P1").unwrap();

        assert!(matches!(
            session.submit_answer("player_99", "4"),
            Err(GameError::NotFound(_))
        ));
        assert!(matches!(
            session.submit_answer(&p1, "4"),
            Err(GameError::InvalidState(_))
        ));

        session.start(vec![two_plus_two()]).unwrap();
        assert!(matches!(
            session.submit_answer(&p1, "4"),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn end_recomputes_scores_and_is_idempotent() {
        let session = Session::new("game_1".to_string(), "S");
        let p1 = session.join("P1").unwrap();
        let p2 = session.join("P2").unwrap();
        session
            .start(vec![question(1, "4"), question(2, "5")])
            .unwrap();

        session.next_question().unwrap();
        // Correct answer submitted twice: the immediate score drifts to 20.
        session.submit_answer(&p1, "4").unwrap();
        assert_eq!(session.submit_answer(&p1, "4").unwrap().score, 20);
        session.submit_answer(&p2, "3").unwrap();

        session.next_question().unwrap();
        session.submit_answer(&p1, "6").unwrap();
        session.submit_answer(&p2, "5").unwrap();

        session.end();
        assert_eq!(session.player(&p1).unwrap().score, 10);
        assert_eq!(session.player(&p2).unwrap().score, 10);

        let ended_at = session.status().end_time;
        session.end();
        assert_eq!(session.player(&p1).unwrap().score, 10);
        assert_eq!(session.player(&p2).unwrap().score, 10);
        assert_eq!(session.status().end_time, ended_at);
    }

    #[test]
    fn resubmission_overwrites_answer() {
        let session = Session::new("game_1".to_string(), "S");
        let p1 = session.join("P1").unwrap();
        session.start(vec![two_plus_two()]).unwrap();
        session.next_question().unwrap();

        session.submit_answer(&p1, "4").unwrap();
        session.submit_answer(&p1, "5").unwrap();
        assert_eq!(session.player(&p1).unwrap().answers.get(&1).unwrap(), "5");

        session.end();
        assert_eq!(session.player(&p1).unwrap().score, 0);
    }

    #[test]
    fn concurrent_joins_get_distinct_ids() {
        let session = Arc::new(Session::new("game_1".to_string(), "S"));
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let session = session.clone();
                std::thread::spawn(move || session.join(&format!("P{}", i)).unwrap())
            })
            .collect();

        let ids: HashSet<PlayerId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 32);
        assert_eq!(session.roster().len(), 32);
    }

    #[test]
    fn player_ids_are_not_reused_after_leave() {
        let session = Session::new("game_1".to_string(), "S");
        let p1 = session.join("P1").unwrap();
        let p2 = session.join("P2").unwrap();
        session.remove_player(&p1, None).unwrap();
        let p3 = session.join("P3").unwrap();
        assert_ne!(p3, p2);
        assert_eq!(
            session.roster().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec![p2.as_str(), p3.as_str()]
        );
    }

    #[test]
    fn stale_connection_does_not_remove_player() {
        let session = Session::new("game_1".to_string(), "S");
        let p1 = session.join("P1").unwrap();
        session.attach_connection(&p1, 1).unwrap();
        session.attach_connection(&p1, 2).unwrap();

        assert!(session.remove_player(&p1, Some(1)).is_none());
        assert!(session.has_player(&p1));
        assert_eq!(session.remove_player(&p1, Some(2)), Some(Vec::new()));
        assert!(session.remove_player(&p1, Some(2)).is_none());
    }

    #[test]
    fn record_round_trips_through_restore() {
        let session = Session::new("game_7".to_string(), "Quiz night");
        session.join("P1").unwrap();
        session.start(vec![two_plus_two()]).unwrap();

        let record = session.record();
        let restored = Session::restore(record.clone());
        assert_eq!(restored.record(), record);
        assert!(restored.roster().is_empty());
        assert!(restored.is_active());
    }
}
