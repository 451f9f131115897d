use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::game::bank::QuestionBank;
use crate::game::registry::SessionRegistry;
use crate::ws::Hub;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// All games, live and finished
    pub registry: Arc<SessionRegistry>,
    /// Global question bank snapshotted into each game at start
    pub questions: Arc<QuestionBank>,
    /// Player and admin WebSocket connections
    pub hub: Hub,
    /// Deadline for a single outbound WebSocket write
    pub write_timeout: Duration,
    /// Bounded outbound queue length per connection
    pub outbound_queue: usize,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>, questions: Arc<QuestionBank>, config: &Config) -> Self {
        Self {
            registry,
            questions,
            hub: Hub::new(),
            write_timeout: Duration::from_millis(config.write_timeout_ms),
            outbound_queue: config.outbound_queue,
        }
    }
}
