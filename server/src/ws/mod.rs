pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

use crate::error::TransportError;

pub use broadcast::Hub;

/// Process-unique id of one WebSocket connection.
pub type ConnectionId = u64;

/// Sender half of a connection's bounded outbound queue.
/// The connection's writer task owns the receiving half and the socket sink.
pub type ConnectionSender = mpsc::Sender<Message>;

/// Everything the hub needs to reach one connection: its outbound queue and
/// a signal that tells the connection's actor to shut down.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    sender: ConnectionSender,
    close: Arc<Notify>,
}

impl ConnectionHandle {
    /// A handle plus the receiver its writer task should drain.
    pub fn new(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (sender, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id,
                sender,
                close: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    /// Enqueue a frame without waiting. A full queue counts as a failed write.
    pub fn deliver(&self, msg: Message) -> Result<(), TransportError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Ask the owning actor to close the connection.
    pub fn close(&self) {
        self.close.notify_one();
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        self.close.notified().await;
    }
}
