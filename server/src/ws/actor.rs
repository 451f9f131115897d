use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use crate::game::session::{PlayerId, Session};
use crate::state::AppState;
use crate::ws::protocol::{self, ServerEvent};
use crate::error::TransportError;
use crate::ws::ConnectionHandle;

/// Server sends a WebSocket ping every 30 seconds.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// A ping left unanswered this long closes the connection.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run one player connection until the socket closes, the hub evicts it,
/// or a write stalls.
///
/// The writer task owns the sink and drains the bounded queue that the hub
/// fills. The reader loop here handles inbound frames. On exit the player is
/// removed from its game unless a newer connection has replaced this one.
pub async fn run_player_connection(
    socket: WebSocket,
    state: AppState,
    session: Arc<Session>,
    player_id: PlayerId,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (conn, rx) = state.hub.open_connection(state.outbound_queue);

    if let Err(e) = session.attach_connection(&player_id, conn.id) {
        tracing::warn!(
            game_id = %session.id(),
            player_id = %player_id,
            error = %e,
            "Player vanished before its connection attached"
        );
        return;
    }
    state.hub.register_player(session.id(), &player_id, conn.clone());

    tracing::info!(
        game_id = %session.id(),
        player_id = %player_id,
        connection = conn.id,
        "Player connection started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx, state.write_timeout));
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_handle = spawn_keepalive(conn.clone(), pong_rx);

    state
        .hub
        .broadcast_to_players(&session, &ServerEvent::player_joined(&session));
    state
        .hub
        .broadcast_to_admins(&ServerEvent::player_list(&session));

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                let keep_going = handle_incoming(incoming, &conn, &pong_tx, |text| {
                    protocol::handle_text_message(text, &state, &session, &player_id);
                });
                if !keep_going {
                    break;
                }
            }
            _ = conn.closed() => {
                tracing::info!(player_id = %player_id, connection = conn.id, "Connection closed by hub");
                break;
            }
            _ = &mut writer_handle => {
                tracing::info!(player_id = %player_id, connection = conn.id, "Writer stopped");
                break;
            }
        }
    }

    writer_handle.abort();
    ping_handle.abort();

    state.hub.disconnect_player(&session, &player_id, conn.id);

    tracing::info!(
        game_id = %session.id(),
        player_id = %player_id,
        connection = conn.id,
        "Player connection stopped"
    );
}

/// Run one admin connection. The admin first receives a `gameStatus` for
/// every game, then every admin-bound event until it disconnects.
///
/// The connect-time snapshot is written straight to the socket before the
/// writer task starts, so its size is bounded by the registry and not by the
/// outbound queue. Events broadcast meanwhile wait in the queue behind it.
pub async fn run_admin_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (conn, rx) = state.hub.open_connection(state.outbound_queue);
    state.hub.register_admin(conn.clone());

    tracing::info!(connection = conn.id, "Admin connection started");

    let snapshot = send_game_statuses(&mut ws_sender, &state).await;
    match &snapshot {
        Ok(count) => tracing::debug!(connection = conn.id, count, "Sent game statuses"),
        Err(e) => tracing::warn!(connection = conn.id, error = %e, "Failed to send game status"),
    }

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx, state.write_timeout));
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_handle = spawn_keepalive(conn.clone(), pong_rx);

    while snapshot.is_ok() {
        tokio::select! {
            incoming = ws_receiver.next() => {
                let keep_going = handle_incoming(incoming, &conn, &pong_tx, |text| {
                    tracing::debug!(
                        connection = conn.id,
                        "Ignoring admin message: {}",
                        text.chars().take(100).collect::<String>()
                    );
                });
                if !keep_going {
                    break;
                }
            }
            _ = conn.closed() => break,
            _ = &mut writer_handle => break,
        }
    }

    writer_handle.abort();
    ping_handle.abort();
    state.hub.unregister_admin(conn.id);

    tracing::info!(connection = conn.id, "Admin connection stopped");
}

/// One `gameStatus` frame per registered game, oldest first.
async fn send_game_statuses(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
) -> Result<usize, TransportError> {
    let sessions = state.registry.list_all();
    for session in &sessions {
        let frame = ServerEvent::game_status(session).encode()?;
        write_frame(ws_sender, frame, state.write_timeout).await?;
    }
    Ok(sessions.len())
}

/// Process one item from the socket stream. Returns false when the
/// connection should shut down.
fn handle_incoming(
    incoming: Option<Result<Message, axum::Error>>,
    conn: &ConnectionHandle,
    pong_tx: &mpsc::UnboundedSender<()>,
    on_text: impl FnOnce(&str),
) -> bool {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            on_text(text.as_str());
            true
        }
        Some(Ok(Message::Binary(_))) => {
            tracing::debug!(connection = conn.id, "Ignoring binary frame");
            true
        }
        Some(Ok(Message::Pong(_))) => {
            let _ = pong_tx.send(());
            true
        }
        Some(Ok(Message::Ping(data))) => {
            let _ = conn.deliver(Message::Pong(data));
            true
        }
        Some(Ok(Message::Close(frame))) => {
            tracing::info!(connection = conn.id, reason = ?frame, "Client initiated close");
            false
        }
        Some(Err(e)) => {
            tracing::warn!(connection = conn.id, error = %e, "WebSocket receive error");
            false
        }
        None => {
            tracing::info!(connection = conn.id, "WebSocket stream ended");
            false
        }
    }
}

/// Periodic pings; a missing pong closes the connection.
fn spawn_keepalive(
    conn: ConnectionHandle,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if conn.deliver(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                conn.close();
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!(connection = conn.id, "Pong timeout, closing connection");
                    let _ = conn.deliver(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    conn.close();
                    break;
                }
            }
        }
    })
}

/// Write one frame, giving up after `write_timeout`.
async fn write_frame(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    write_timeout: Duration,
) -> Result<(), TransportError> {
    match timeout(write_timeout, ws_sender.send(msg)).await {
        Ok(result) => result.map_err(TransportError::from),
        Err(_) => Err(TransportError::WriteTimeout(write_timeout)),
    }
}

/// Forward queued frames to the socket. Each write is bounded by
/// `write_timeout`; a stalled or failed write ends the task.
async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
    write_timeout: Duration,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        match write_frame(&mut ws_sender, msg, write_timeout).await {
            Ok(()) => {}
            Err(e @ TransportError::WriteTimeout(_)) => {
                tracing::warn!(error = %e, "WebSocket write stalled");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket send failed");
                break;
            }
        }
        if closing {
            break;
        }
    }
}
