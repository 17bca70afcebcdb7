//! Viewer channel: one WebSocket per viewer at `/ws?sessionId=<id>`.
//!
//! The session id is resolved before any message is exchanged. Once
//! attached, pty output flows out as `output` frames and `input`/`resize`
//! frames flow into the pty. Malformed frames are dropped.

use crate::server::AppState;
use crate::session::{Session, Viewer};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use webterm_core::{
    clamp_dimension, codec, status, ClientMessage, ServerMessage, TermError, TermResult,
    DEFAULT_COLS, DEFAULT_ROWS,
};

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

/// Query string of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ChannelQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ChannelQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.session_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
        debug!("viewer connected without sessionId");
        close_with_status(&mut sender, status::MISSING_SESSION_ID).await;
        return;
    };

    let Some(session) = state.registry.get(&session_id).await else {
        debug!(session_id = %session_id, "viewer asked for unknown session");
        close_with_status(&mut sender, status::UNKNOWN_SESSION).await;
        return;
    };

    // The shell may exit between lookup and attach.
    let Some(mut viewer) = session.attach() else {
        close_with_status(&mut sender, status::SESSION_EXITED).await;
        return;
    };

    info!(session_id = %session_id, viewer = viewer.id(), "viewer connected");

    if let Err(e) = viewer_loop(&mut sender, &mut receiver, &mut viewer).await {
        warn!(session_id = %session_id, viewer = viewer.id(), error = %e, "viewer connection failed");
        close_with_status(&mut sender, &status::error(&e)).await;
    }

    info!(session_id = %session_id, viewer = viewer.id(), "viewer disconnected");
}

/// Shuttle frames until either side goes away.
async fn viewer_loop(
    sender: &mut WsSender,
    receiver: &mut WsReceiver,
    viewer: &mut Viewer,
) -> TermResult<()> {
    loop {
        tokio::select! {
            outbound = viewer.recv() => match outbound {
                Some(msg) => {
                    send(sender, &msg).await?;
                }
                // Session closed; its final status was the last message.
                None => {
                    let _ = sender.send(Message::Close(None)).await;
                    return Ok(());
                }
            },

            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => match codec::decode::<ClientMessage>(&text) {
                    Ok(msg) => dispatch(viewer.session(), msg),
                    Err(e) => debug!(error = %e, "dropping malformed frame"),
                },
                Some(Ok(Message::Binary(data))) => match codec::decode_bytes::<ClientMessage>(&data) {
                    Ok(msg) => dispatch(viewer.session(), msg),
                    Err(e) => debug!(error = %e, "dropping malformed binary frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    sender
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| TermError::Transport(e.to_string()))?;
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket receive failed");
                    return Ok(());
                }
            },
        }
    }
}

/// Apply one client message to the session's pty.
fn dispatch(session: &Session, msg: ClientMessage) {
    match msg {
        ClientMessage::Input { data } => session.pty().write(data.as_bytes()),
        ClientMessage::Resize { cols, rows } => {
            let cols = clamp_dimension(cols, DEFAULT_COLS);
            let rows = clamp_dimension(rows, DEFAULT_ROWS);
            if let Err(e) = session.pty().resize(cols, rows) {
                warn!(session_id = %session.id, error = %e, "resize failed");
            }
        }
    }
}

async fn send(sender: &mut WsSender, msg: &ServerMessage) -> TermResult<()> {
    let text = codec::encode(msg)?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(|e| TermError::Transport(e.to_string()))
}

/// Best-effort: send a status frame, then a close frame.
async fn close_with_status(sender: &mut WsSender, text: &str) {
    if let Err(e) = send(sender, &ServerMessage::status(text)).await {
        debug!(error = %e, "could not deliver status before close");
    }
    let _ = sender.send(Message::Close(None)).await;
}
