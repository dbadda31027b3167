//! Realtime endpoint: one WebSocket per client, JSON frames tagged by `type`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::RequireUser;
use crate::error::Error;
use crate::presence::{ClientMessage, Outbox, ServerMessage};
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::types::Identity;

pub async fn ws_handler(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

/// Live sessions in a document room.
pub async fn list_presence(
    RequireUser(user): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> impl IntoResponse {
    state.workspace.open_document(&document_id, &user.id).await?;
    let users = state.presence.collaborators(&document_id);
    Ok::<_, ApiError>(Json(ApiResponse::success(users)))
}

/// The room this connection has joined.
struct Joined {
    document_id: String,
    session_id: String,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: Identity) {
    tracing::info!("WebSocket connected: {}", user.id);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Failed to encode realtime frame: {e}");
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                tracing::debug!("Failed to send message to WebSocket: {e}");
                break;
            }
        }
    });

    let mut joined: Option<Joined> = None;

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => handle_message(&state, &user, &tx, &mut joined, message).await,
                Err(e) => reply(&tx, ServerMessage::error("invalid_message", e.to_string())),
            },
            Ok(Message::Ping(_)) => {
                if let Some(j) = &joined {
                    let _ = state.presence.touch(&j.session_id);
                }
            }
            Ok(Message::Binary(data)) => {
                tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!("WebSocket error for {}: {e}", user.id);
                break;
            }
        }
    }

    if let Some(j) = joined.take() {
        // Already gone if the sweeper evicted it.
        let _ = state.presence.leave(&j.session_id);
    }
    send_task.abort();
    tracing::info!("WebSocket disconnected: {}", user.id);
}

async fn handle_message(
    state: &AppState,
    user: &Identity,
    tx: &Outbox,
    joined: &mut Option<Joined>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::JoinDocument { document_id, user: hello } => {
            let snapshot = match state.workspace.open_document(&document_id, &user.id).await {
                Ok(snapshot) => snapshot,
                Err(e) => return reply_error(tx, &e),
            };
            if let Some(previous) = joined.take() {
                let _ = state.presence.leave(&previous.session_id);
            }
            let name = hello.and_then(|h| h.name);
            let session_id =
                state
                    .presence
                    .join(&document_id, user, name.as_deref(), snapshot, tx.clone());
            *joined = Some(Joined {
                document_id,
                session_id,
            });
        }
        ClientMessage::Operation { operation } => {
            let Some(j) = joined.as_ref() else {
                return reply(tx, not_joined());
            };
            let (document_id, session_id) = (j.document_id.clone(), j.session_id.clone());
            // An evicted session no longer hears the room; it must join again.
            if let Err(e) = state.presence.touch(&session_id) {
                *joined = None;
                return reply_error(tx, &e);
            }
            // The ack and the relay to peers go out from inside the workspace.
            match state
                .workspace
                .apply_operation(&document_id, &user.id, operation, Some(&session_id))
                .await
            {
                Ok(op) => {
                    tracing::debug!(
                        "{} applied {:?} to {} at version {}",
                        user.id,
                        op.kind,
                        document_id,
                        op.version
                    );
                }
                Err(Error::AccessDenied(_)) => reply(
                    tx,
                    ServerMessage::error(
                        "access_denied",
                        "live edits need commit rights; POST the content to /api/v1/projects/{id}/content to propose it",
                    ),
                ),
                Err(e) => reply_error(tx, &e),
            }
        }
        ClientMessage::CursorUpdate(cursor) => {
            presence_call(tx, joined, |id| state.presence.update_cursor(id, cursor));
        }
        ClientMessage::SelectionUpdate(selection) => {
            presence_call(tx, joined, |id| state.presence.update_selection(id, selection));
        }
        ClientMessage::Typing { is_typing } => {
            presence_call(tx, joined, |id| state.presence.set_typing(id, is_typing));
        }
        ClientMessage::Heartbeat => {
            presence_call(tx, joined, |id| state.presence.touch(id));
        }
    }
}

/// Runs a presence update for the joined session. An evicted session is
/// forgotten so the client can join again.
fn presence_call(
    tx: &Outbox,
    joined: &mut Option<Joined>,
    call: impl FnOnce(&str) -> crate::error::Result<()>,
) {
    let Some(j) = joined.as_ref() else {
        return reply(tx, not_joined());
    };
    if let Err(e) = call(&j.session_id) {
        if matches!(e, Error::NotFound(_)) {
            *joined = None;
        }
        reply_error(tx, &e);
    }
}

fn not_joined() -> ServerMessage {
    ServerMessage::error("not_joined", "send join-document first")
}

fn reply_error(tx: &Outbox, err: &Error) {
    reply(tx, ServerMessage::error(err.code(), err.to_string()));
}

fn reply(tx: &Outbox, message: ServerMessage) {
    if tx.send(message).is_err() {
        tracing::debug!("Reply dropped: connection closing");
    }
}
