//! Stream channel: one WebSocket connection is one inference session.

use std::fmt::Display;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};

use crate::{
    error::{GatewayError, transport},
    session::StreamSession,
};

use super::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(mut socket: WebSocket, state: AppState) {
    let mut session = StreamSession::new(state.service.clone());
    let session_id = session.id();
    let cancel = state.sessions.register(session_id).await;
    tracing::info!(target: "stream", session_id = %session_id, "stream_session_opened");

    loop {
        let inbound = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            inbound = socket.recv() => inbound,
        };

        let reply = match inbound {
            None | Some(Ok(Message::Close(_))) => break,
            Some(Err(err)) => {
                let err = transport_failure("receive", err);
                tracing::warn!(
                    target: "stream",
                    session_id = %session_id,
                    kind = err.kind.as_str(),
                    error = %err,
                    "stream_transport_failed"
                );
                break;
            }
            Some(Ok(Message::Text(text))) => session.on_text(text.as_str()),
            Some(Ok(Message::Binary(_))) => session.on_unsupported_frame(),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
        };

        let Some(reply) = reply else {
            break;
        };
        if let Err(err) = socket.send(Message::Text(reply.into())).await {
            let err = transport_failure("reply", err);
            tracing::warn!(
                target: "stream",
                session_id = %session_id,
                kind = err.kind.as_str(),
                error = %err,
                "stream_reply_failed"
            );
            break;
        }
    }

    session.close();
    state.sessions.unregister(&session_id).await;
}

fn transport_failure(stage: &str, err: impl Display) -> GatewayError {
    transport(format!("{stage} failed: {err}"))
}
