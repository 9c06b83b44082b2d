use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::service::InferenceService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Per-connection state of the stream channel. Malformed messages are answered
/// with an error reply and skipped; only the transport closes a session.
pub struct StreamSession {
    id: Uuid,
    state: SessionState,
    service: Arc<InferenceService>,
    handled: u64,
    rejected: u64,
}

impl StreamSession {
    pub fn new(service: Arc<InferenceService>) -> Self {
        Self {
            id: Uuid::now_v7(),
            state: SessionState::Open,
            service,
            handled: 0,
            rejected: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Returns the reply for one inbound text message, or `None` once closed.
    pub fn on_text(&mut self, text: &str) -> Option<String> {
        if self.state == SessionState::Closed {
            return None;
        }

        match self.service.handle_stream_message(text) {
            Ok(result) => {
                self.handled = self.handled.saturating_add(1);
                Some(format!("Prediction: {}", result.label))
            }
            Err(err) => {
                self.rejected = self.rejected.saturating_add(1);
                tracing::debug!(
                    target: "stream",
                    session_id = %self.id,
                    error = %err,
                    "stream_message_rejected"
                );
                Some(format!("Error: {err}"))
            }
        }
    }

    pub fn on_unsupported_frame(&mut self) -> Option<String> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.rejected = self.rejected.saturating_add(1);
        Some("Error: only text messages of the form '<int>,<int>' are accepted".to_string())
    }

    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        tracing::info!(
            target: "stream",
            session_id = %self.id,
            handled = self.handled,
            rejected = self.rejected,
            "stream_session_closed"
        );
    }
}

/// Open sessions with their cancellation handles. Cancelling one handle only
/// affects that session.
#[derive(Clone)]
pub struct SessionRegistry {
    parent: CancellationToken,
    sessions: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl SessionRegistry {
    pub fn new(parent: CancellationToken) -> Self {
        Self {
            parent,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn register(&self, session_id: Uuid) -> CancellationToken {
        let token = self.parent.child_token();
        self.sessions.lock().await.insert(session_id, token.clone());
        token
    }

    pub async fn unregister(&self, session_id: &Uuid) {
        self.sessions.lock().await.remove(session_id);
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
