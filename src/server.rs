//! HTTP surface: a streaming chat endpoint and a health check.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::AgentSession;
use crate::config::ServerSettings;
use crate::error::{ChattrError, Result, INVALID_INPUT_MESSAGE};
use crate::response::{run_turn, Snapshot, TurnState};
use crate::types::{AssistantMessage, ChatTurn, UserMessage};

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Payload of the final `done` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub state: TurnState,
    pub message: AssistantMessage,
}

#[derive(Clone)]
struct AppState {
    session: AgentSession,
}

pub fn router(session: AgentSession) -> Router {
    Router::new()
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(AppState { session })
}

/// Bind and serve until Ctrl-C, then close tool sessions.
pub async fn serve(settings: &ServerSettings, session: AgentSession) -> Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        ChattrError::Configuration(format!("Cannot bind {addr}: {e}"))
    })?;
    info!(address = %addr, "chattr listening");

    axum::serve(listener, router(session.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    session.close().await;
    Ok(())
}

/// POST /api/chat/stream: `snapshot` events while the turn runs, then one `done`.
async fn chat_stream(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if req.text.trim().is_empty() && req.attachments.is_empty() {
        return (StatusCode::BAD_REQUEST, INVALID_INPUT_MESSAGE).into_response();
    }

    let message = UserMessage {
        text: req.text,
        attachments: req.attachments,
    };
    let snapshots = run_turn(&state.session, message, req.history, req.session_id);

    Sse::new(snapshot_events(snapshots))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn snapshot_events(
    snapshots: impl Stream<Item = Snapshot> + Send + 'static,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    snapshots.map(|snapshot| {
        let event = if snapshot.state.is_terminal() {
            Event::default().event("done").json_data(TurnOutcome {
                state: snapshot.state,
                message: snapshot.message,
            })
        } else {
            Event::default().event("snapshot").json_data(&snapshot.message)
        };
        Ok(event.unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    })
}
