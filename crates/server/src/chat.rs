//! Chat routes, mounted under `/api/v1/chat`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use carebook_agent::AgentRuntime;
use carebook_core::domain::prompt::{PromptRecord, PromptStats};
use carebook_core::domain::session::{ContextMap, Session, Turn};
use carebook_core::domain::user::UserId;

use crate::caller::Caller;
use crate::error::{agent_rejection, chat_rejection, reject, ApiRejection};

const HISTORY_DEFAULT_LIMIT: u32 = 10;
const HISTORY_MAX_LIMIT: u32 = 50;
const PROMPTS_DEFAULT_LIMIT: u32 = 50;
const PROMPTS_MAX_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub session_id: String,
    pub tools_used: Vec<String>,
    pub context: ContextMap,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub session_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PromptQuery {
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationView {
    pub session_id: String,
    pub messages: Vec<Turn>,
    pub context: ContextMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for ConversationView {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.key.session_id,
            messages: session.turns,
            context: session.context,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub message: &'static str,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/message", post(send_message))
        .route("/history", get(history))
        .route("/session/{session_id}", get(get_session).delete(clear_session))
        .route("/new-session", post(new_session))
        .route("/prompts", get(prompts))
        .route("/prompts/stats", get(prompt_stats))
        .with_state(ChatState { runtime })
}

pub async fn send_message(
    State(state): State<ChatState>,
    Caller(user_id): Caller,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiRejection> {
    if request.message.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "empty_message", "message must not be empty"));
    }

    let outcome = state
        .runtime
        .process_message(&user_id, request.session_id, &request.message)
        .await
        .map_err(chat_rejection)?;

    info!(
        event_name = "chat.message_processed",
        correlation_id = %outcome.correlation_id,
        user_id = %user_id.0,
        session_id = %outcome.session_id,
        latency_ms = outcome.latency_ms,
        tools = outcome.tools_used.len(),
        "chat message answered"
    );

    Ok(Json(MessageResponse {
        message: outcome.answer,
        session_id: outcome.session_id,
        tools_used: outcome.tools_used,
        context: outcome.context,
    }))
}

pub async fn history(
    State(state): State<ChatState>,
    Caller(user_id): Caller,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ConversationView>>, ApiRejection> {
    authorize(&state, &user_id).await?;
    let limit = clamp_limit(query.limit, HISTORY_DEFAULT_LIMIT, HISTORY_MAX_LIMIT);
    let session_id = query.session_id.as_deref().map(str::trim).filter(|id| !id.is_empty());

    let sessions = state
        .runtime
        .sessions()
        .history(&user_id, session_id, limit)
        .await
        .map_err(|error| agent_rejection(error.into()))?;
    Ok(Json(sessions.into_iter().map(ConversationView::from).collect()))
}

pub async fn get_session(
    State(state): State<ChatState>,
    Caller(user_id): Caller,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationView>, ApiRejection> {
    authorize(&state, &user_id).await?;
    let session = state
        .runtime
        .sessions()
        .find_active(&user_id, &session_id)
        .await
        .map_err(|error| agent_rejection(error.into()))?;

    session
        .map(|session| Json(ConversationView::from(session)))
        .ok_or_else(session_not_found)
}

pub async fn clear_session(
    State(state): State<ChatState>,
    Caller(user_id): Caller,
    Path(session_id): Path<String>,
) -> Result<Json<Acknowledgement>, ApiRejection> {
    authorize(&state, &user_id).await?;
    let cleared =
        state.runtime.clear_session(&user_id, &session_id).await.map_err(agent_rejection)?;
    if !cleared {
        return Err(session_not_found());
    }
    Ok(Json(Acknowledgement { message: "Session cleared successfully" }))
}

pub async fn new_session(
    State(state): State<ChatState>,
    Caller(user_id): Caller,
) -> Result<Json<NewSessionResponse>, ApiRejection> {
    authorize(&state, &user_id).await?;
    Ok(Json(NewSessionResponse { session_id: Uuid::new_v4().to_string() }))
}

pub async fn prompts(
    State(state): State<ChatState>,
    Caller(user_id): Caller,
    Query(query): Query<PromptQuery>,
) -> Result<Json<Vec<PromptRecord>>, ApiRejection> {
    authorize(&state, &user_id).await?;
    let limit = clamp_limit(query.limit, PROMPTS_DEFAULT_LIMIT, PROMPTS_MAX_LIMIT);
    let records = state
        .runtime
        .prompt_records()
        .list_for_user(&user_id, limit)
        .await
        .map_err(|error| agent_rejection(error.into()))?;
    Ok(Json(records))
}

pub async fn prompt_stats(
    State(state): State<ChatState>,
    Caller(user_id): Caller,
) -> Result<Json<PromptStats>, ApiRejection> {
    authorize(&state, &user_id).await?;
    let records = state
        .runtime
        .prompt_records()
        .all_for_user(&user_id)
        .await
        .map_err(|error| agent_rejection(error.into()))?;
    Ok(Json(PromptStats::summarize(&records)))
}

async fn authorize(state: &ChatState, user_id: &UserId) -> Result<(), ApiRejection> {
    state.runtime.caller(user_id).await.map(|_| ()).map_err(agent_rejection)
}

fn clamp_limit(requested: Option<u32>, default: u32, max: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, max)
}

fn session_not_found() -> ApiRejection {
    reject(StatusCode::NOT_FOUND, "session_not_found", "Session not found")
}
