//! The agent loop: model round, tool execution, context capture, repeat.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use carebook_core::clock::Clock;
use carebook_core::config::AgentConfig;
use carebook_core::domain::prompt::{PromptRecord, PromptRecordId};
use carebook_core::domain::session::{context_keys, ContextMap, Session, SessionKey, Turn};
use carebook_core::domain::user::UserId;
use carebook_core::errors::ApplicationError;
use carebook_db::repositories::{PromptRecordRepository, RepositoryError};

use crate::conversation::ConversationAssembler;
use crate::llm::{ChatMessage, LlmClient, LlmError, LlmResponse};
use crate::profile::{CallerProfile, ProfileResolver};
use crate::session::{SessionLocks, SessionStore};
use crate::tools::{InjectionContext, ToolExecutor, ToolName, ToolRegistry, ToolResult};

pub const EMPTY_ANSWER_FALLBACK: &str =
    "I apologize, but I couldn't generate a response. Please try again.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unknown or inactive user `{0}`")]
    UnknownUser(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("tool loop exhausted after {rounds} rounds")]
    ToolLoopExhausted { rounds: u32, tools_used: Vec<String> },
}

impl AgentError {
    /// Layer mapping for failures the HTTP surface reports generically.
    pub fn to_application_error(&self) -> ApplicationError {
        match self {
            Self::Llm(error) => ApplicationError::Model(error.to_string()),
            Self::Persistence(error) => ApplicationError::Persistence(error.to_string()),
            Self::UnknownUser(_) | Self::ToolLoopExhausted { .. } => {
                ApplicationError::Integration(self.to_string())
            }
        }
    }
}

/// A failed `process_message` call, tagged with the correlation id its log
/// lines were written under.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ChatFailure {
    pub correlation_id: String,
    #[source]
    pub error: AgentError,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatOutcome {
    pub correlation_id: String,
    pub answer: String,
    pub session_id: String,
    pub tools_used: Vec<String>,
    pub context: ContextMap,
    pub latency_ms: u64,
    pub tokens_used: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
pub struct RuntimeSettings {
    pub max_tool_rounds: u32,
    pub history_window: usize,
    pub tool_timeout: Duration,
    pub clock: Clock,
}

impl RuntimeSettings {
    pub fn from_config(config: &AgentConfig, clock: Clock) -> Self {
        Self {
            max_tool_rounds: config.max_tool_rounds,
            history_window: config.history_window,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
            clock,
        }
    }
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    executor: ToolExecutor,
    sessions: SessionStore,
    locks: SessionLocks,
    assembler: ConversationAssembler,
    profiles: ProfileResolver,
    prompt_records: Arc<dyn PromptRecordRepository>,
    max_tool_rounds: u32,
    clock: Clock,
}

/// Mutable state of one `process_message` call.
struct InFlight {
    correlation_id: String,
    started: Instant,
    tools_used: Vec<String>,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        sessions: SessionStore,
        profiles: ProfileResolver,
        prompt_records: Arc<dyn PromptRecordRepository>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            llm,
            registry: ToolRegistry::new(),
            executor,
            sessions,
            locks: SessionLocks::default(),
            assembler: ConversationAssembler::new(settings.history_window, settings.clock),
            profiles,
            prompt_records,
            max_tool_rounds: settings.max_tool_rounds.max(1),
            clock: settings.clock,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn prompt_records(&self) -> &Arc<dyn PromptRecordRepository> {
        &self.prompt_records
    }

    pub async fn caller(&self, user_id: &UserId) -> Result<CallerProfile, AgentError> {
        self.profiles
            .resolve(user_id)
            .await?
            .ok_or_else(|| AgentError::UnknownUser(user_id.0.clone()))
    }

    /// Deactivates a session once any in-flight message on it has finished.
    pub async fn clear_session(&self, user_id: &UserId, session_id: &str) -> Result<bool, AgentError> {
        let _guard = self.locks.acquire(&SessionKey::new(user_id.clone(), session_id)).await;
        Ok(self.sessions.deactivate(user_id, session_id).await?)
    }

    /// Failures write no prompt record; the caller maps them to a response.
    pub async fn process_message(
        &self,
        user_id: &UserId,
        session_id: Option<String>,
        message: &str,
    ) -> Result<ChatOutcome, ChatFailure> {
        let mut run = InFlight {
            correlation_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            tools_used: Vec::new(),
        };

        match self.answer(user_id, session_id, message, &mut run).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                warn!(
                    event_name = "agent.message.failed",
                    correlation_id = %run.correlation_id,
                    user_id = %user_id.0,
                    tools = run.tools_used.len(),
                    error = %error,
                    "chat message failed"
                );
                Err(ChatFailure { correlation_id: run.correlation_id, error })
            }
        }
    }

    async fn answer(
        &self,
        user_id: &UserId,
        session_id: Option<String>,
        message: &str,
        run: &mut InFlight,
    ) -> Result<ChatOutcome, AgentError> {
        let profile = self.caller(user_id).await?;
        let session_id = session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let _guard = self.locks.acquire(&SessionKey::new(user_id.clone(), &session_id)).await;
        let mut session = self.sessions.load(user_id, &session_id).await?;

        let mut messages =
            self.assembler.build(&session, message, profile.role(), &profile.prompt_context());
        self.sessions.append_turn(&mut session, Turn::user(message, self.clock.utc_now()));
        if let Some(doctor) = &profile.doctor {
            let mut own = ContextMap::new();
            own.insert(context_keys::DOCTOR_ID.to_string(), json!(doctor.id.0));
            own.insert(context_keys::DOCTOR_NAME.to_string(), json!(doctor.name));
            self.sessions.merge_context(&mut session, own);
        }
        self.sessions.persist(&session).await?;

        info!(
            event_name = "agent.message.received",
            correlation_id = %run.correlation_id,
            session_id = %session_id,
            role = profile.role().as_str(),
            "processing chat message"
        );

        let response = match self.run_loop(&profile, &mut session, &mut messages, run).await {
            Ok(response) => response,
            Err(error) => {
                if matches!(error, AgentError::ToolLoopExhausted { .. }) {
                    self.sessions.persist(&session).await?;
                }
                return Err(error);
            }
        };

        let answer = response
            .content
            .as_deref()
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .unwrap_or(EMPTY_ANSWER_FALLBACK)
            .to_string();
        self.sessions.append_turn(
            &mut session,
            Turn::assistant(answer.clone(), self.clock.utc_now(), run.tools_used.clone()),
        );
        self.sessions.persist(&session).await?;

        let latency_ms = elapsed_ms(run.started);
        self.prompt_records
            .append(PromptRecord {
                id: PromptRecordId(Uuid::new_v4().to_string()),
                user_id: user_id.clone(),
                session_id: session_id.clone(),
                prompt: message.to_string(),
                response: answer.clone(),
                tools_used: run.tools_used.clone(),
                tokens_used: response.total_tokens,
                processing_time_ms: latency_ms,
                success: true,
                error_message: None,
                created_at: self.clock.utc_now(),
            })
            .await?;

        info!(
            event_name = "agent.message.completed",
            correlation_id = %run.correlation_id,
            session_id = %session_id,
            tools = run.tools_used.len(),
            latency_ms,
            "chat message answered"
        );

        Ok(ChatOutcome {
            correlation_id: run.correlation_id.clone(),
            answer,
            session_id,
            tools_used: std::mem::take(&mut run.tools_used),
            context: session.context,
            latency_ms,
            tokens_used: response.total_tokens,
        })
    }

    /// Returns the first response without tool calls.
    async fn run_loop(
        &self,
        profile: &CallerProfile,
        session: &mut Session,
        messages: &mut Vec<ChatMessage>,
        run: &mut InFlight,
    ) -> Result<LlmResponse, AgentError> {
        for round in 1..=self.max_tool_rounds {
            let response = self.llm.complete(messages, self.registry.definitions()).await?;
            if !response.has_tool_calls() {
                return Ok(response);
            }

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let arguments = call.parsed_arguments();
                let result = {
                    let injection = InjectionContext {
                        role: profile.role(),
                        caller_email: &profile.user.email,
                        context: &session.context,
                    };
                    self.executor
                        .execute(&call.name, &arguments, &injection, &run.correlation_id)
                        .await
                };

                if let Some(captured) = availability_capture(&call.name, &result) {
                    self.sessions.merge_context(session, captured);
                }
                run.tools_used.push(call.name.clone());
                results.push(ChatMessage::tool_result(call, result.to_json().to_string()));
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone().unwrap_or_default(),
                response.tool_calls.clone(),
            ));
            messages.extend(results);
            self.sessions.persist(session).await?;

            info!(
                event_name = "agent.round.completed",
                correlation_id = %run.correlation_id,
                round,
                calls = response.tool_calls.len(),
                "tool round completed"
            );
        }

        warn!(
            event_name = "agent.loop.exhausted",
            correlation_id = %run.correlation_id,
            rounds = self.max_tool_rounds,
            "model kept requesting tools past the round cap"
        );
        Err(AgentError::ToolLoopExhausted {
            rounds: self.max_tool_rounds,
            tools_used: run.tools_used.clone(),
        })
    }
}

/// Only a successful availability check that identified a doctor writes
/// conversation context.
fn availability_capture(tool: &str, result: &ToolResult) -> Option<ContextMap> {
    if ToolName::parse(tool) != Some(ToolName::CheckDoctorAvailability) || !result.is_success() {
        return None;
    }
    let doctor_id = result.field("doctor_id")?.clone();

    let mut captured = ContextMap::new();
    captured.insert(context_keys::LAST_DOCTOR_ID.to_string(), doctor_id);
    captured.insert(
        context_keys::LAST_DOCTOR_NAME.to_string(),
        result.field("doctor_name").cloned().unwrap_or(Value::Null),
    );
    captured.insert(
        context_keys::LAST_DATE.to_string(),
        result.field("date").cloned().unwrap_or(Value::Null),
    );
    captured.insert(
        context_keys::AVAILABLE_SLOTS.to_string(),
        result.field("available_slots").cloned().unwrap_or_else(|| json!([])),
    );
    Some(captured)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
