use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use carebook_agent::{AgentError, ChatFailure};
use carebook_core::errors::InterfaceError;

/// Error body shared by every route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error_class: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

pub type ApiRejection = (StatusCode, Json<ApiError>);

pub fn reject(status: StatusCode, error_class: &'static str, message: impl Into<String>) -> ApiRejection {
    (status, Json(ApiError { error_class, message: message.into(), correlation_id: None }))
}

pub const TOOL_LOOP_MESSAGE: &str =
    "I couldn't finish that request. Could you rephrase it or break it into smaller steps?";

/// Maps a failed chat turn, reusing the correlation id the runtime logged under.
pub fn chat_rejection(failure: ChatFailure) -> ApiRejection {
    correlated_rejection(failure.error, failure.correlation_id)
}

pub fn agent_rejection(error: AgentError) -> ApiRejection {
    correlated_rejection(error, Uuid::new_v4().to_string())
}

fn correlated_rejection(error: AgentError, correlation_id: String) -> ApiRejection {
    match error {
        AgentError::UnknownUser(_) => {
            reject(StatusCode::UNAUTHORIZED, "unknown_user", "Unknown or inactive user")
        }
        AgentError::ToolLoopExhausted { rounds, tools_used } => {
            warn!(
                event_name = "chat.tool_loop_exhausted",
                correlation_id = %correlation_id,
                rounds,
                tools_used = ?tools_used,
                "agent hit the tool round cap"
            );
            reject(StatusCode::UNPROCESSABLE_ENTITY, "tool_loop_exhausted", TOOL_LOOP_MESSAGE)
        }
        other => {
            warn!(
                event_name = "chat.request_failed",
                correlation_id = %correlation_id,
                error = %other,
                "chat request failed"
            );
            interface_rejection(other.to_application_error().into_interface(correlation_id))
        }
    }
}

pub fn interface_rejection(error: InterfaceError) -> ApiRejection {
    let (status, error_class) = match &error {
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(ApiError {
            error_class,
            message: error.user_message().to_string(),
            correlation_id: Some(error.correlation_id().to_string()),
        }),
    )
}
