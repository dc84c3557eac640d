//! Clinic tools the model may call.
//!
//! - [`registry`] declares the function-calling schemas.
//! - [`args`] turns a raw argument map into a typed [`args::ToolArgs`].
//! - [`injection`] fills role-specific defaults the model left out.
//! - [`executor`] validates, dispatches to [`handlers`] and normalizes failures.

pub mod args;
pub mod executor;
pub mod handlers;
pub mod injection;
pub mod registry;

use std::fmt;

use serde_json::{json, Value};
use thiserror::Error;

use carebook_core::errors::DomainError;
use carebook_db::repositories::RepositoryError;

pub use args::ToolArgs;
pub use executor::ToolExecutor;
pub use handlers::ClinicTools;
pub use injection::{inject_defaults, InjectionContext};
pub use registry::{ToolRegistry, ToolSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    CheckDoctorAvailability,
    ScheduleAppointment,
    GetPatientStatistics,
    SendDoctorReport,
    RescheduleAppointment,
    GetAllDoctors,
    GetAppointmentDetails,
    CancelAppointment,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        Self::CheckDoctorAvailability,
        Self::ScheduleAppointment,
        Self::GetPatientStatistics,
        Self::SendDoctorReport,
        Self::RescheduleAppointment,
        Self::GetAllDoctors,
        Self::GetAppointmentDetails,
        Self::CancelAppointment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckDoctorAvailability => "check_doctor_availability",
            Self::ScheduleAppointment => "schedule_appointment",
            Self::GetPatientStatistics => "get_patient_statistics",
            Self::SendDoctorReport => "send_doctor_report",
            Self::RescheduleAppointment => "reschedule_appointment",
            Self::GetAllDoctors => "get_all_doctors",
            Self::GetAppointmentDetails => "get_appointment_details",
            Self::CancelAppointment => "cancel_appointment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == value)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure inside a tool. Always converted into an `{"error": ...}` payload
/// for the model; never propagated past the executor.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    #[error("invalid argument `{field}`: {message}")]
    InvalidArgument { field: &'static str, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("Tool {tool} timed out after {seconds}s")]
    TimedOut { tool: ToolName, seconds: u64 },
    #[error("storage failure: {0}")]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Structured payload handed back to the model as a tool turn.
///
/// Soft domain failures (`success: false` plus a message) are ordinary
/// payloads; only [`ToolError`]s become `Error`.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Payload(Value),
    Error(String),
}

impl ToolResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Payload(value) => value.get("success").and_then(Value::as_bool).unwrap_or(false),
            Self::Error(_) => false,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Payload(value) => value.get(key),
            Self::Error(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Payload(value) => value.clone(),
            Self::Error(message) => json!({ "error": message }),
        }
    }
}

impl From<Result<Value, ToolError>> for ToolResult {
    fn from(value: Result<Value, ToolError>) -> Self {
        match value {
            Ok(payload) => Self::Payload(payload),
            Err(error) => Self::Error(error.to_string()),
        }
    }
}
