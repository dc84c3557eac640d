use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::domain::appointment::AppointmentId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Booking,
    Calendar,
    Email,
    Notification,
    Agent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Degraded,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub appointment_id: Option<AppointmentId>,
    pub session_id: Option<String>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        category: AuditCategory,
        actor: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            appointment_id: None,
            session_id: None,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            category,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn for_appointment(mut self, appointment_id: AppointmentId) -> Self {
        self.appointment_id = Some(appointment_id);
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Production sink: every event becomes a structured log line, and degraded
/// outcomes are counted so health reporting can surface them.
#[derive(Debug, Default)]
pub struct TracingAuditSink {
    degraded: AtomicU64,
}

impl TracingAuditSink {
    pub fn degraded_count(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }
}

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let appointment_id = event.appointment_id.as_ref().map(|id| id.0.as_str()).unwrap_or("");
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                appointment_id,
                actor = %event.actor,
                "audit event"
            ),
            AuditOutcome::Degraded | AuditOutcome::Failed => {
                if event.outcome == AuditOutcome::Degraded {
                    self.degraded.fetch_add(1, Ordering::Relaxed);
                }
                let reason = event.metadata.get("reason").map(String::as_str).unwrap_or("");
                warn!(
                    event_name = %event.event_type,
                    correlation_id = %event.correlation_id,
                    appointment_id,
                    actor = %event.actor,
                    error = reason,
                    "audit event degraded"
                );
            }
        }
    }
}

/// Side-effect collaborators whose failures never undo a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    Calendar,
    Email,
    Notification,
}

impl Collaborator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Email => "email",
            Self::Notification => "notification",
        }
    }

    fn category(&self) -> AuditCategory {
        match self {
            Self::Calendar => AuditCategory::Calendar,
            Self::Email => AuditCategory::Email,
            Self::Notification => AuditCategory::Notification,
        }
    }
}

/// A failed best-effort side effect of an otherwise successful booking,
/// reschedule or cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorDegradation {
    pub collaborator: Collaborator,
    pub operation: String,
    pub appointment_id: AppointmentId,
    pub reason: String,
}

impl CollaboratorDegradation {
    pub fn new(
        collaborator: Collaborator,
        operation: impl Into<String>,
        appointment_id: AppointmentId,
        reason: impl Into<String>,
    ) -> Self {
        Self { collaborator, operation: operation.into(), appointment_id, reason: reason.into() }
    }

    pub fn to_audit_event(&self, correlation_id: impl Into<String>) -> AuditEvent {
        AuditEvent::new(
            correlation_id,
            format!("{}.{}.degraded", self.collaborator.as_str(), self.operation),
            self.collaborator.category(),
            self.collaborator.as_str(),
            AuditOutcome::Degraded,
        )
        .for_appointment(self.appointment_id.clone())
        .with_metadata("operation", self.operation.clone())
        .with_metadata("reason", self.reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{
        AuditCategory, AuditEvent, AuditOutcome, AuditSink, Collaborator, CollaboratorDegradation,
        InMemoryAuditSink, TracingAuditSink,
    };
    use crate::domain::appointment::AppointmentId;

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                "req-123",
                "booking.created",
                AuditCategory::Booking,
                "schedule_appointment",
                AuditOutcome::Success,
            )
            .for_appointment(AppointmentId("appt-42".to_owned()))
            .in_session("sess-1")
            .with_metadata("doctor_id", "doc-1"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].session_id.as_deref(), Some("sess-1"));
        assert_eq!(events[0].appointment_id.as_ref().map(|id| id.0.as_str()), Some("appt-42"));
        assert!(events[0].metadata.contains_key("doctor_id"));
    }

    #[test]
    fn degradation_becomes_degraded_audit_event() {
        let degradation = CollaboratorDegradation::new(
            Collaborator::Calendar,
            "create_event",
            AppointmentId("appt-7".to_owned()),
            "calendar API returned 503",
        );

        let event = degradation.to_audit_event("sess-9");

        assert_eq!(event.event_type, "calendar.create_event.degraded");
        assert_eq!(event.category, AuditCategory::Calendar);
        assert_eq!(event.outcome, AuditOutcome::Degraded);
        assert_eq!(event.metadata.get("reason").map(String::as_str), Some("calendar API returned 503"));
    }

    #[test]
    fn tracing_sink_counts_only_degraded_events() {
        let sink = TracingAuditSink::default();
        sink.emit(AuditEvent::new(
            "req-1",
            "booking.created",
            AuditCategory::Booking,
            "agent",
            AuditOutcome::Success,
        ));
        sink.emit(
            CollaboratorDegradation::new(
                Collaborator::Email,
                "send_confirmation",
                AppointmentId("appt-1".to_owned()),
                "smtp down",
            )
            .to_audit_event("req-1"),
        );

        assert_eq!(sink.degraded_count(), 1);
    }
}
