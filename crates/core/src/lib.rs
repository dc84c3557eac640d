pub mod audit;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod scheduling;

pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, Collaborator, CollaboratorDegradation,
    InMemoryAuditSink, TracingAuditSink,
};
pub use clock::Clock;
pub use domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
pub use domain::doctor::{Doctor, DoctorId, TimeWindow, WeeklyAvailability};
pub use domain::notification::{Notification, NotificationId, NotificationKind};
pub use domain::patient::{Patient, PatientId};
pub use domain::prompt::{PromptRecord, PromptRecordId, PromptStats, ToolUsageCount};
pub use domain::session::{ContextMap, Session, SessionKey, Turn, TurnRole};
pub use domain::user::{User, UserId, UserRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
