use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

use carebook_core::domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
use carebook_core::domain::doctor::{Doctor, DoctorId};
use carebook_core::domain::notification::{Notification, NotificationId};
use carebook_core::domain::patient::{Patient, PatientId};
use carebook_core::domain::prompt::PromptRecord;
use carebook_core::domain::session::{Session, SessionKey};
use carebook_core::domain::user::{User, UserId};
use carebook_core::scheduling::DateSpan;

pub mod appointment;
pub mod doctor;
pub mod memory;
pub mod notification;
pub mod patient;
pub mod prompt;
pub mod session;
pub mod user;

pub use appointment::SqlAppointmentRepository;
pub use doctor::SqlDoctorRepository;
pub use memory::{
    InMemoryNotificationRepository, InMemoryPromptRecordRepository, InMemorySessionRepository,
};
pub use notification::SqlNotificationRepository;
pub use patient::SqlPatientRepository;
pub use prompt::SqlPromptRecordRepository;
pub use session::SqlSessionRepository;
pub use user::SqlUserRepository;

/// Wall-clock format for appointment times; lexical order equals time order.
pub const SCHEDULED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn find_by_id(&self, id: &DoctorId) -> Result<Option<Doctor>, RepositoryError>;
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Doctor>, RepositoryError>;
    /// Case-insensitive substring match; the first doctor by name wins.
    async fn find_by_name_fragment(&self, fragment: &str)
        -> Result<Option<Doctor>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Doctor>, RepositoryError>;
    async fn save(&self, doctor: Doctor) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn find_by_id(&self, id: &PatientId) -> Result<Option<Patient>, RepositoryError>;
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Patient>, RepositoryError>;
    async fn save(&self, patient: Patient) -> Result<(), RepositoryError>;
}

/// Filter for appointment counts and listings. Empty `statuses` means any status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppointmentQuery {
    pub appointment_id: Option<AppointmentId>,
    pub doctor_id: Option<DoctorId>,
    pub patient_id: Option<PatientId>,
    pub span: Option<DateSpan>,
    pub statuses: Vec<AppointmentStatus>,
    pub symptom: Option<String>,
    pub limit: Option<u32>,
}

impl AppointmentQuery {
    pub fn for_doctor(doctor_id: DoctorId) -> Self {
        Self { doctor_id: Some(doctor_id), ..Self::default() }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        if self.appointment_id.as_ref().is_some_and(|id| *id != appointment.id) {
            return false;
        }
        if self.doctor_id.as_ref().is_some_and(|id| *id != appointment.doctor_id) {
            return false;
        }
        if self.patient_id.as_ref().is_some_and(|id| *id != appointment.patient_id) {
            return false;
        }
        if self.span.is_some_and(|span| !span.contains(appointment.scheduled_at)) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&appointment.status) {
            return false;
        }
        if let Some(symptom) = &self.symptom {
            let needle = symptom.to_lowercase();
            let found = appointment
                .symptoms
                .as_deref()
                .is_some_and(|symptoms| symptoms.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AppointmentId) -> Result<Option<Appointment>, RepositoryError>;
    async fn save(&self, appointment: Appointment) -> Result<(), RepositoryError>;
    /// Whether a scheduled or rescheduled booking starts exactly at `at`.
    async fn is_booked_at(
        &self,
        doctor_id: &DoctorId,
        at: NaiveDateTime,
    ) -> Result<bool, RepositoryError>;
    async fn booked_times_on(
        &self,
        doctor_id: &DoctorId,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, RepositoryError>;
    async fn count(&self, query: &AppointmentQuery) -> Result<u64, RepositoryError>;
    /// Matching appointments ordered by `scheduled_at`.
    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_active(&self, key: &SessionKey) -> Result<Option<Session>, RepositoryError>;
    /// Stores `session` unless an active row already exists, then returns the
    /// stored active session. Concurrent creators all observe the first write.
    async fn insert_if_absent(&self, session: Session) -> Result<Session, RepositoryError>;
    async fn save(&self, session: &Session) -> Result<(), RepositoryError>;
    async fn deactivate(&self, key: &SessionKey) -> Result<bool, RepositoryError>;
    /// Active sessions, most recently updated first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        session_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Session>, RepositoryError>;
}

/// Append-only log of processed prompts.
#[async_trait]
pub trait PromptRecordRepository: Send + Sync {
    async fn append(&self, record: PromptRecord) -> Result<(), RepositoryError>;
    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PromptRecord>, RepositoryError>;
    async fn all_for_user(&self, user_id: &UserId) -> Result<Vec<PromptRecord>, RepositoryError>;
}

/// Append-only notification store. Reads are recorded as receipts; nothing is
/// updated in place.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn append(&self, notification: Notification) -> Result<(), RepositoryError>;
    /// Returns `false` when the notification is unknown or already read.
    async fn record_read(
        &self,
        id: &NotificationId,
        read_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// Newest first, with `read_at` derived from the receipt log.
    async fn list_for_recipient(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

pub(crate) fn parse_scheduled_at(value: &str) -> Result<NaiveDateTime, RepositoryError> {
    NaiveDateTime::parse_from_str(value, SCHEDULED_AT_FORMAT)
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `scheduled_at`: {e}")))
}

pub(crate) fn format_scheduled_at(at: NaiveDateTime) -> String {
    at.format(SCHEDULED_AT_FORMAT).to_string()
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
