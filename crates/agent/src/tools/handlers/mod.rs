//! Business rules behind each tool.
//!
//! Handlers return `Ok` with a `success: false` payload for soft domain
//! failures the model should relay to the user, and `Err(ToolError)` only for
//! invalid input or storage failures.

mod availability;
mod booking;
mod details;
mod directory;
mod reports;
mod statistics;

use std::sync::Arc;

use serde_json::{json, Value};

use carebook_core::audit::{AuditSink, Collaborator, CollaboratorDegradation};
use carebook_core::clock::Clock;
use carebook_core::domain::appointment::AppointmentId;
use carebook_core::domain::doctor::Doctor;
use carebook_db::repositories::{
    AppointmentRepository, DoctorRepository, PatientRepository, SqlAppointmentRepository,
    SqlDoctorRepository, SqlPatientRepository, SqlUserRepository, UserRepository,
};
use carebook_db::DbPool;

use super::args::ToolArgs;
use super::ToolError;
use crate::collaborators::{CollaboratorError, Collaborators};

/// Clinic record stores shared by the tools and caller-profile resolution.
#[derive(Clone)]
pub struct ClinicRepositories {
    pub users: Arc<dyn UserRepository>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
}

impl ClinicRepositories {
    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            users: Arc::new(SqlUserRepository::new(pool.clone())),
            doctors: Arc::new(SqlDoctorRepository::new(pool.clone())),
            patients: Arc::new(SqlPatientRepository::new(pool.clone())),
            appointments: Arc::new(SqlAppointmentRepository::new(pool)),
        }
    }
}

pub struct ClinicTools {
    repos: ClinicRepositories,
    collaborators: Collaborators,
    audit: Arc<dyn AuditSink>,
    clock: Clock,
}

impl ClinicTools {
    pub fn new(
        repos: ClinicRepositories,
        collaborators: Collaborators,
        audit: Arc<dyn AuditSink>,
        clock: Clock,
    ) -> Self {
        Self { repos, collaborators, audit, clock }
    }

    pub async fn dispatch(&self, args: ToolArgs, correlation_id: &str) -> Result<Value, ToolError> {
        match args {
            ToolArgs::CheckDoctorAvailability(args) => self.check_availability(args).await,
            ToolArgs::ScheduleAppointment(args) => self.schedule(args, correlation_id).await,
            ToolArgs::GetPatientStatistics(args) => self.patient_statistics(args).await,
            ToolArgs::SendDoctorReport(args) => self.send_report(args).await,
            ToolArgs::RescheduleAppointment(args) => self.reschedule(args, correlation_id).await,
            ToolArgs::GetAllDoctors => self.all_doctors().await,
            ToolArgs::GetAppointmentDetails(args) => self.appointment_details(args).await,
            ToolArgs::CancelAppointment(args) => self.cancel(args, correlation_id).await,
        }
    }

    async fn doctor_by_name(&self, fragment: &str) -> Result<Option<Doctor>, ToolError> {
        Ok(self.repos.doctors.find_by_name_fragment(fragment).await?)
    }

    fn degrade(
        &self,
        collaborator: Collaborator,
        operation: &str,
        appointment_id: &AppointmentId,
        error: &CollaboratorError,
        correlation_id: &str,
    ) {
        let degradation = CollaboratorDegradation::new(
            collaborator,
            operation,
            appointment_id.clone(),
            error.to_string(),
        );
        self.audit.emit(degradation.to_audit_event(correlation_id));
    }
}

/// `Dr. Rahul Ahuja` whether or not the stored name carries the title.
pub(crate) fn display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with("Dr.") || trimmed.starts_with("Dr ") {
        trimmed.to_string()
    } else {
        format!("Dr. {trimmed}")
    }
}

pub(crate) fn soft_failure(message: impl Into<String>) -> Value {
    json!({"success": false, "message": message.into()})
}

pub(crate) fn no_doctor_matching(name: &str) -> String {
    format!("No doctor found matching '{name}'")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};

    use carebook_core::audit::InMemoryAuditSink;
    use carebook_core::clock::Clock;
    use carebook_db::repositories::InMemoryNotificationRepository;
    use carebook_db::{connect_with_settings, migrations, DbPool, DemoClinicDataset};

    use super::{ClinicRepositories, ClinicTools};
    use crate::collaborators::{CalendarEvent, CalendarService, CollaboratorError, Collaborators};

    /// Monday 2026-03-02 08:00, clinic-local.
    pub fn monday_morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("fixed timestamp")
    }

    pub async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoClinicDataset::load(&pool).await.expect("seed");
        pool
    }

    pub struct Harness {
        pub tools: ClinicTools,
        pub audit: InMemoryAuditSink,
        pub notifications: Arc<InMemoryNotificationRepository>,
        pub repos: ClinicRepositories,
    }

    pub async fn harness() -> Harness {
        harness_with(|collaborators| collaborators).await
    }

    pub async fn harness_with(
        customize: impl FnOnce(Collaborators) -> Collaborators,
    ) -> Harness {
        let clock = Clock::Fixed(monday_morning());
        let pool = seeded_pool().await;
        let repos = ClinicRepositories::sqlite(pool);
        let notifications = Arc::new(InMemoryNotificationRepository::default());
        let collaborators =
            customize(Collaborators::demo(notifications.clone(), clock).expect("collaborators"));
        let audit = InMemoryAuditSink::default();
        let tools = ClinicTools::new(repos.clone(), collaborators, Arc::new(audit.clone()), clock);
        Harness { tools, audit, notifications, repos }
    }

    pub struct FailingCalendar;

    #[async_trait]
    impl CalendarService for FailingCalendar {
        async fn create_event(&self, _event: &CalendarEvent) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Status {
                service: "google calendar",
                status: 503,
                message: "backend unavailable".to_string(),
            })
        }

        async fn update_event(
            &self,
            _event_id: &str,
            _start: NaiveDateTime,
            _duration_minutes: u32,
        ) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Transport {
                service: "google calendar",
                message: "connection reset".to_string(),
            })
        }

        async fn delete_event(&self, _event_id: &str) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Transport {
                service: "google calendar",
                message: "connection reset".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::display_name;

    #[test]
    fn display_name_adds_title_once() {
        assert_eq!(display_name("Rahul Ahuja"), "Dr. Rahul Ahuja");
        assert_eq!(display_name("Dr. Rahul Ahuja"), "Dr. Rahul Ahuja");
    }
}
