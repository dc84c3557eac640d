use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::doctor::DoctorId;
use crate::domain::patient::PatientId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    /// Statuses that occupy a slot on the doctor's calendar.
    pub const BOOKED: [AppointmentStatus; 2] = [Self::Scheduled, Self::Rescheduled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
            Self::Rescheduled => "rescheduled",
        }
    }

    pub fn is_booked(&self) -> bool {
        Self::BOOKED.contains(self)
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "no_show" => Ok(Self::NoShow),
            "rescheduled" => Ok(Self::Rescheduled),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown appointment status `{other}`"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    /// Clinic-local wall-clock time.
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub calendar_event_id: Option<String>,
    pub confirmation_sent: bool,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        !matches!(
            (self.status, next),
            (AppointmentStatus::Cancelled, _)
                | (AppointmentStatus::Completed, AppointmentStatus::Rescheduled)
                | (AppointmentStatus::Completed, AppointmentStatus::Cancelled)
        )
    }

    pub fn reschedule(
        &mut self,
        new_time: NaiveDateTime,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(AppointmentStatus::Rescheduled, at)?;
        self.scheduled_at = new_time;
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<&str>, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition_to(AppointmentStatus::Cancelled, at)?;
        self.notes = Some(match reason.map(str::trim).filter(|value| !value.is_empty()) {
            Some(reason) => format!("Cancelled: {reason}"),
            None => "Cancelled".to_string(),
        });
        Ok(())
    }

    fn transition_to(
        &mut self,
        next: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidAppointmentTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}
