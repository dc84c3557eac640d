use serde_json::{json, Value};
use uuid::Uuid;

use carebook_core::audit::{AuditCategory, AuditEvent, AuditOutcome, Collaborator};
use carebook_core::domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
use carebook_core::domain::notification::NotificationKind;
use carebook_core::domain::user::UserRole;
use carebook_core::errors::DomainError;
use carebook_core::scheduling::{format_slot_time, resolve_datetime};

use super::{display_name, no_doctor_matching, soft_failure, ClinicTools};
use crate::collaborators::{AppointmentEmail, CalendarEvent, CollaboratorError, EmailMessage};
use crate::tools::args::{CancelArgs, RescheduleArgs, ScheduleArgs};
use crate::tools::{ToolError, ToolName};

const ISO_LOCAL: &str = "%Y-%m-%dT%H:%M:%S";
const LONG_DATETIME: &str = "%B %d, %Y at %I:%M %p";
const SHORT_DATETIME: &str = "%B %d at %I:%M %p";

/// Who to email about an existing appointment.
struct PatientContact {
    email: String,
    patient_name: String,
    doctor: String,
    specialty: String,
}

impl PatientContact {
    fn details(&self) -> AppointmentEmail<'_> {
        AppointmentEmail {
            to: &self.email,
            patient_name: &self.patient_name,
            doctor: &self.doctor,
            specialty: &self.specialty,
        }
    }
}

fn slot_taken(at: chrono::NaiveDateTime) -> Value {
    soft_failure(format!(
        "Sorry, the {} slot is no longer available. Please choose another time.",
        format_slot_time(at.time())
    ))
}

fn transition_refused(error: &DomainError, action: &str) -> Option<Value> {
    match error {
        DomainError::InvalidAppointmentTransition { from, .. } => Some(soft_failure(format!(
            "This appointment is {} and can no longer be {action}.",
            from.as_str()
        ))),
        DomainError::InvariantViolation(_) => None,
    }
}

impl ClinicTools {
    pub(super) async fn schedule(
        &self,
        args: ScheduleArgs,
        correlation_id: &str,
    ) -> Result<Value, ToolError> {
        let doctor_name = args.doctor_name.ok_or(ToolError::MissingArgument("doctor_name"))?;
        let patient_email = args.patient_email.ok_or(ToolError::MissingArgument("patient_email"))?;

        let Some(doctor) = self.doctor_by_name(&doctor_name).await? else {
            return Ok(soft_failure(no_doctor_matching(&doctor_name)));
        };

        let user = self
            .repos
            .users
            .find_by_email(&patient_email)
            .await?
            .filter(|user| user.role == UserRole::Patient);
        let Some(user) = user else {
            return Ok(soft_failure(format!(
                "No patient found with email '{patient_email}'. Please register first."
            )));
        };
        let Some(patient) = self.repos.patients.find_by_user_id(&user.id).await? else {
            return Ok(soft_failure("Patient profile not found. Please complete your profile."));
        };

        let at = resolve_datetime(&args.appointment_datetime, self.clock.local_now());
        if self.repos.appointments.is_booked_at(&doctor.id, at).await? {
            return Ok(slot_taken(at));
        }

        let now = self.clock.utc_now();
        let mut appointment = Appointment {
            id: AppointmentId(Uuid::new_v4().to_string()),
            doctor_id: doctor.id.clone(),
            patient_id: patient.id.clone(),
            scheduled_at: at,
            duration_minutes: doctor.consultation_minutes,
            status: AppointmentStatus::Scheduled,
            symptoms: args.symptoms.clone(),
            diagnosis: None,
            notes: None,
            calendar_event_id: None,
            confirmation_sent: false,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        self.repos.appointments.save(appointment.clone()).await?;
        self.audit.emit(
            AuditEvent::new(
                correlation_id,
                "appointment.booked",
                AuditCategory::Booking,
                ToolName::ScheduleAppointment.as_str(),
                AuditOutcome::Success,
            )
            .for_appointment(appointment.id.clone())
            .with_metadata("doctor_id", doctor.id.0.clone())
            .with_metadata("scheduled_at", at.format(ISO_LOCAL).to_string()),
        );

        let doctor_label = display_name(&doctor.name);
        let event = CalendarEvent {
            summary: format!("Appointment: {} with {doctor_label}", patient.name),
            description: match &args.symptoms {
                Some(symptoms) => format!("Symptoms: {symptoms}"),
                None => "Regular checkup".to_string(),
            },
            start: at,
            duration_minutes: doctor.consultation_minutes,
            attendees: vec![patient_email.clone()],
        };
        match self.collaborators.calendar.create_event(&event).await {
            Ok(event_id) => appointment.calendar_event_id = Some(event_id),
            Err(error) => self.degrade(
                Collaborator::Calendar,
                "create_event",
                &appointment.id,
                &error,
                correlation_id,
            ),
        }

        let contact = PatientContact {
            email: patient_email,
            patient_name: patient.name.clone(),
            doctor: doctor_label.clone(),
            specialty: doctor.specialty.clone(),
        };
        let confirmation = self.collaborators.templates.confirmation(
            &contact.details(),
            &at.format("%B %d, %Y").to_string(),
            &format_slot_time(at.time()),
            doctor.consultation_minutes,
            args.symptoms.as_deref(),
        );
        appointment.confirmation_sent = self
            .deliver_email(confirmation, &appointment.id, "send_confirmation", correlation_id)
            .await;

        let notice = format!("New appointment: {} on {}", patient.name, at.format(LONG_DATETIME));
        if let Err(error) =
            self.collaborators.inbox.post(&doctor.id.0, &notice, NotificationKind::Appointment).await
        {
            self.degrade(
                Collaborator::Notification,
                "notify_doctor",
                &appointment.id,
                &error,
                correlation_id,
            );
        }

        if appointment.calendar_event_id.is_some() || appointment.confirmation_sent {
            appointment.updated_at = self.clock.utc_now();
            self.repos.appointments.save(appointment.clone()).await?;
        }

        Ok(json!({
            "success": true,
            "appointment_id": appointment.id.0,
            "message": format!(
                "Appointment successfully booked with {doctor_label} on {}",
                at.format(LONG_DATETIME)
            ),
            "details": {
                "doctor": doctor.name,
                "specialty": doctor.specialty,
                "patient": patient.name,
                "time": at.format(ISO_LOCAL).to_string(),
                "duration": format!("{} minutes", doctor.consultation_minutes),
                "calendar_event": appointment.calendar_event_id.is_some(),
                "email_sent": appointment.confirmation_sent,
            },
        }))
    }

    pub(super) async fn reschedule(
        &self,
        args: RescheduleArgs,
        correlation_id: &str,
    ) -> Result<Value, ToolError> {
        let Some(mut appointment) = self.repos.appointments.find_by_id(&args.appointment_id).await?
        else {
            return Ok(soft_failure("Appointment not found"));
        };

        let old_time = appointment.scheduled_at;
        let new_time = resolve_datetime(&args.new_datetime, self.clock.local_now());
        if new_time != old_time
            && self.repos.appointments.is_booked_at(&appointment.doctor_id, new_time).await?
        {
            return Ok(slot_taken(new_time));
        }

        if let Err(error) = appointment.reschedule(new_time, self.clock.utc_now()) {
            return transition_refused(&error, "rescheduled").ok_or(ToolError::Domain(error));
        }
        self.repos.appointments.save(appointment.clone()).await?;
        self.audit.emit(
            AuditEvent::new(
                correlation_id,
                "appointment.rescheduled",
                AuditCategory::Booking,
                ToolName::RescheduleAppointment.as_str(),
                AuditOutcome::Success,
            )
            .for_appointment(appointment.id.clone())
            .with_metadata("from", old_time.format(ISO_LOCAL).to_string())
            .with_metadata("to", new_time.format(ISO_LOCAL).to_string()),
        );

        if let Some(event_id) = &appointment.calendar_event_id {
            if let Err(error) = self
                .collaborators
                .calendar
                .update_event(event_id, new_time, appointment.duration_minutes)
                .await
            {
                self.degrade(
                    Collaborator::Calendar,
                    "update_event",
                    &appointment.id,
                    &error,
                    correlation_id,
                );
            }
        }

        if args.notify_patient {
            if let Some(contact) = self.patient_contact(&appointment).await? {
                let message = self.collaborators.templates.reschedule(
                    &contact.details(),
                    &old_time.format(LONG_DATETIME).to_string(),
                    &new_time.format(LONG_DATETIME).to_string(),
                );
                self.deliver_email(message, &appointment.id, "send_reschedule", correlation_id)
                    .await;
            }
        }

        Ok(json!({
            "success": true,
            "message": format!(
                "Appointment rescheduled from {} to {}",
                old_time.format(SHORT_DATETIME),
                new_time.format(SHORT_DATETIME)
            ),
            "new_time": new_time.format(ISO_LOCAL).to_string(),
        }))
    }

    pub(super) async fn cancel(
        &self,
        args: CancelArgs,
        correlation_id: &str,
    ) -> Result<Value, ToolError> {
        let Some(mut appointment) = self.repos.appointments.find_by_id(&args.appointment_id).await?
        else {
            return Ok(soft_failure("Appointment not found"));
        };

        if let Err(error) = appointment.cancel(args.reason.as_deref(), self.clock.utc_now()) {
            return transition_refused(&error, "cancelled").ok_or(ToolError::Domain(error));
        }
        self.repos.appointments.save(appointment.clone()).await?;
        self.audit.emit(
            AuditEvent::new(
                correlation_id,
                "appointment.cancelled",
                AuditCategory::Booking,
                ToolName::CancelAppointment.as_str(),
                AuditOutcome::Success,
            )
            .for_appointment(appointment.id.clone()),
        );

        if let Some(event_id) = &appointment.calendar_event_id {
            if let Err(error) = self.collaborators.calendar.delete_event(event_id).await {
                self.degrade(
                    Collaborator::Calendar,
                    "delete_event",
                    &appointment.id,
                    &error,
                    correlation_id,
                );
            }
        }

        if args.notify_patient {
            if let Some(contact) = self.patient_contact(&appointment).await? {
                let message = self.collaborators.templates.cancellation(
                    &contact.details(),
                    &appointment.scheduled_at.format(LONG_DATETIME).to_string(),
                    args.reason.as_deref(),
                );
                self.deliver_email(message, &appointment.id, "send_cancellation", correlation_id)
                    .await;
            }
        }

        Ok(json!({"success": true, "message": "Appointment cancelled successfully"}))
    }

    async fn patient_contact(
        &self,
        appointment: &Appointment,
    ) -> Result<Option<PatientContact>, ToolError> {
        let Some(patient) = self.repos.patients.find_by_id(&appointment.patient_id).await? else {
            return Ok(None);
        };
        let Some(user) = self.repos.users.find_by_id(&patient.user_id).await? else {
            return Ok(None);
        };
        let doctor = self.repos.doctors.find_by_id(&appointment.doctor_id).await?;
        let (doctor, specialty) = match doctor {
            Some(doctor) => (display_name(&doctor.name), doctor.specialty),
            None => ("your doctor".to_string(), String::new()),
        };

        Ok(Some(PatientContact { email: user.email, patient_name: patient.name, doctor, specialty }))
    }

    /// Sends a rendered email; any failure becomes a degradation. Returns whether it went out.
    async fn deliver_email(
        &self,
        message: Result<EmailMessage, CollaboratorError>,
        appointment_id: &AppointmentId,
        operation: &str,
        correlation_id: &str,
    ) -> bool {
        let sent = match message {
            Ok(message) => self.collaborators.mailer.send(&message).await,
            Err(error) => Err(error),
        };
        match sent {
            Ok(()) => true,
            Err(error) => {
                self.degrade(Collaborator::Email, operation, appointment_id, &error, correlation_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use carebook_core::audit::{AuditCategory, AuditOutcome};
    use carebook_core::domain::appointment::{AppointmentId, AppointmentStatus};
    use carebook_core::domain::doctor::DoctorId;
    use carebook_db::repositories::{AppointmentQuery, NotificationRepository};

    use crate::tools::args::{CancelArgs, RescheduleArgs, ScheduleArgs};
    use crate::tools::handlers::test_support::{harness, harness_with, FailingCalendar};

    fn booking(datetime: &str) -> ScheduleArgs {
        ScheduleArgs {
            doctor_name: Some("Ahuja".to_string()),
            patient_email: Some("patient@clinic.example".to_string()),
            appointment_datetime: datetime.to_string(),
            symptoms: Some("persistent cough".to_string()),
        }
    }

    fn appointment_id(result: &serde_json::Value) -> AppointmentId {
        AppointmentId(result["appointment_id"].as_str().expect("appointment id").to_string())
    }

    #[tokio::test]
    async fn booking_records_calendar_event_and_confirmation() {
        let harness = harness().await;
        let result = harness.tools.schedule(booking("2026-03-03T10:00:00"), "req-1").await.expect("book");

        assert_eq!(result["success"], true);
        assert_eq!(
            result["message"],
            "Appointment successfully booked with Dr. Rahul Ahuja on March 03, 2026 at 10:00 AM"
        );
        assert_eq!(result["details"]["duration"], "30 minutes");
        assert_eq!(result["details"]["calendar_event"], true);
        assert_eq!(result["details"]["email_sent"], true);

        let stored = harness
            .repos
            .appointments
            .find_by_id(&appointment_id(&result))
            .await
            .expect("lookup")
            .expect("stored");
        assert_eq!(stored.status, AppointmentStatus::Scheduled);
        assert_eq!(stored.calendar_event_id.as_deref(), Some("demo_event_202603031000"));
        assert!(stored.confirmation_sent);

        let inbox = harness.notifications.list_for_recipient("doc-ahuja", false).await.expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert!(harness
            .audit
            .events()
            .iter()
            .any(|event| event.event_type == "appointment.booked" && event.outcome == AuditOutcome::Success));
    }

    #[tokio::test]
    async fn double_booking_is_refused_without_creating_a_row() {
        let harness = harness().await;
        harness.tools.schedule(booking("2026-03-03T10:00:00"), "req-1").await.expect("first");

        let second =
            harness.tools.schedule(booking("2026-03-03 10:00"), "req-2").await.expect("second");
        assert_eq!(second["success"], false);
        assert_eq!(
            second["message"],
            "Sorry, the 10:00 AM slot is no longer available. Please choose another time."
        );

        let count = harness
            .repos
            .appointments
            .count(&AppointmentQuery::for_doctor(DoctorId("doc-ahuja".to_string())))
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn calendar_failure_still_books_and_emits_one_degradation() {
        let harness = harness_with(|mut collaborators| {
            collaborators.calendar = Arc::new(FailingCalendar);
            collaborators
        })
        .await;

        let result = harness.tools.schedule(booking("2026-03-03T11:00:00"), "req-9").await.expect("book");
        assert_eq!(result["success"], true);
        assert_eq!(result["details"]["calendar_event"], false);

        let degraded = harness
            .audit
            .events()
            .into_iter()
            .filter(|event| event.outcome == AuditOutcome::Degraded)
            .collect::<Vec<_>>();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].category, AuditCategory::Calendar);
        assert_eq!(degraded[0].event_type, "calendar.create_event.degraded");
        assert_eq!(degraded[0].correlation_id, "req-9");
    }

    #[tokio::test]
    async fn unknown_patient_email_asks_to_register() {
        let harness = harness().await;
        let mut args = booking("2026-03-03T10:00:00");
        args.patient_email = Some("dr.ahuja@clinic.example".to_string());

        let result = harness.tools.schedule(args, "req-1").await.expect("soft failure");
        assert_eq!(result["success"], false);
        assert_eq!(
            result["message"],
            "No patient found with email 'dr.ahuja@clinic.example'. Please register first."
        );
    }

    #[tokio::test]
    async fn reschedule_moves_the_booking_and_frees_the_old_slot() {
        let harness = harness().await;
        let booked = harness.tools.schedule(booking("2026-03-03T10:00:00"), "req-1").await.expect("book");
        let id = appointment_id(&booked);

        let result = harness
            .tools
            .reschedule(
                RescheduleArgs {
                    appointment_id: id.clone(),
                    new_datetime: "2026-03-05T14:30:00".to_string(),
                    notify_patient: true,
                },
                "req-2",
            )
            .await
            .expect("reschedule");

        assert_eq!(result["success"], true);
        assert_eq!(
            result["message"],
            "Appointment rescheduled from March 03 at 10:00 AM to March 05 at 02:30 PM"
        );
        assert_eq!(result["new_time"], "2026-03-05T14:30:00");

        let stored =
            harness.repos.appointments.find_by_id(&id).await.expect("lookup").expect("stored");
        assert_eq!(stored.status, AppointmentStatus::Rescheduled);
        let old_day = NaiveDate::from_ymd_opt(2026, 3, 3).expect("date");
        let booked_old = harness
            .repos
            .appointments
            .booked_times_on(&stored.doctor_id, old_day)
            .await
            .expect("booked");
        assert!(booked_old.is_empty());
    }

    #[tokio::test]
    async fn cancelled_appointments_refuse_further_changes() {
        let harness = harness().await;
        let booked = harness.tools.schedule(booking("2026-03-03T10:00:00"), "req-1").await.expect("book");
        let id = appointment_id(&booked);

        let cancelled = harness
            .tools
            .cancel(
                CancelArgs {
                    appointment_id: id.clone(),
                    reason: Some("feeling better".to_string()),
                    notify_patient: false,
                },
                "req-2",
            )
            .await
            .expect("cancel");
        assert_eq!(cancelled["message"], "Appointment cancelled successfully");

        let stored =
            harness.repos.appointments.find_by_id(&id).await.expect("lookup").expect("stored");
        assert_eq!(stored.notes.as_deref(), Some("Cancelled: feeling better"));

        let again = harness
            .tools
            .reschedule(
                RescheduleArgs {
                    appointment_id: id,
                    new_datetime: "2026-03-04T09:00:00".to_string(),
                    notify_patient: false,
                },
                "req-3",
            )
            .await
            .expect("soft failure");
        assert_eq!(again["success"], false);
        assert_eq!(again["message"], "This appointment is cancelled and can no longer be rescheduled.");
    }

    #[tokio::test]
    async fn missing_appointment_is_a_soft_failure() {
        let harness = harness().await;
        let result = harness
            .tools
            .cancel(
                CancelArgs {
                    appointment_id: AppointmentId("nope".to_string()),
                    reason: None,
                    notify_patient: true,
                },
                "req-1",
            )
            .await
            .expect("soft failure");
        assert_eq!(result["success"], false);
        assert_eq!(result["message"], "Appointment not found");
    }
}
