use serde_json::{json, Value};

use carebook_core::scheduling::StatsQuery;
use carebook_db::repositories::AppointmentQuery;

use super::{soft_failure, ClinicTools};
use crate::tools::args::StatisticsArgs;
use crate::tools::ToolError;

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn summary(query: StatsQuery, count: u64, symptom: Option<&str>) -> String {
    match query {
        StatsQuery::Yesterday => format!("You had {} visit yesterday.", plural(count, "patient")),
        StatsQuery::Today => {
            format!("You have {} scheduled for today.", plural(count, "appointment"))
        }
        StatsQuery::Tomorrow => {
            format!("You have {} scheduled for tomorrow.", plural(count, "appointment"))
        }
        StatsQuery::ThisWeek => format!("You have {} this week.", plural(count, "appointment")),
        StatsQuery::BySymptom => format!(
            "You have seen {} with {}.",
            plural(count, "patient"),
            symptom.unwrap_or_default()
        ),
    }
}

impl ClinicTools {
    pub(super) async fn patient_statistics(
        &self,
        args: StatisticsArgs,
    ) -> Result<Value, ToolError> {
        let doctor_id = args.doctor_id.ok_or(ToolError::MissingArgument("doctor_id"))?;
        let Some(doctor) = self.repos.doctors.find_by_id(&doctor_id).await? else {
            return Ok(soft_failure("Doctor not found"));
        };

        let window = args.query.window(self.clock.local_now().date());
        let symptom = match args.query {
            StatsQuery::BySymptom => args.symptom.clone(),
            _ => None,
        };
        let query = AppointmentQuery {
            span: window.span,
            statuses: window.statuses.to_vec(),
            symptom,
            ..AppointmentQuery::for_doctor(doctor.id)
        };
        let count = self.repos.appointments.count(&query).await?;

        Ok(json!({
            "success": true,
            "query": args.query.label(),
            "count": count,
            "message": summary(args.query, count, args.symptom.as_deref()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime, Utc};

    use carebook_core::domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
    use carebook_core::domain::doctor::DoctorId;
    use carebook_core::domain::patient::PatientId;
    use carebook_core::scheduling::StatsQuery;

    use super::summary;
    use crate::tools::args::StatisticsArgs;
    use crate::tools::handlers::test_support::{harness, monday_morning, Harness};

    async fn seed(harness: &Harness, id: &str, at: NaiveDateTime, status: AppointmentStatus, symptoms: &str) {
        let now = Utc::now();
        harness
            .repos
            .appointments
            .save(Appointment {
                id: AppointmentId(id.to_string()),
                doctor_id: DoctorId("doc-ahuja".to_string()),
                patient_id: PatientId("pat-demo".to_string()),
                scheduled_at: at,
                duration_minutes: 30,
                status,
                symptoms: Some(symptoms.to_string()),
                diagnosis: None,
                notes: None,
                calendar_event_id: None,
                confirmation_sent: false,
                reminder_sent: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed appointment");
    }

    fn args(query: StatsQuery, symptom: Option<&str>) -> StatisticsArgs {
        StatisticsArgs {
            doctor_id: Some(DoctorId("doc-ahuja".to_string())),
            query,
            symptom: symptom.map(str::to_string),
        }
    }

    #[test]
    fn summaries_pluralize_counts() {
        assert_eq!(summary(StatsQuery::Yesterday, 1, None), "You had 1 patient visit yesterday.");
        assert_eq!(
            summary(StatsQuery::Today, 3, None),
            "You have 3 appointments scheduled for today."
        );
        assert_eq!(
            summary(StatsQuery::BySymptom, 2, Some("fever")),
            "You have seen 2 patients with fever."
        );
    }

    #[tokio::test]
    async fn windows_apply_their_status_filters() {
        let harness = harness().await;
        let monday = monday_morning();
        let sunday = monday - Duration::days(1);
        seed(&harness, "a1", sunday + Duration::hours(2), AppointmentStatus::Completed, "fever").await;
        seed(&harness, "a2", sunday + Duration::hours(3), AppointmentStatus::Cancelled, "fever").await;
        seed(&harness, "a3", monday + Duration::hours(2), AppointmentStatus::Scheduled, "cough").await;
        seed(&harness, "a4", monday + Duration::days(1), AppointmentStatus::Scheduled, "Fever, chills").await;

        let yesterday = harness
            .tools
            .patient_statistics(args(StatsQuery::Yesterday, None))
            .await
            .expect("yesterday");
        assert_eq!(yesterday["count"], 1);
        assert_eq!(yesterday["message"], "You had 1 patient visit yesterday.");

        let today = harness.tools.patient_statistics(args(StatsQuery::Today, None)).await.expect("today");
        assert_eq!(today["count"], 1);

        let week = harness.tools.patient_statistics(args(StatsQuery::ThisWeek, None)).await.expect("week");
        assert_eq!(week["count"], 2);

        let fever = harness
            .tools
            .patient_statistics(args(StatsQuery::BySymptom, Some("fever")))
            .await
            .expect("by symptom");
        assert_eq!(fever["count"], 3);
        assert_eq!(fever["message"], "You have seen 3 patients with fever.");
    }

    #[tokio::test]
    async fn unknown_doctor_is_a_soft_failure() {
        let harness = harness().await;
        let mut request = args(StatsQuery::Today, None);
        request.doctor_id = Some(DoctorId("doc-missing".to_string()));

        let result = harness.tools.patient_statistics(request).await.expect("soft failure");
        assert_eq!(result["success"], false);
        assert_eq!(result["message"], "Doctor not found");
    }
}
