use chrono::Datelike;
use serde_json::{json, Value};

use carebook_core::scheduling::{available_slots, format_long_date, format_slot_time, resolve_date};

use super::{display_name, no_doctor_matching, ClinicTools};
use crate::tools::args::AvailabilityArgs;
use crate::tools::ToolError;

impl ClinicTools {
    pub(super) async fn check_availability(
        &self,
        args: AvailabilityArgs,
    ) -> Result<Value, ToolError> {
        let Some(doctor) = self.doctor_by_name(&args.doctor_name).await? else {
            return Ok(json!({
                "success": false,
                "message": no_doctor_matching(&args.doctor_name),
                "available_slots": [],
            }));
        };

        let date = resolve_date(&args.date, self.clock.local_now().date());
        let weekday = date.format("%A").to_string();
        let windows = doctor.availability.windows_for(date.weekday());

        if windows.is_empty() {
            return Ok(json!({
                "success": true,
                "doctor_name": doctor.name,
                "date": date.format("%Y-%m-%d").to_string(),
                "message": format!("{} is not available on {weekday}s", display_name(&doctor.name)),
                "available_slots": [],
            }));
        }

        let booked = self.repos.appointments.booked_times_on(&doctor.id, date).await?;
        let slots = available_slots(windows, doctor.consultation_minutes, &booked)
            .into_iter()
            .map(format_slot_time)
            .collect::<Vec<_>>();

        Ok(json!({
            "success": true,
            "doctor_name": doctor.name,
            "doctor_id": doctor.id.0,
            "specialty": doctor.specialty,
            "date": date.format("%Y-%m-%d").to_string(),
            "day": weekday,
            "message": format!(
                "{} has {} available slots on {}",
                display_name(&doctor.name),
                slots.len(),
                format_long_date(date)
            ),
            "available_slots": slots,
            "consultation_duration": doctor.consultation_minutes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::tools::args::AvailabilityArgs;
    use crate::tools::handlers::test_support::harness;

    fn args(doctor_name: &str, date: &str) -> AvailabilityArgs {
        AvailabilityArgs { doctor_name: doctor_name.to_string(), date: date.to_string() }
    }

    #[tokio::test]
    async fn wednesday_morning_window_yields_six_half_hour_slots() {
        let harness = harness().await;
        let result =
            harness.tools.check_availability(args("ahuja", "2026-03-04")).await.expect("availability");

        assert_eq!(result["success"], true);
        assert_eq!(result["doctor_id"], "doc-ahuja");
        assert_eq!(result["day"], "Wednesday");
        assert_eq!(
            result["available_slots"],
            json!(["09:00 AM", "09:30 AM", "10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM"])
        );
        assert_eq!(result["message"], "Dr. Rahul Ahuja has 6 available slots on March 04, 2026");
    }

    #[tokio::test]
    async fn relative_dates_resolve_against_the_clinic_clock() {
        let harness = harness().await;
        // fixed clock is Monday 2026-03-02
        let result = harness.tools.check_availability(args("AHUJA", "tomorrow")).await.expect("ok");
        assert_eq!(result["date"], "2026-03-03");
        assert_eq!(result["available_slots"].as_array().map(Vec::len), Some(12));
    }

    #[tokio::test]
    async fn non_working_day_is_a_successful_empty_answer() {
        let harness = harness().await;
        let result = harness.tools.check_availability(args("patel", "2026-03-03")).await.expect("ok");

        assert_eq!(result["success"], true);
        assert_eq!(result["message"], "Dr. Amit Patel is not available on Tuesdays");
        assert_eq!(result["available_slots"], json!([]));
        assert!(result.get("doctor_id").is_none());
    }

    #[tokio::test]
    async fn unknown_doctor_is_a_soft_failure() {
        let harness = harness().await;
        let result = harness.tools.check_availability(args("House", "today")).await.expect("ok");

        assert_eq!(result["success"], false);
        assert_eq!(result["message"], "No doctor found matching 'House'");
    }
}
