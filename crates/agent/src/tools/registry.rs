use serde_json::{json, Value};

use carebook_core::scheduling::{DateRange, StatsQuery};

use super::ToolName;

pub const REPORT_CHANNELS: [&str; 3] = ["slack", "whatsapp", "in_app"];

/// Function-calling declaration for one tool.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: ToolName,
    pub description: &'static str,
    /// JSON-Schema object: `{"type": "object", "properties": ..., "required": [...]}`.
    pub parameters: Value,
}

/// Static, side-effect free table of the tools offered to the model.
#[derive(Clone, Debug)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { specs: ToolName::ALL.into_iter().map(spec_for).collect() }
    }

    pub fn definitions(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn get(&self, name: ToolName) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn string(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn boolean(description: &str) -> Value {
    json!({"type": "boolean", "description": description})
}

fn one_of(description: &str, values: &[&str]) -> Value {
    json!({"type": "string", "enum": values, "description": description})
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

fn spec_for(name: ToolName) -> ToolSpec {
    let (description, parameters) = match name {
        ToolName::CheckDoctorAvailability => (
            "Check a doctor's available appointment slots on a given date.",
            object(
                json!({
                    "doctor_name": string("Doctor's name or part of it, e.g. 'Ahuja'"),
                    "date": string("Date to check: YYYY-MM-DD, 'today', 'tomorrow', 'next monday'"),
                }),
                &["doctor_name", "date"],
            ),
        ),
        ToolName::ScheduleAppointment => (
            "Book an appointment with a doctor for a patient, then create a calendar event and send a confirmation email.",
            object(
                json!({
                    "doctor_name": string("Doctor's name"),
                    "patient_email": string("Patient's registered email address"),
                    "appointment_datetime": string("Appointment start, ISO 8601 (YYYY-MM-DDTHH:MM:SS) or e.g. 'tomorrow at 3pm'"),
                    "symptoms": string("Reason for the visit or symptoms, if given"),
                }),
                &["doctor_name", "patient_email", "appointment_datetime"],
            ),
        ),
        ToolName::GetPatientStatistics => {
            let queries = StatsQuery::ALL.map(|query| query.as_str());
            (
                "Count a doctor's patients or appointments for a time window, or by symptom.",
                object(
                    json!({
                        "doctor_id": string("Doctor's id"),
                        "query_type": one_of("Which statistic to compute", &queries),
                        "symptom": string("Symptom to match; required when query_type is 'by_symptom'"),
                    }),
                    &["doctor_id", "query_type"],
                ),
            )
        }
        ToolName::SendDoctorReport => (
            "Send a summary report to the doctor through a notification channel.",
            object(
                json!({
                    "doctor_id": string("Doctor's id"),
                    "report_content": string("Report text to deliver"),
                    "channel": one_of("Delivery channel", &REPORT_CHANNELS),
                }),
                &["doctor_id", "report_content", "channel"],
            ),
        ),
        ToolName::RescheduleAppointment => (
            "Move an existing appointment to a new date and time.",
            object(
                json!({
                    "appointment_id": string("Appointment id"),
                    "new_datetime": string("New start time, ISO 8601 or natural language"),
                    "notify_patient": boolean("Email the patient about the change (default true)"),
                }),
                &["appointment_id", "new_datetime"],
            ),
        ),
        ToolName::GetAllDoctors => (
            "List every doctor with specialty and consultation duration.",
            object(json!({}), &[]),
        ),
        ToolName::GetAppointmentDetails => {
            let ranges = DateRange::ALL.map(|range| range.as_str());
            (
                "Look up appointments by id, doctor, patient email or date range.",
                object(
                    json!({
                        "appointment_id": string("Appointment id"),
                        "patient_email": string("Patient's email address"),
                        "doctor_id": string("Doctor's id"),
                        "date_range": one_of("Date range to list", &ranges),
                    }),
                    &[],
                ),
            )
        }
        ToolName::CancelAppointment => (
            "Cancel an existing appointment.",
            object(
                json!({
                    "appointment_id": string("Appointment id"),
                    "reason": string("Cancellation reason"),
                    "notify_patient": boolean("Email the patient about the cancellation (default true)"),
                }),
                &["appointment_id"],
            ),
        ),
    };

    ToolSpec { name, description, parameters }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ToolRegistry;
    use crate::tools::ToolName;

    #[test]
    fn registry_declares_every_tool_in_order() {
        let registry = ToolRegistry::new();
        let names = registry.definitions().iter().map(|spec| spec.name).collect::<Vec<_>>();
        assert_eq!(names, ToolName::ALL.to_vec());
    }

    #[test]
    fn statistics_schema_constrains_query_type() {
        let registry = ToolRegistry::new();
        let spec = registry.get(ToolName::GetPatientStatistics).expect("statistics tool");

        assert_eq!(spec.parameters["required"], json!(["doctor_id", "query_type"]));
        assert_eq!(
            spec.parameters["properties"]["query_type"]["enum"],
            json!(["yesterday", "today", "tomorrow", "this_week", "by_symptom"])
        );
    }

    #[test]
    fn directory_and_details_have_no_required_parameters() {
        let registry = ToolRegistry::new();
        for name in [ToolName::GetAllDoctors, ToolName::GetAppointmentDetails] {
            let spec = registry.get(name).expect("tool");
            assert_eq!(spec.parameters["type"], "object");
            assert_eq!(spec.parameters["required"], json!([]));
        }
        let details = registry.get(ToolName::GetAppointmentDetails).expect("details");
        assert_eq!(
            details.parameters["properties"]["date_range"]["enum"],
            json!(["today", "tomorrow", "this_week", "next_week"])
        );
    }

    #[test]
    fn boolean_flags_are_typed() {
        let registry = ToolRegistry::new();
        let cancel = registry.get(ToolName::CancelAppointment).expect("cancel");
        assert_eq!(cancel.parameters["properties"]["notify_patient"]["type"], "boolean");
        assert_eq!(cancel.parameters["required"], json!(["appointment_id"]));
    }
}
