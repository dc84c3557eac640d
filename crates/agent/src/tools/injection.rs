use serde_json::Value;

use carebook_core::domain::doctor::DoctorId;
use carebook_core::domain::session::{context_keys, ContextMap};
use carebook_core::domain::user::UserRole;

use super::args::ToolArgs;

/// Who is calling and what the session already knows.
#[derive(Clone, Copy, Debug)]
pub struct InjectionContext<'a> {
    pub role: UserRole,
    pub caller_email: &'a str,
    pub context: &'a ContextMap,
}

impl InjectionContext<'_> {
    fn context_text(&self, key: &str) -> Option<String> {
        self.context
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn own_doctor_id(&self) -> Option<DoctorId> {
        match self.role {
            UserRole::Doctor => self.context_text(context_keys::DOCTOR_ID).map(DoctorId),
            UserRole::Patient | UserRole::Admin => None,
        }
    }
}

/// Fills role-specific defaults the model left out. Values the model supplied
/// are never replaced. Returns the names of the injected fields.
pub fn inject_defaults(args: &mut ToolArgs, ctx: &InjectionContext<'_>) -> Vec<&'static str> {
    let mut injected = Vec::new();

    match args {
        ToolArgs::GetPatientStatistics(stats) => {
            fill(&mut stats.doctor_id, ctx.own_doctor_id(), "doctor_id", &mut injected);
        }
        ToolArgs::SendDoctorReport(report) => {
            fill(&mut report.doctor_id, ctx.own_doctor_id(), "doctor_id", &mut injected);
        }
        ToolArgs::GetAppointmentDetails(details) => {
            fill(&mut details.doctor_id, ctx.own_doctor_id(), "doctor_id", &mut injected);
        }
        ToolArgs::ScheduleAppointment(schedule) => {
            let own_email = match ctx.role {
                UserRole::Patient => Some(ctx.caller_email.to_string()),
                UserRole::Doctor | UserRole::Admin => None,
            };
            fill(&mut schedule.patient_email, own_email, "patient_email", &mut injected);
            fill(
                &mut schedule.doctor_name,
                ctx.context_text(context_keys::LAST_DOCTOR_NAME),
                "doctor_name",
                &mut injected,
            );
        }
        ToolArgs::CheckDoctorAvailability(_)
        | ToolArgs::RescheduleAppointment(_)
        | ToolArgs::GetAllDoctors
        | ToolArgs::CancelAppointment(_) => {}
    }

    injected
}

fn fill<T>(
    slot: &mut Option<T>,
    value: Option<T>,
    field: &'static str,
    injected: &mut Vec<&'static str>,
) {
    if slot.is_none() {
        if let Some(value) = value {
            *slot = Some(value);
            injected.push(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use carebook_core::domain::doctor::DoctorId;
    use carebook_core::domain::session::ContextMap;
    use carebook_core::domain::user::UserRole;

    use super::{inject_defaults, InjectionContext};
    use crate::tools::args::ToolArgs;
    use crate::tools::ToolName;

    fn context(value: Value) -> ContextMap {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn parse(name: ToolName, value: Value) -> ToolArgs {
        ToolArgs::parse(name, &context(value)).expect("parse")
    }

    #[test]
    fn doctor_statistics_get_own_doctor_id_when_absent() {
        let ctx_map = context(json!({"doctor_id": "D"}));
        let ctx = InjectionContext { role: UserRole::Doctor, caller_email: "dr@x", context: &ctx_map };

        let mut args = parse(ToolName::GetPatientStatistics, json!({"query_type": "today"}));
        assert_eq!(inject_defaults(&mut args, &ctx), vec!["doctor_id"]);
        assert!(matches!(
            args,
            ToolArgs::GetPatientStatistics(ref stats) if stats.doctor_id == Some(DoctorId("D".to_string()))
        ));
    }

    #[test]
    fn explicit_doctor_id_is_never_overwritten() {
        let ctx_map = context(json!({"doctor_id": "D"}));
        let ctx = InjectionContext { role: UserRole::Doctor, caller_email: "dr@x", context: &ctx_map };

        let mut args =
            parse(ToolName::GetPatientStatistics, json!({"query_type": "today", "doctor_id": "E"}));
        assert!(inject_defaults(&mut args, &ctx).is_empty());
        assert!(matches!(
            args,
            ToolArgs::GetPatientStatistics(ref stats) if stats.doctor_id == Some(DoctorId("E".to_string()))
        ));
    }

    #[test]
    fn patients_never_receive_a_doctor_id() {
        let ctx_map = context(json!({"doctor_id": "D"}));
        let ctx = InjectionContext { role: UserRole::Patient, caller_email: "p@x", context: &ctx_map };

        let mut args = parse(ToolName::GetAppointmentDetails, json!({}));
        assert!(inject_defaults(&mut args, &ctx).is_empty());
    }

    #[test]
    fn patient_booking_gets_own_email_and_last_doctor() {
        let ctx_map = context(json!({"last_doctor_name": "Dr. Rahul Ahuja"}));
        let ctx = InjectionContext {
            role: UserRole::Patient,
            caller_email: "patient@clinic.example",
            context: &ctx_map,
        };

        let mut args =
            parse(ToolName::ScheduleAppointment, json!({"appointment_datetime": "tomorrow at 3pm"}));
        assert_eq!(inject_defaults(&mut args, &ctx), vec!["patient_email", "doctor_name"]);
        match args {
            ToolArgs::ScheduleAppointment(schedule) => {
                assert_eq!(schedule.patient_email.as_deref(), Some("patient@clinic.example"));
                assert_eq!(schedule.doctor_name.as_deref(), Some("Dr. Rahul Ahuja"));
            }
            other => panic!("unexpected args: {other:?}"),
        }
    }

    #[test]
    fn doctor_booking_keeps_patient_email_open() {
        let ctx_map = ContextMap::new();
        let ctx = InjectionContext { role: UserRole::Doctor, caller_email: "dr@x", context: &ctx_map };

        let mut args =
            parse(ToolName::ScheduleAppointment, json!({"appointment_datetime": "tomorrow at 3pm"}));
        assert!(inject_defaults(&mut args, &ctx).is_empty());
    }
}
