use serde_json::{Map, Value};

use carebook_core::domain::appointment::AppointmentId;
use carebook_core::domain::doctor::DoctorId;
use carebook_core::scheduling::{DateRange, StatsQuery};

use super::{ToolError, ToolName};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailabilityArgs {
    pub doctor_name: String,
    pub date: String,
}

/// `doctor_name` and `patient_email` may still be filled from session context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleArgs {
    pub doctor_name: Option<String>,
    pub patient_email: Option<String>,
    pub appointment_datetime: String,
    pub symptoms: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatisticsArgs {
    pub doctor_id: Option<DoctorId>,
    pub query: StatsQuery,
    pub symptom: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportArgs {
    pub doctor_id: Option<DoctorId>,
    pub report_content: String,
    /// Kept verbatim; unknown channels are a soft failure at delivery time.
    pub channel: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RescheduleArgs {
    pub appointment_id: AppointmentId,
    pub new_datetime: String,
    pub notify_patient: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetailsArgs {
    pub appointment_id: Option<AppointmentId>,
    pub patient_email: Option<String>,
    pub doctor_id: Option<DoctorId>,
    pub date_range: Option<DateRange>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelArgs {
    pub appointment_id: AppointmentId,
    pub reason: Option<String>,
    pub notify_patient: bool,
}

/// Validated arguments, one variant per tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolArgs {
    CheckDoctorAvailability(AvailabilityArgs),
    ScheduleAppointment(ScheduleArgs),
    GetPatientStatistics(StatisticsArgs),
    SendDoctorReport(ReportArgs),
    RescheduleAppointment(RescheduleArgs),
    GetAllDoctors,
    GetAppointmentDetails(DetailsArgs),
    CancelAppointment(CancelArgs),
}

impl ToolArgs {
    pub fn tool(&self) -> ToolName {
        match self {
            Self::CheckDoctorAvailability(_) => ToolName::CheckDoctorAvailability,
            Self::ScheduleAppointment(_) => ToolName::ScheduleAppointment,
            Self::GetPatientStatistics(_) => ToolName::GetPatientStatistics,
            Self::SendDoctorReport(_) => ToolName::SendDoctorReport,
            Self::RescheduleAppointment(_) => ToolName::RescheduleAppointment,
            Self::GetAllDoctors => ToolName::GetAllDoctors,
            Self::GetAppointmentDetails(_) => ToolName::GetAppointmentDetails,
            Self::CancelAppointment(_) => ToolName::CancelAppointment,
        }
    }

    /// Validates a model-supplied argument map. Fields that can be injected
    /// from session context are left optional here and checked by the handler.
    pub fn parse(name: ToolName, arguments: &Map<String, Value>) -> Result<Self, ToolError> {
        let args = Fields(arguments);
        Ok(match name {
            ToolName::CheckDoctorAvailability => Self::CheckDoctorAvailability(AvailabilityArgs {
                doctor_name: args.required("doctor_name")?,
                date: args.required("date")?,
            }),
            ToolName::ScheduleAppointment => Self::ScheduleAppointment(ScheduleArgs {
                doctor_name: args.text("doctor_name")?,
                patient_email: args.text("patient_email")?,
                appointment_datetime: args.required("appointment_datetime")?,
                symptoms: args.text("symptoms")?,
            }),
            ToolName::GetPatientStatistics => {
                let query = args
                    .required("query_type")?
                    .parse::<StatsQuery>()
                    .map_err(|error| invalid("query_type", error))?;
                let symptom = args.text("symptom")?;
                if query == StatsQuery::BySymptom && symptom.is_none() {
                    return Err(ToolError::MissingArgument("symptom"));
                }
                Self::GetPatientStatistics(StatisticsArgs {
                    doctor_id: args.text("doctor_id")?.map(DoctorId),
                    query,
                    symptom,
                })
            }
            ToolName::SendDoctorReport => Self::SendDoctorReport(ReportArgs {
                doctor_id: args.text("doctor_id")?.map(DoctorId),
                report_content: args.required("report_content")?,
                channel: args.required("channel")?.to_ascii_lowercase(),
            }),
            ToolName::RescheduleAppointment => Self::RescheduleAppointment(RescheduleArgs {
                appointment_id: AppointmentId(args.required("appointment_id")?),
                new_datetime: args.required("new_datetime")?,
                notify_patient: args.flag("notify_patient", true)?,
            }),
            ToolName::GetAllDoctors => Self::GetAllDoctors,
            ToolName::GetAppointmentDetails => Self::GetAppointmentDetails(DetailsArgs {
                appointment_id: args.text("appointment_id")?.map(AppointmentId),
                patient_email: args.text("patient_email")?,
                doctor_id: args.text("doctor_id")?.map(DoctorId),
                date_range: args
                    .text("date_range")?
                    .map(|range| range.parse::<DateRange>())
                    .transpose()
                    .map_err(|error| invalid("date_range", error))?,
            }),
            ToolName::CancelAppointment => Self::CancelAppointment(CancelArgs {
                appointment_id: AppointmentId(args.required("appointment_id")?),
                reason: args.text("reason")?,
                notify_patient: args.flag("notify_patient", true)?,
            }),
        })
    }
}

fn invalid(field: &'static str, error: impl std::fmt::Display) -> ToolError {
    ToolError::InvalidArgument { field, message: error.to_string() }
}

struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    /// Strings are trimmed and blank means absent; numbers are accepted as text.
    fn text(&self, field: &'static str) -> Result<Option<String>, ToolError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => {
                let text = text.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(other) => Err(invalid(field, format!("expected a string, got {other}"))),
        }
    }

    fn required(&self, field: &'static str) -> Result<String, ToolError> {
        self.text(field)?.ok_or(ToolError::MissingArgument(field))
    }

    fn flag(&self, field: &'static str, default: bool) -> Result<bool, ToolError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "" => Ok(default),
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                other => Err(invalid(field, format!("expected true or false, got `{other}`"))),
            },
            Some(other) => Err(invalid(field, format!("expected a boolean, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use carebook_core::scheduling::{DateRange, StatsQuery};

    use super::{ToolArgs, ToolError};
    use crate::tools::ToolName;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn statistics_query_type_is_parsed_into_enum() {
        let args = ToolArgs::parse(
            ToolName::GetPatientStatistics,
            &map(json!({"doctor_id": "doc-ahuja", "query_type": "This_Week"})),
        )
        .expect("parse");

        match args {
            ToolArgs::GetPatientStatistics(stats) => {
                assert_eq!(stats.query, StatsQuery::ThisWeek);
                assert_eq!(stats.doctor_id.map(|id| id.0).as_deref(), Some("doc-ahuja"));
            }
            other => panic!("unexpected args: {other:?}"),
        }
    }

    #[test]
    fn by_symptom_requires_a_symptom() {
        let error = ToolArgs::parse(
            ToolName::GetPatientStatistics,
            &map(json!({"query_type": "by_symptom", "symptom": "  "})),
        )
        .expect_err("blank symptom");
        assert!(matches!(error, ToolError::MissingArgument("symptom")));
    }

    #[test]
    fn unknown_enum_values_are_invalid_arguments() {
        let error = ToolArgs::parse(
            ToolName::GetAppointmentDetails,
            &map(json!({"date_range": "last_year"})),
        )
        .expect_err("bad range");
        assert!(matches!(error, ToolError::InvalidArgument { field: "date_range", .. }));

        let ok = ToolArgs::parse(ToolName::GetAppointmentDetails, &map(json!({"date_range": "next_week"})))
            .expect("parse");
        assert!(matches!(
            ok,
            ToolArgs::GetAppointmentDetails(ref details) if details.date_range == Some(DateRange::NextWeek)
        ));
    }

    #[test]
    fn notify_flag_accepts_strings_and_defaults_to_true() {
        let explicit = ToolArgs::parse(
            ToolName::CancelAppointment,
            &map(json!({"appointment_id": "appt-1", "notify_patient": "false"})),
        )
        .expect("parse");
        assert!(matches!(explicit, ToolArgs::CancelAppointment(ref cancel) if !cancel.notify_patient));

        let defaulted = ToolArgs::parse(
            ToolName::RescheduleAppointment,
            &map(json!({"appointment_id": "appt-1", "new_datetime": "tomorrow at 10am"})),
        )
        .expect("parse");
        assert!(matches!(defaulted, ToolArgs::RescheduleAppointment(ref args) if args.notify_patient));
    }

    #[test]
    fn schedule_leaves_injectable_fields_open() {
        let args = ToolArgs::parse(
            ToolName::ScheduleAppointment,
            &map(json!({"appointment_datetime": "2026-03-02T10:00:00"})),
        )
        .expect("parse");
        match args {
            ToolArgs::ScheduleAppointment(schedule) => {
                assert!(schedule.doctor_name.is_none());
                assert!(schedule.patient_email.is_none());
            }
            other => panic!("unexpected args: {other:?}"),
        }

        let missing = ToolArgs::parse(ToolName::ScheduleAppointment, &Map::new())
            .expect_err("datetime is required");
        assert!(matches!(missing, ToolError::MissingArgument("appointment_datetime")));
    }
}
