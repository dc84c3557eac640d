use std::collections::HashMap;

use serde_json::{json, Value};

use carebook_db::repositories::AppointmentQuery;

use super::ClinicTools;
use crate::tools::args::DetailsArgs;
use crate::tools::ToolError;

const UNKNOWN: &str = "Unknown";

fn empty_listing() -> Value {
    json!({"success": true, "appointments": [], "count": 0})
}

impl ClinicTools {
    pub(super) async fn appointment_details(&self, args: DetailsArgs) -> Result<Value, ToolError> {
        let today = self.clock.local_now().date();
        let mut query = AppointmentQuery {
            appointment_id: args.appointment_id,
            doctor_id: args.doctor_id,
            span: args.date_range.map(|range| range.span(today)),
            ..AppointmentQuery::default()
        };

        // An email that resolves to no patient matches nothing.
        if let Some(email) = &args.patient_email {
            let Some(user) = self.repos.users.find_by_email(email).await? else {
                return Ok(empty_listing());
            };
            let Some(patient) = self.repos.patients.find_by_user_id(&user.id).await? else {
                return Ok(empty_listing());
            };
            query.patient_id = Some(patient.id);
        }

        let appointments = self.repos.appointments.list(&query).await?;

        let mut doctor_names = HashMap::new();
        let mut patient_names = HashMap::new();
        let mut listed = Vec::with_capacity(appointments.len());
        for appointment in &appointments {
            if !doctor_names.contains_key(&appointment.doctor_id) {
                let name = self.repos.doctors.find_by_id(&appointment.doctor_id).await?.map(|d| d.name);
                doctor_names.insert(appointment.doctor_id.clone(), name);
            }
            if !patient_names.contains_key(&appointment.patient_id) {
                let name =
                    self.repos.patients.find_by_id(&appointment.patient_id).await?.map(|p| p.name);
                patient_names.insert(appointment.patient_id.clone(), name);
            }

            let doctor = doctor_names.get(&appointment.doctor_id).and_then(Option::as_deref);
            let patient = patient_names.get(&appointment.patient_id).and_then(Option::as_deref);
            listed.push(json!({
                "id": appointment.id.0,
                "doctor": doctor.unwrap_or(UNKNOWN),
                "patient": patient.unwrap_or(UNKNOWN),
                "time": appointment.scheduled_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "status": appointment.status.as_str(),
                "symptoms": appointment.symptoms,
            }));
        }

        Ok(json!({"success": true, "count": listed.len(), "appointments": listed}))
    }
}
