use serde_json::{json, Value};

use super::ClinicTools;
use crate::tools::ToolError;

impl ClinicTools {
    pub(super) async fn all_doctors(&self) -> Result<Value, ToolError> {
        let doctors = self.repos.doctors.list_all().await?;
        let listed = doctors
            .iter()
            .map(|doctor| {
                json!({
                    "id": doctor.id.0,
                    "name": doctor.name,
                    "specialty": doctor.specialty,
                    "consultation_duration": doctor.consultation_minutes,
                })
            })
            .collect::<Vec<_>>();

        Ok(json!({
            "success": true,
            "count": listed.len(),
            "message": format!("Found {} doctors available.", listed.len()),
            "doctors": listed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::tools::handlers::test_support::harness;

    #[tokio::test]
    async fn lists_every_seeded_doctor() {
        let harness = harness().await;
        let result = harness.tools.all_doctors().await.expect("directory");

        assert_eq!(result["count"], 3);
        assert_eq!(result["message"], "Found 3 doctors available.");
        let names = result["doctors"]
            .as_array()
            .expect("doctor list")
            .iter()
            .filter_map(|doctor| doctor["name"].as_str())
            .collect::<Vec<_>>();
        assert!(names.contains(&"Dr. Amit Patel"));
        assert!(result["doctors"]
            .as_array()
            .expect("doctor list")
            .iter()
            .all(|doctor| doctor["consultation_duration"] == 30));
    }
}
