use serde_json::{json, Value};
use tracing::{info, warn};

use super::{display_name, soft_failure, ClinicTools};
use crate::collaborators::format_report;
use crate::tools::args::ReportArgs;
use crate::tools::ToolError;

impl ClinicTools {
    pub(super) async fn send_report(&self, args: ReportArgs) -> Result<Value, ToolError> {
        let doctor_id = args.doctor_id.ok_or(ToolError::MissingArgument("doctor_id"))?;
        let Some(channel) = self.collaborators.channels.route(&args.channel) else {
            return Ok(soft_failure(format!("Unknown channel: {}", args.channel)));
        };

        let doctor = match self.repos.doctors.find_by_id(&doctor_id).await? {
            Some(doctor) => display_name(&doctor.name),
            None => "Doctor".to_string(),
        };
        let report = format_report(&doctor, self.clock.local_now().date(), &args.report_content);

        match channel.deliver(&doctor_id.0, &report).await {
            Ok(()) => {
                info!(
                    event_name = "report.delivered",
                    doctor_id = %doctor_id.0,
                    channel = channel.name(),
                    "doctor report delivered"
                );
                Ok(json!({
                    "success": true,
                    "channel": channel.name(),
                    "message": format!("Report sent successfully via {}!", channel.name()),
                }))
            }
            Err(error) => {
                warn!(
                    event_name = "report.failed",
                    doctor_id = %doctor_id.0,
                    channel = channel.name(),
                    error = %error,
                    "doctor report delivery failed"
                );
                Ok(soft_failure(format!("Failed to send report: {error}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use carebook_core::domain::doctor::DoctorId;
    use carebook_core::domain::notification::NotificationKind;
    use carebook_db::repositories::NotificationRepository;

    use crate::collaborators::{
        CollaboratorError, DemoWhatsAppChannel, ReportChannel, ReportChannels,
    };
    use crate::tools::args::ReportArgs;
    use crate::tools::handlers::test_support::{harness, harness_with};

    struct DownSlack;

    #[async_trait]
    impl ReportChannel for DownSlack {
        fn name(&self) -> &'static str {
            "slack"
        }

        async fn deliver(&self, _recipient_id: &str, _message: &str) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Status {
                service: "slack",
                status: 404,
                message: "no_service".to_string(),
            })
        }
    }

    fn report(channel: &str) -> ReportArgs {
        ReportArgs {
            doctor_id: Some(DoctorId("doc-ahuja".to_string())),
            report_content: "3 appointments today".to_string(),
            channel: channel.to_string(),
        }
    }

    #[tokio::test]
    async fn in_app_report_lands_in_the_doctor_inbox() {
        let harness = harness().await;
        let result = harness.tools.send_report(report("in_app")).await.expect("send");

        assert_eq!(result["success"], true);
        assert_eq!(result["message"], "Report sent successfully via in_app!");

        let inbox = harness.notifications.list_for_recipient("doc-ahuja", true).await.expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::Report);
        assert!(inbox[0].content.starts_with("*Daily Report for Dr. Rahul Ahuja*\nMarch 02, 2026"));
        assert!(inbox[0].content.contains("3 appointments today"));
    }

    #[tokio::test]
    async fn unknown_channel_is_a_soft_failure() {
        let harness = harness().await;
        let result = harness.tools.send_report(report("pager")).await.expect("soft failure");

        assert_eq!(result["success"], false);
        assert_eq!(result["message"], "Unknown channel: pager");
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_to_the_model() {
        let harness = harness_with(|mut collaborators| {
            collaborators.channels = ReportChannels::new(
                Arc::new(DownSlack),
                Arc::new(DemoWhatsAppChannel),
                collaborators.inbox.clone(),
            );
            collaborators
        })
        .await;

        let result = harness.tools.send_report(report("slack")).await.expect("soft failure");
        assert_eq!(result["success"], false);
        assert!(result["message"].as_str().is_some_and(|m| m.starts_with("Failed to send report:")));
    }
}
