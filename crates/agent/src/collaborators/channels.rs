use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use carebook_core::clock::Clock;
use carebook_core::domain::notification::{Notification, NotificationId, NotificationKind};
use carebook_db::repositories::NotificationRepository;

use super::CollaboratorError;

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━━";

/// Wraps a report body with the doctor/date header and the sign-off footer.
pub fn format_report(doctor: &str, date: NaiveDate, body: &str) -> String {
    [
        format!("*Daily Report for {doctor}*"),
        date.format("%B %d, %Y").to_string(),
        String::new(),
        SEPARATOR.to_string(),
        String::new(),
        body.trim().to_string(),
        String::new(),
        SEPARATOR.to_string(),
        String::new(),
        "Have a great day!".to_string(),
    ]
    .join("\n")
}

#[async_trait]
pub trait ReportChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, recipient_id: &str, message: &str) -> Result<(), CollaboratorError>;
}

/// Slack incoming-webhook delivery with a header/section/context block layout.
pub struct SlackWebhookChannel {
    client: Client,
    webhook_url: SecretString,
    clock: Clock,
}

impl SlackWebhookChannel {
    pub fn new(client: Client, webhook_url: SecretString, clock: Clock) -> Self {
        Self { client, webhook_url, clock }
    }

    fn payload(&self, message: &str) -> Value {
        let generated_at = self.clock.local_now().format("%B %d, %Y %I:%M %p");
        json!({
            "text": message,
            "blocks": [
                {"type": "header", "text": {"type": "plain_text", "text": "Doctor Report", "emoji": true}},
                {"type": "section", "text": {"type": "mrkdwn", "text": message}},
                {"type": "context", "elements": [
                    {"type": "mrkdwn", "text": format!("Generated at {generated_at}")}
                ]},
                {"type": "divider"},
            ],
        })
    }
}

#[async_trait]
impl ReportChannel for SlackWebhookChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn deliver(&self, _recipient_id: &str, message: &str) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|error| CollaboratorError::transport("slack", error))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::from_response("slack", response).await);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DemoSlackChannel;

#[async_trait]
impl ReportChannel for DemoSlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn deliver(&self, recipient_id: &str, message: &str) -> Result<(), CollaboratorError> {
        info!(
            event_name = "report.demo.slack",
            recipient_id,
            chars = message.chars().count(),
            "demo slack report posted"
        );
        Ok(())
    }
}

/// WhatsApp has no provider integration; delivery is always logged only.
#[derive(Clone, Copy, Debug, Default)]
pub struct DemoWhatsAppChannel;

#[async_trait]
impl ReportChannel for DemoWhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn deliver(&self, recipient_id: &str, message: &str) -> Result<(), CollaboratorError> {
        info!(
            event_name = "report.demo.whatsapp",
            recipient_id,
            chars = message.chars().count(),
            "demo whatsapp report sent"
        );
        Ok(())
    }
}

/// Stores the report as an in-app notification for the doctor.
pub struct InAppChannel {
    notifications: Arc<dyn NotificationRepository>,
    clock: Clock,
}

impl InAppChannel {
    pub fn new(notifications: Arc<dyn NotificationRepository>, clock: Clock) -> Self {
        Self { notifications, clock }
    }

    pub async fn post(
        &self,
        recipient_id: &str,
        content: &str,
        kind: NotificationKind,
    ) -> Result<(), CollaboratorError> {
        self.notifications
            .append(Notification {
                id: NotificationId(Uuid::new_v4().to_string()),
                recipient_id: recipient_id.to_string(),
                content: content.to_string(),
                kind,
                created_at: self.clock.utc_now(),
                read_at: None,
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReportChannel for InAppChannel {
    fn name(&self) -> &'static str {
        "in_app"
    }

    async fn deliver(&self, recipient_id: &str, message: &str) -> Result<(), CollaboratorError> {
        self.post(recipient_id, message, NotificationKind::Report).await
    }
}

/// Literal channel-name routing for doctor reports.
#[derive(Clone)]
pub struct ReportChannels {
    slack: Arc<dyn ReportChannel>,
    whatsapp: Arc<dyn ReportChannel>,
    in_app: Arc<dyn ReportChannel>,
}

impl ReportChannels {
    pub fn new(
        slack: Arc<dyn ReportChannel>,
        whatsapp: Arc<dyn ReportChannel>,
        in_app: Arc<dyn ReportChannel>,
    ) -> Self {
        Self { slack, whatsapp, in_app }
    }

    pub fn route(&self, channel: &str) -> Option<&Arc<dyn ReportChannel>> {
        match channel {
            "slack" => Some(&self.slack),
            "whatsapp" => Some(&self.whatsapp),
            "in_app" => Some(&self.in_app),
            _ => None,
        }
    }
}
