//! Best-effort side effects of booking tools: calendar events, patient email
//! and report delivery channels.
//!
//! Every service has a demo implementation that only logs, used whenever the
//! corresponding credentials are not configured.

pub mod calendar;
pub mod channels;
pub mod email;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use carebook_core::clock::Clock;
use carebook_core::config::NotificationsConfig;
use carebook_db::repositories::{NotificationRepository, RepositoryError};

pub use calendar::{CalendarEvent, CalendarService, DemoCalendar, GoogleCalendar};
pub use channels::{
    format_report, DemoSlackChannel, DemoWhatsAppChannel, InAppChannel, ReportChannel,
    ReportChannels, SlackWebhookChannel,
};
pub use email::{
    AppointmentEmail, DemoMailer, EmailMessage, EmailService, EmailTemplates, SendGridMailer,
};

const OUTBOUND_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} request failed: {message}")]
    Transport { service: &'static str, message: String },
    #[error("{service} returned status {status}: {message}")]
    Status { service: &'static str, status: u16, message: String },
    #[error("template rendering failed: {0}")]
    Template(String),
    #[error("notification store failed: {0}")]
    Store(#[from] RepositoryError),
    #[error("{0} client could not be built: {1}")]
    Client(&'static str, String),
}

impl CollaboratorError {
    pub(crate) fn transport(service: &'static str, error: reqwest::Error) -> Self {
        Self::Transport { service, message: error.to_string() }
    }

    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .map(|body| body.chars().take(300).collect())
            .unwrap_or_else(|_| "failed to read error body".to_string());
        Self::Status { service, status, message }
    }
}

/// The side-effect services handed to the clinic tools.
#[derive(Clone)]
pub struct Collaborators {
    pub calendar: Arc<dyn CalendarService>,
    pub mailer: Arc<dyn EmailService>,
    pub templates: Arc<EmailTemplates>,
    pub channels: ReportChannels,
    /// Doctor-facing in-app notices; also the `in_app` report channel.
    pub inbox: Arc<InAppChannel>,
}

impl Collaborators {
    /// Logging-only calendar, mail and Slack/WhatsApp; in-app reports are stored.
    pub fn demo(
        notifications: Arc<dyn NotificationRepository>,
        clock: Clock,
    ) -> Result<Self, CollaboratorError> {
        let inbox = Arc::new(InAppChannel::new(notifications, clock));
        Ok(Self {
            calendar: Arc::new(DemoCalendar),
            mailer: Arc::new(DemoMailer),
            templates: Arc::new(EmailTemplates::new()?),
            channels: ReportChannels::new(
                Arc::new(DemoSlackChannel),
                Arc::new(DemoWhatsAppChannel),
                inbox.clone(),
            ),
            inbox,
        })
    }

    /// Real services for every credential present, demo services for the rest.
    pub fn from_config(
        config: &NotificationsConfig,
        notifications: Arc<dyn NotificationRepository>,
        clock: Clock,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(OUTBOUND_TIMEOUT_SECS))
            .build()
            .map_err(|error| CollaboratorError::Client("outbound http", error.to_string()))?;

        let mut collaborators = Self::demo(notifications, clock)?;

        if let Some(token) = &config.calendar_access_token {
            collaborators.calendar = Arc::new(GoogleCalendar::new(
                client.clone(),
                token.clone(),
                config.calendar_id.clone(),
                config.calendar_timezone.clone(),
            ));
        }
        if let Some(api_key) = &config.sendgrid_api_key {
            collaborators.mailer = Arc::new(SendGridMailer::new(
                client.clone(),
                api_key.clone(),
                config.from_email.clone(),
            ));
        }
        if let Some(webhook_url) = &config.slack_webhook_url {
            collaborators.channels = ReportChannels::new(
                Arc::new(SlackWebhookChannel::new(client, webhook_url.clone(), clock)),
                Arc::new(DemoWhatsAppChannel),
                collaborators.inbox.clone(),
            );
        }

        Ok(collaborators)
    }
}
