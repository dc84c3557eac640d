use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tera::{Context, Tera};
use tracing::info;

use super::CollaboratorError;

const SERVICE: &str = "sendgrid";
const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

const CONFIRMATION: &str = "confirmation.html";
const RESCHEDULE: &str = "reschedule.html";
const CANCELLATION: &str = "cancellation.html";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), CollaboratorError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DemoMailer;

#[async_trait]
impl EmailService for DemoMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), CollaboratorError> {
        info!(
            event_name = "email.demo.send",
            to = %message.to,
            subject = %message.subject,
            "demo email sent"
        );
        Ok(())
    }
}

pub struct SendGridMailer {
    client: Client,
    api_key: SecretString,
    from_email: String,
}

impl SendGridMailer {
    pub fn new(client: Client, api_key: SecretString, from_email: String) -> Self {
        Self { client, api_key, from_email }
    }
}

#[async_trait]
impl EmailService for SendGridMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), CollaboratorError> {
        let body = json!({
            "personalizations": [{"to": [{"email": message.to}]}],
            "from": {"email": self.from_email},
            "subject": message.subject,
            "content": [{"type": "text/html", "value": message.html_body}],
        });

        let response = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| CollaboratorError::transport(SERVICE, error))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::from_response(SERVICE, response).await);
        }
        Ok(())
    }
}

/// Appointment facts shared by the three patient emails. Times are
/// pre-formatted for display.
#[derive(Clone, Debug)]
pub struct AppointmentEmail<'a> {
    pub to: &'a str,
    pub patient_name: &'a str,
    pub doctor: &'a str,
    pub specialty: &'a str,
}

pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, CollaboratorError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (CONFIRMATION, include_str!("../../../../templates/email/confirmation.html")),
            (RESCHEDULE, include_str!("../../../../templates/email/reschedule.html")),
            (CANCELLATION, include_str!("../../../../templates/email/cancellation.html")),
        ])
        .map_err(|error| CollaboratorError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    fn render(&self, template: &str, context: &Context) -> Result<String, CollaboratorError> {
        self.tera
            .render(template, context)
            .map_err(|error| CollaboratorError::Template(error.to_string()))
    }

    fn base_context(details: &AppointmentEmail<'_>) -> Context {
        let mut context = Context::new();
        context.insert("patient_name", details.patient_name);
        context.insert("doctor", details.doctor);
        context.insert("specialty", details.specialty);
        context
    }

    pub fn confirmation(
        &self,
        details: &AppointmentEmail<'_>,
        date: &str,
        time: &str,
        duration_minutes: u32,
        symptoms: Option<&str>,
    ) -> Result<EmailMessage, CollaboratorError> {
        let mut context = Self::base_context(details);
        context.insert("date", date);
        context.insert("time", time);
        context.insert("duration_minutes", &duration_minutes);
        context.insert("symptoms", &symptoms);

        Ok(EmailMessage {
            to: details.to.to_string(),
            subject: format!("Appointment Confirmed with {}", details.doctor),
            html_body: self.render(CONFIRMATION, &context)?,
        })
    }

    pub fn reschedule(
        &self,
        details: &AppointmentEmail<'_>,
        old_time: &str,
        new_time: &str,
    ) -> Result<EmailMessage, CollaboratorError> {
        let mut context = Self::base_context(details);
        context.insert("old_time", old_time);
        context.insert("new_time", new_time);

        Ok(EmailMessage {
            to: details.to.to_string(),
            subject: "Your Appointment Has Been Rescheduled".to_string(),
            html_body: self.render(RESCHEDULE, &context)?,
        })
    }

    pub fn cancellation(
        &self,
        details: &AppointmentEmail<'_>,
        time: &str,
        reason: Option<&str>,
    ) -> Result<EmailMessage, CollaboratorError> {
        let mut context = Self::base_context(details);
        context.insert("time", time);
        context.insert("reason", &reason);

        Ok(EmailMessage {
            to: details.to.to_string(),
            subject: "Appointment Cancelled".to_string(),
            html_body: self.render(CANCELLATION, &context)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AppointmentEmail, EmailTemplates};

    fn details() -> AppointmentEmail<'static> {
        AppointmentEmail {
            to: "patient@clinic.example",
            patient_name: "Demo Patient",
            doctor: "Dr. Rahul Ahuja",
            specialty: "General Medicine",
        }
    }

    #[test]
    fn confirmation_names_doctor_and_time() {
        let templates = EmailTemplates::new().expect("templates");
        let message = templates
            .confirmation(&details(), "March 02, 2026", "09:30 AM", 30, Some("persistent cough"))
            .expect("render");

        assert_eq!(message.subject, "Appointment Confirmed with Dr. Rahul Ahuja");
        assert_eq!(message.to, "patient@clinic.example");
        assert!(message.html_body.contains("Dear Demo Patient"));
        assert!(message.html_body.contains("09:30 AM"));
        assert!(message.html_body.contains("persistent cough"));
    }

    #[test]
    fn cancellation_omits_reason_block_without_reason() {
        let templates = EmailTemplates::new().expect("templates");
        let with_reason = templates
            .cancellation(&details(), "March 02, 2026 at 09:30 AM", Some("travelling"))
            .expect("render");
        let without = templates
            .cancellation(&details(), "March 02, 2026 at 09:30 AM", None)
            .expect("render");

        assert!(with_reason.html_body.contains("Reason:"));
        assert!(!without.html_body.contains("Reason:"));
        assert_eq!(without.subject, "Appointment Cancelled");
    }

    #[test]
    fn reschedule_shows_both_times() {
        let templates = EmailTemplates::new().expect("templates");
        let message = templates
            .reschedule(&details(), "March 02 at 09:30 AM", "March 03 at 10:00 AM")
            .expect("render");
        assert!(message.html_body.contains("March 02 at 09:30 AM"));
        assert!(message.html_body.contains("March 03 at 10:00 AM"));
    }
}
