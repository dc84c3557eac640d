use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::info;

use super::CollaboratorError;

const SERVICE: &str = "google calendar";
const EVENTS_BASE_URL: &str = "https://www.googleapis.com/calendar/v3/calendars";
const DEMO_EVENT_PREFIX: &str = "demo_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
    pub attendees: Vec<String>,
}

impl CalendarEvent {
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Returns the provider's event id.
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, CollaboratorError>;
    async fn update_event(
        &self,
        event_id: &str,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<(), CollaboratorError>;
    async fn delete_event(&self, event_id: &str) -> Result<(), CollaboratorError>;
}

/// Logs instead of calling a provider. Event ids look like `demo_event_202603020900`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DemoCalendar;

#[async_trait]
impl CalendarService for DemoCalendar {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, CollaboratorError> {
        let event_id = format!("{DEMO_EVENT_PREFIX}event_{}", event.start.format("%Y%m%d%H%M"));
        info!(
            event_name = "calendar.demo.create",
            event_id = %event_id,
            summary = %event.summary,
            attendees = event.attendees.len(),
            "demo calendar event created"
        );
        Ok(event_id)
    }

    async fn update_event(
        &self,
        event_id: &str,
        start: NaiveDateTime,
        _duration_minutes: u32,
    ) -> Result<(), CollaboratorError> {
        info!(event_name = "calendar.demo.update", event_id, start = %start, "demo calendar event moved");
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CollaboratorError> {
        info!(event_name = "calendar.demo.delete", event_id, "demo calendar event deleted");
        Ok(())
    }
}

/// Google Calendar v3 REST client using a pre-issued OAuth access token.
pub struct GoogleCalendar {
    client: Client,
    access_token: SecretString,
    calendar_id: String,
    timezone: String,
}

impl GoogleCalendar {
    pub fn new(
        client: Client,
        access_token: SecretString,
        calendar_id: String,
        timezone: String,
    ) -> Self {
        Self { client, access_token, calendar_id, timezone }
    }

    fn events_url(&self) -> String {
        format!("{EVENTS_BASE_URL}/{}/events", self.calendar_id)
    }

    fn event_time(&self, at: NaiveDateTime) -> Value {
        json!({"dateTime": at.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.timezone})
    }

    fn event_body(&self, event: &CalendarEvent) -> Value {
        json!({
            "summary": event.summary,
            "description": event.description,
            "start": self.event_time(event.start),
            "end": self.event_time(event.end()),
            "attendees": event.attendees.iter().map(|email| json!({"email": email})).collect::<Vec<_>>(),
            "reminders": {
                "useDefault": false,
                "overrides": [
                    {"method": "email", "minutes": 24 * 60},
                    {"method": "popup", "minutes": 30},
                ],
            },
        })
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(self.events_url())
            .query(&[("sendUpdates", "all")])
            .bearer_auth(self.access_token.expose_secret())
            .json(&self.event_body(event))
            .send()
            .await
            .map_err(|error| CollaboratorError::transport(SERVICE, error))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::from_response(SERVICE, response).await);
        }

        let created: Value =
            response.json().await.map_err(|error| CollaboratorError::transport(SERVICE, error))?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::Transport {
                service: SERVICE,
                message: "created event carried no id".to_string(),
            })
    }

    async fn update_event(
        &self,
        event_id: &str,
        start: NaiveDateTime,
        duration_minutes: u32,
    ) -> Result<(), CollaboratorError> {
        // events created while running without credentials never reached the provider
        if event_id.starts_with(DEMO_EVENT_PREFIX) {
            return Ok(());
        }
        let end = start + Duration::minutes(i64::from(duration_minutes));
        let response = self
            .client
            .patch(format!("{}/{event_id}", self.events_url()))
            .query(&[("sendUpdates", "all")])
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({"start": self.event_time(start), "end": self.event_time(end)}))
            .send()
            .await
            .map_err(|error| CollaboratorError::transport(SERVICE, error))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::from_response(SERVICE, response).await);
        }
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CollaboratorError> {
        if event_id.starts_with(DEMO_EVENT_PREFIX) {
            return Ok(());
        }
        let response = self
            .client
            .delete(format!("{}/{event_id}", self.events_url()))
            .query(&[("sendUpdates", "all")])
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| CollaboratorError::transport(SERVICE, error))?;

        // already gone counts as deleted
        if response.status().is_success() || response.status() == reqwest::StatusCode::GONE {
            return Ok(());
        }
        Err(CollaboratorError::from_response(SERVICE, response).await)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use reqwest::Client;
    use secrecy::SecretString;

    use super::{CalendarEvent, CalendarService, DemoCalendar, GoogleCalendar};

    fn event() -> CalendarEvent {
        CalendarEvent {
            summary: "Appointment: Demo Patient with Dr. Rahul Ahuja".to_string(),
            description: "Symptoms: cough".to_string(),
            start: NaiveDate::from_ymd_opt(2026, 3, 2)
                .and_then(|date| date.and_hms_opt(9, 30, 0))
                .expect("start"),
            duration_minutes: 30,
            attendees: vec!["patient@clinic.example".to_string()],
        }
    }

    #[tokio::test]
    async fn demo_event_ids_encode_start_time() {
        let id = DemoCalendar.create_event(&event()).await.expect("demo create");
        assert_eq!(id, "demo_event_202603020930");
        DemoCalendar.delete_event(&id).await.expect("demo delete");
    }

    #[tokio::test]
    async fn google_calendar_skips_demo_events() {
        let calendar = GoogleCalendar::new(
            Client::new(),
            SecretString::from("token".to_string()),
            "primary".to_string(),
            "UTC".to_string(),
        );
        let start = event().start;
        calendar.update_event("demo_event_202603020930", start, 30).await.expect("demo update");
        calendar.delete_event("demo_event_202603020930").await.expect("demo delete");
    }

    #[test]
    fn google_event_body_spans_the_consultation() {
        let calendar = GoogleCalendar::new(
            Client::new(),
            SecretString::from("token".to_string()),
            "primary".to_string(),
            "Asia/Kolkata".to_string(),
        );
        let body = calendar.event_body(&event());
        assert_eq!(body["start"]["dateTime"], "2026-03-02T09:30:00");
        assert_eq!(body["end"]["dateTime"], "2026-03-02T10:00:00");
        assert_eq!(body["start"]["timeZone"], "Asia/Kolkata");
        assert_eq!(body["attendees"][0]["email"], "patient@clinic.example");
    }
}
