use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Report,
    Appointment,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Appointment => "appointment",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "report" => Self::Report,
            "appointment" => Self::Appointment,
            _ => Self::System,
        }
    }
}

/// In-app notification. Recipients are free-form ids (user or doctor ids).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: String,
    pub content: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    /// Derived from the read-receipt log; never written in place.
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}
