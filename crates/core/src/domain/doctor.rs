use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

pub const DEFAULT_CONSULTATION_MINUTES: u32 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DoctorId(pub String);

/// One bookable window inside a working day, e.g. `09:00`..`12:00`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }
}

/// Static weekly pattern keyed by lowercase weekday name (`"monday"`).
///
/// Stored as JSON, e.g. `{"monday": [{"start": "09:00", "end": "12:00"}]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyAvailability(pub BTreeMap<String, Vec<TimeWindow>>);

impl WeeklyAvailability {
    pub fn with_day(mut self, weekday: Weekday, windows: Vec<TimeWindow>) -> Self {
        self.0.insert(weekday_key(weekday).to_string(), windows);
        self
    }

    pub fn windows_for(&self, weekday: Weekday) -> &[TimeWindow] {
        self.0.get(weekday_key(weekday)).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub user_id: Option<UserId>,
    pub name: String,
    pub specialty: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub availability: WeeklyAvailability,
    pub consultation_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Weekday};

    use super::{TimeWindow, WeeklyAvailability};

    #[test]
    fn weekly_pattern_parses_hour_minute_windows() {
        let pattern: WeeklyAvailability = serde_json::from_str(
            r#"{"monday": [{"start": "09:00", "end": "12:00"}, {"start": "14:00", "end": "17:30"}]}"#,
        )
        .expect("pattern should parse");

        let monday = pattern.windows_for(Weekday::Mon);
        assert_eq!(monday.len(), 2);
        assert_eq!(monday[1].end, NaiveTime::from_hms_opt(17, 30, 0).expect("time"));
        assert!(pattern.windows_for(Weekday::Sun).is_empty());
    }

    #[test]
    fn weekly_pattern_serializes_back_to_hour_minute_strings() {
        let pattern = WeeklyAvailability::default().with_day(
            Weekday::Fri,
            vec![TimeWindow::new(
                NaiveTime::from_hms_opt(8, 0, 0).expect("start"),
                NaiveTime::from_hms_opt(10, 0, 0).expect("end"),
            )],
        );

        let json = serde_json::to_string(&pattern).expect("serialize");
        assert_eq!(json, r#"{"friday":[{"start":"08:00","end":"10:00"}]}"#);
    }
}
