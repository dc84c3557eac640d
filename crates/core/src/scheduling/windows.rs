use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::appointment::AppointmentStatus;
use crate::errors::DomainError;

/// Half-open `[start, end)` range of clinic-local dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date + Duration::days(1) }
    }

    pub fn week_of(date: NaiveDate) -> Self {
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        Self { start: monday, end: monday + Duration::days(7) }
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.end.and_time(NaiveTime::MIN)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start_at() && at < self.end_at()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsQuery {
    Yesterday,
    Today,
    Tomorrow,
    ThisWeek,
    BySymptom,
}

impl StatsQuery {
    pub const ALL: [StatsQuery; 5] =
        [Self::Yesterday, Self::Today, Self::Tomorrow, Self::ThisWeek, Self::BySymptom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yesterday => "yesterday",
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::ThisWeek => "this_week",
            Self::BySymptom => "by_symptom",
        }
    }

    /// Phrase used when the count is reported back, e.g. "patients visited yesterday".
    pub fn label(&self) -> &'static str {
        match self {
            Self::Yesterday => "patients visited yesterday",
            Self::Today => "appointments today",
            Self::Tomorrow => "appointments scheduled for tomorrow",
            Self::ThisWeek => "appointments this week",
            Self::BySymptom => "patients with matching symptoms",
        }
    }

    pub fn window(&self, today: NaiveDate) -> StatsWindow {
        match self {
            Self::Yesterday => StatsWindow {
                span: Some(DateSpan::day(today - Duration::days(1))),
                statuses: &[AppointmentStatus::Completed],
            },
            Self::Today => StatsWindow {
                span: Some(DateSpan::day(today)),
                statuses: &[AppointmentStatus::Scheduled, AppointmentStatus::Completed],
            },
            Self::Tomorrow => StatsWindow {
                span: Some(DateSpan::day(today + Duration::days(1))),
                statuses: &[AppointmentStatus::Scheduled],
            },
            Self::ThisWeek => StatsWindow { span: Some(DateSpan::week_of(today)), statuses: &[] },
            Self::BySymptom => StatsWindow { span: None, statuses: &[] },
        }
    }
}

impl std::str::FromStr for StatsQuery {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|query| query.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| DomainError::InvariantViolation(format!("unknown query type `{value}`")))
    }
}

/// Date span plus status filter for one statistics query. An empty
/// `statuses` slice means any status; `span: None` means any date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatsWindow {
    pub span: Option<DateSpan>,
    pub statuses: &'static [AppointmentStatus],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    Today,
    Tomorrow,
    ThisWeek,
    NextWeek,
}

impl DateRange {
    pub const ALL: [DateRange; 4] = [Self::Today, Self::Tomorrow, Self::ThisWeek, Self::NextWeek];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::ThisWeek => "this_week",
            Self::NextWeek => "next_week",
        }
    }

    pub fn span(&self, today: NaiveDate) -> DateSpan {
        match self {
            Self::Today => DateSpan::day(today),
            Self::Tomorrow => DateSpan::day(today + Duration::days(1)),
            Self::ThisWeek => DateSpan::week_of(today),
            Self::NextWeek => DateSpan::week_of(today + Duration::days(7)),
        }
    }
}

impl std::str::FromStr for DateRange {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|range| range.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| DomainError::InvariantViolation(format!("unknown date range `{value}`")))
    }
}
