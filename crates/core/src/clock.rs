use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Source of the clinic's wall-clock time.
///
/// Appointment times are clinic-local; audit timestamps are UTC. `Fixed`
/// pins both for deterministic tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn local_now(&self) -> NaiveDateTime {
        match self {
            Self::System => Local::now().naive_local(),
            Self::Fixed(at) => *at,
        }
    }

    pub fn utc_now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => Utc.from_utc_datetime(at),
        }
    }
}
