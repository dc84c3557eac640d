use chrono::{Duration, NaiveTime};

use crate::domain::doctor::TimeWindow;

/// Fixed-width bucket scan over the day's windows minus already-booked start times.
///
/// A bucket is offered only when it fits entirely inside its window.
pub fn available_slots(
    windows: &[TimeWindow],
    consultation_minutes: u32,
    booked: &[NaiveTime],
) -> Vec<NaiveTime> {
    if consultation_minutes == 0 {
        return Vec::new();
    }
    let width = Duration::minutes(i64::from(consultation_minutes));

    let mut slots = Vec::new();
    for window in windows {
        let mut cursor = window.start;
        loop {
            let (end, wrapped) = cursor.overflowing_add_signed(width);
            if wrapped != 0 || end > window.end {
                break;
            }
            if !booked.contains(&cursor) {
                slots.push(cursor);
            }
            cursor = end;
        }
    }
    slots
}
