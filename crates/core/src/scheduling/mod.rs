//! Deterministic scheduling rules shared by the booking tools.
//!
//! Everything here is pure: callers pass "today" (or "now") in explicitly so
//! the rules can be exercised against fixed dates.

pub mod dates;
pub mod slots;
pub mod windows;

pub use dates::{format_long_date, format_slot_time, resolve_date, resolve_datetime};
pub use slots::available_slots;
pub use windows::{DateRange, DateSpan, StatsQuery, StatsWindow};
