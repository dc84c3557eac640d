use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%B %d, %Y"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Resolves a loosely-phrased date relative to `today`.
///
/// Accepts ISO dates, `today`/`now`/`tomorrow`/`yesterday`, `next <weekday>`,
/// `MM/DD/YYYY`, `DD/MM/YYYY`, `Month DD, YYYY` and `Month DD`. Keywords and
/// date tokens embedded in a longer phrase are also picked up. Anything else
/// resolves to `today`.
pub fn resolve_date(input: &str, today: NaiveDate) -> NaiveDate {
    let text = input.trim().to_lowercase();

    match text.as_str() {
        "today" | "now" => return today,
        "tomorrow" => return today + Duration::days(1),
        "yesterday" => return today - Duration::days(1),
        _ => {}
    }

    if let Some(date) = parse_exact(&text, today) {
        return date;
    }

    if text.contains("next") {
        if let Some(date) = next_weekday(&text, today) {
            return date;
        }
    }

    if text.contains("tomorrow") {
        return today + Duration::days(1);
    }
    if text.contains("yesterday") {
        return today - Duration::days(1);
    }

    for token in tokens(&text) {
        if let Some(date) = parse_exact(token, today) {
            return date;
        }
    }
    today
}

/// Resolves a booking timestamp: ISO/RFC 3339 first, then a natural phrase
/// such as `tomorrow at 3pm` or `2026-03-02 10:30`. Missing time defaults to 09:00.
pub fn resolve_datetime(input: &str, now: NaiveDateTime) -> NaiveDateTime {
    let trimmed = input.trim();

    let rfc3339 = trimmed.replace('Z', "+00:00");
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&rfc3339) {
        return parsed.naive_local();
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return parsed;
        }
    }

    let date = resolve_date(trimmed, now.date());
    let time = extract_time(&trimmed.to_lowercase()).unwrap_or_else(default_time);
    date.and_time(time)
}

/// `09:30 AM` style label used for offered slots.
pub fn format_slot_time(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

/// `March 02, 2026` style label used in tool messages.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

fn parse_exact(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    // `Month DD` carries no year; assume the current one.
    let with_year = format!("{text}, {}", today.year());
    NaiveDate::parse_from_str(&with_year, "%B %d, %Y").ok()
}

fn next_weekday(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (_, weekday) = WEEKDAYS.iter().find(|(name, _)| text.contains(name))?;
    let current = i64::from(today.weekday().num_days_from_monday());
    let target = i64::from(weekday.num_days_from_monday());
    let mut days_ahead = target - current;
    if days_ahead <= 0 {
        days_ahead += 7;
    }
    Some(today + Duration::days(days_ahead))
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|ch: char| ch.is_whitespace() || ch == ',')
        .map(|token| token.trim_matches(|ch: char| ch == '.' || ch == '(' || ch == ')'))
        .filter(|token| !token.is_empty())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Period {
    Am,
    Pm,
}

fn period_of(token: &str) -> Option<Period> {
    match token.trim_end_matches('.') {
        "am" | "a.m" => Some(Period::Am),
        "pm" | "p.m" => Some(Period::Pm),
        _ => None,
    }
}

fn split_period(token: &str) -> (&str, Option<Period>) {
    if let Some(clock) = token.strip_suffix("am") {
        return (clock, Some(Period::Am));
    }
    if let Some(clock) = token.strip_suffix("pm") {
        return (clock, Some(Period::Pm));
    }
    (token, None)
}

fn parse_clock(clock: &str) -> Option<(u32, u32)> {
    let (hour, minute) = match clock.split_once(':') {
        Some((hour, minute)) => (hour, minute),
        None => (clock, "0"),
    };
    if hour.is_empty() || hour.len() > 2 || !hour.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if minute.is_empty() || minute.len() > 2 || !minute.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some((hour.parse().ok()?, minute.parse().ok()?))
}

fn extract_time(text: &str) -> Option<NaiveTime> {
    let tokens = tokens(text).collect::<Vec<_>>();

    for (index, token) in tokens.iter().enumerate() {
        let (clock, mut period) = split_period(token);
        if clock.is_empty() {
            continue;
        }
        let Some((mut hour, minute)) = parse_clock(clock) else {
            continue;
        };
        if period.is_none() {
            period = tokens.get(index + 1).and_then(|next| period_of(next));
        }
        // a bare number ("March 5") is not a time of day
        if period.is_none() && !clock.contains(':') {
            continue;
        }

        match period {
            Some(Period::Pm) if hour < 12 => hour += 12,
            Some(Period::Am) if hour == 12 => hour = 0,
            _ => {}
        }

        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return Some(time);
        }
    }

    None
}
