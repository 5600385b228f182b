//! iCalendar (RFC 5545) export of the event set.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::calendar::EventRecord;
use crate::storage::config::ExportConfig;

pub const UID_DOMAIN: &str = "sharedcalendar.local";

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Calendar-level header values.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarMeta {
    pub name: String,
    pub description: String,
}

impl Default for CalendarMeta {
    fn default() -> Self {
        let export = ExportConfig::default();
        Self::from(&export)
    }
}

impl From<&ExportConfig> for CalendarMeta {
    fn from(config: &ExportConfig) -> Self {
        Self {
            name: config.calendar_name.clone(),
            description: config.calendar_description.clone(),
        }
    }
}

/// Renders all events, stamped with the current instant.
pub fn render(events: &[EventRecord], meta: &CalendarMeta) -> String {
    render_at(events, meta, Utc::now())
}

/// Renders all events in list order, using `now` for every `DTSTAMP`.
pub fn render_at(events: &[EventRecord], meta: &CalendarMeta, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Our Shared Calendar//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(&meta.name)),
        "X-WR-TIMEZONE:UTC".to_string(),
        format!("X-WR-CALDESC:{}", escape_text(&meta.description)),
    ];

    let stamp = now.format(STAMP_FORMAT).to_string();
    for event in events {
        push_event(&mut lines, event, &stamp);
    }

    lines.push("END:VCALENDAR".to_string());
    lines.join("\n")
}

fn push_event(lines: &mut Vec<String>, event: &EventRecord, stamp: &str) {
    lines.push("BEGIN:VEVENT".to_string());
    lines.push(format!("UID:{}@{}", event.id, UID_DOMAIN));
    lines.push(format!("DTSTAMP:{}", stamp));
    lines.push(format!("DTSTART:{}", local_datetime(event.start_date, event.start_time)));
    lines.push(format!(
        "DTEND:{}",
        local_datetime(event.end_date, event.effective_end_time())
    ));
    lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
    lines.push(format!("CATEGORIES:{}", escape_text(event.category.label())));

    if let Some(location) = &event.location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(description) = &event.description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }

    lines.push(format!(
        "LAST-MODIFIED:{}",
        event.last_modified.format(STAMP_FORMAT)
    ));
    lines.push("END:VEVENT".to_string());
}

/// Floating local time: `YYYYMMDDThhmmss`, midnight when no time is set.
fn local_datetime(date: NaiveDate, time: Option<NaiveTime>) -> String {
    let time = time
        .map(|time| time.format("%H%M%S").to_string())
        .unwrap_or_else(|| "000000".to_string());
    format!("{}T{}", date.format("%Y%m%d"), time)
}

/// TEXT value escaping: backslash, semicolon, comma and line breaks.
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                escaped.push_str("\\n");
            }
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
