use chrono::{Datelike, Months, NaiveDate, NaiveTime, Timelike, Weekday};

use crate::calendar::{events_on, EventRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub title: String,
    pub weeks: Vec<Week>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Week {
    pub days: Vec<DayCell>,
}

/// One grid cell. Padding cells before the 1st and after the last day have no date.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: Option<NaiveDate>,
    pub is_today: bool,
    pub events: Vec<EventChip>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventChip {
    pub id: String,
    pub title: String,
    pub color: &'static str,
    pub glyph: &'static str,
    pub time_label: Option<String>,
}

impl DayCell {
    pub fn empty() -> Self {
        Self {
            date: None,
            is_today: false,
            events: Vec::new(),
        }
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

impl From<&EventRecord> for EventChip {
    fn from(event: &EventRecord) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            color: event.color(),
            glyph: event.glyph(),
            time_label: event.start_time.map(format_time_12h),
        }
    }
}

/// `19:30` → `7:30PM`, `00:05` → `12:05AM`.
pub fn format_time_12h(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    format!("{}:{:02}{}", hour, time.minute(), if is_pm { "PM" } else { "AM" })
}

/// Same day of month in the month `delta` months away, clamped to that month's length.
pub fn shift_month(anchor: NaiveDate, delta: i32) -> NaiveDate {
    let months = Months::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
        anchor.checked_add_months(months)
    } else {
        anchor.checked_sub_months(months)
    };
    shifted.unwrap_or(anchor)
}

/// Sunday-first grid for the month containing `anchor`.
pub fn render_month(events: &[EventRecord], anchor: NaiveDate, today: NaiveDate) -> MonthView {
    let year = anchor.year();
    let month = anchor.month();

    let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return MonthView { year, month, title: String::new(), weeks: Vec::new() };
    };
    let title = first_day.format("%B %Y").to_string();

    let Some(last_day) = first_day
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
    else {
        return MonthView { year, month, title, weeks: Vec::new() };
    };

    let mut weeks = Vec::new();
    let mut current_week = Week { days: Vec::new() };

    let days_before = first_day.weekday().num_days_from_sunday();
    for _ in 0..days_before {
        current_week.days.push(DayCell::empty());
    }

    let mut current_date = first_day;
    while current_date <= last_day {
        current_week.days.push(DayCell {
            date: Some(current_date),
            is_today: current_date == today,
            events: events_on(events, current_date)
                .into_iter()
                .map(EventChip::from)
                .collect(),
        });

        if current_date.weekday() == Weekday::Sat {
            weeks.push(current_week);
            current_week = Week { days: Vec::new() };
        }

        let Some(next) = current_date.succ_opt() else { break };
        current_date = next;
    }

    if !current_week.days.is_empty() {
        while current_week.days.len() < 7 {
            current_week.days.push(DayCell::empty());
        }
        weeks.push(current_week);
    }

    MonthView { year, month, title, weeks }
}
