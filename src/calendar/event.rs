use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::category::Category;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("Record has no id")]
    MissingId,
    #[error("Title is required")]
    MissingTitle,
    #[error("Start date is required")]
    MissingStartDate,
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
}

/// A calendar event in its current shape.
///
/// Stored and transmitted as a [`StoredRecord`]; deserializing always runs
/// [`migrate`], so legacy data never reaches the in-memory set unconverted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord", into = "StoredRecord")]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub start_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_date: NaiveDate,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// Raw record as found in storage: either the current camelCase shape or the
/// legacy flat `date`/`time` shape. Every field is lenient so that old or
/// hand-edited data can still be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl EventRecord {
    /// Always derived from the category.
    pub fn color(&self) -> &'static str {
        self.category.color()
    }

    pub fn glyph(&self) -> &'static str {
        self.category.glyph()
    }

    pub fn is_all_day(&self) -> bool {
        self.start_time.is_none()
    }

    /// End time to display or export: the explicit end time, else the start time.
    pub fn effective_end_time(&self) -> Option<NaiveTime> {
        self.end_time.or(self.start_time)
    }

    pub fn spans_multiple_days(&self) -> bool {
        self.end_date > self.start_date
    }

    /// Builds a record from form input, assigning a fresh id unless the form
    /// is editing an existing record.
    pub fn from_form(form: &EventForm) -> Result<Self, RecordError> {
        let title = form.title.trim();
        if title.is_empty() {
            return Err(RecordError::MissingTitle);
        }

        let start_date = match non_blank(&form.start_date) {
            Some(value) => parse_date(value)?,
            None => return Err(RecordError::MissingStartDate),
        };
        let start_time = non_blank(&form.start_time).map(parse_time).transpose()?;
        let end_date = non_blank(&form.end_date).map(parse_date).transpose()?;
        let end_time = non_blank(&form.end_time).map(parse_time).transpose()?;

        let id = form
            .id
            .as_deref()
            .and_then(non_blank)
            .map(str::to_string)
            .unwrap_or_else(new_event_id);

        Ok(Self {
            id,
            title: title.to_string(),
            category: Category::from_label_or_fallback(non_blank(&form.category)),
            start_date,
            start_time,
            end_date: clamp_end_date(start_date, end_date),
            end_time,
            location: non_blank(&form.location).map(str::to_string),
            description: non_blank(&form.description).map(|_| form.description.clone()),
            last_modified: now_millis(),
        })
    }

    /// Stamps the record as written now.
    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }
}

/// Converts any stored record into the current shape.
///
/// Legacy `date`/`time` fields move to `startDate`/`startTime` when no
/// `startDate` is present and are dropped either way. A missing or unknown
/// category becomes the fallback. Running it on an already-current record
/// changes nothing.
pub fn migrate(raw: StoredRecord) -> Result<EventRecord, RecordError> {
    let StoredRecord {
        id,
        title,
        category,
        color: _,
        start_date,
        start_time,
        end_date,
        end_time,
        location,
        description,
        last_modified,
        date,
        time,
    } = raw;

    if id.trim().is_empty() {
        return Err(RecordError::MissingId);
    }

    let is_current = start_date.as_deref().and_then(non_blank).is_some();
    let (start_date, start_time) = if is_current { (start_date, start_time) } else { (date, time) };

    let start_date = match start_date.as_deref().and_then(non_blank) {
        Some(value) => parse_date(value)?,
        None => return Err(RecordError::MissingStartDate),
    };
    let start_time = start_time.as_deref().and_then(non_blank).and_then(lenient_time);
    let end_date = end_date
        .as_deref()
        .and_then(non_blank)
        .and_then(|value| parse_date(value).ok());
    let end_time = end_time.as_deref().and_then(non_blank).and_then(lenient_time);

    let last_modified = last_modified
        .as_deref()
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc).trunc_subsecs(3))
        .unwrap_or_default();

    Ok(EventRecord {
        id,
        title,
        category: Category::from_label_or_fallback(category.as_deref()),
        start_date,
        start_time,
        end_date: clamp_end_date(start_date, end_date),
        end_time,
        location: location.filter(|value| !value.trim().is_empty()),
        description: description.filter(|value| !value.trim().is_empty()),
        last_modified,
    })
}

impl TryFrom<StoredRecord> for EventRecord {
    type Error = RecordError;

    fn try_from(raw: StoredRecord) -> Result<Self, Self::Error> {
        migrate(raw)
    }
}

impl From<EventRecord> for StoredRecord {
    fn from(record: EventRecord) -> Self {
        Self {
            color: Some(record.color().to_string()),
            category: Some(record.category.key().to_string()),
            start_date: Some(record.start_date.format(DATE_FORMAT).to_string()),
            start_time: record.start_time.map(format_time),
            end_date: Some(record.end_date.format(DATE_FORMAT).to_string()),
            end_time: record.end_time.map(format_time),
            last_modified: Some(
                record
                    .last_modified
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            id: record.id,
            title: record.title,
            location: record.location,
            description: record.description,
            date: None,
            time: None,
        }
    }
}

/// Raw field values of the add/edit form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventForm {
    pub id: Option<String>,
    pub title: String,
    pub category: String,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    pub location: String,
    pub description: String,
}

impl EventForm {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            start_date: date.format(DATE_FORMAT).to_string(),
            ..Self::default()
        }
    }

    pub fn for_record(record: &EventRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            title: record.title.clone(),
            category: record.category.key().to_string(),
            start_date: record.start_date.format(DATE_FORMAT).to_string(),
            start_time: record.start_time.map(format_time).unwrap_or_default(),
            end_date: record.end_date.format(DATE_FORMAT).to_string(),
            end_time: record.end_time.map(format_time).unwrap_or_default(),
            location: record.location.clone().unwrap_or_default(),
            description: record.description.clone().unwrap_or_default(),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.id.is_some()
    }
}

pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, RecordError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| RecordError::InvalidDate(value.to_string()))
}

/// Parses `HH:MM` (seconds are accepted and dropped).
pub fn parse_time(value: &str) -> Result<NaiveTime, RecordError> {
    let trimmed = value.trim();
    let time = NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| RecordError::InvalidTime(value.to_string()))?;
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0)
        .ok_or_else(|| RecordError::InvalidTime(value.to_string()))
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn lenient_time(value: &str) -> Option<NaiveTime> {
    match parse_time(value) {
        Ok(time) => Some(time),
        Err(e) => {
            tracing::warn!("Ignoring stored time: {}", e);
            None
        }
    }
}

fn clamp_end_date(start: NaiveDate, end: Option<NaiveDate>) -> NaiveDate {
    end.filter(|end| *end >= start).unwrap_or(start)
}

fn non_blank(value: &str) -> Option<&str> {
    (!value.trim().is_empty()).then_some(value)
}

fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
