use crate::calendar::event::EventRecord;

/// Replaces the record with the same id in place, or appends it.
/// Returns `true` when an existing record was replaced.
pub fn upsert_by_id(events: &mut Vec<EventRecord>, record: EventRecord) -> bool {
    match events.iter_mut().find(|existing| existing.id == record.id) {
        Some(existing) => {
            *existing = record;
            true
        }
        None => {
            events.push(record);
            false
        }
    }
}

/// Removes the record with the given id. Unknown ids leave the list untouched.
pub fn remove_by_id(events: &mut Vec<EventRecord>, id: &str) -> bool {
    let before = events.len();
    events.retain(|event| event.id != id);
    events.len() != before
}

/// Collects records so that each id appears once: the first position wins,
/// the last value wins.
pub fn dedup_by_id(records: impl IntoIterator<Item = EventRecord>) -> Vec<EventRecord> {
    let mut events = Vec::new();
    for record in records {
        upsert_by_id(&mut events, record);
    }
    events
}

pub fn find_by_id<'a>(events: &'a [EventRecord], id: &str) -> Option<&'a EventRecord> {
    events.iter().find(|event| event.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::event::EventForm;

    fn record(id: &str, title: &str) -> EventRecord {
        EventRecord::from_form(&EventForm {
            id: Some(id.to_string()),
            title: title.to_string(),
            start_date: "2024-03-10".to_string(),
            ..EventForm::default()
        })
        .unwrap()
    }

    fn ids(events: &[EventRecord]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn upsert_appends_new_record() {
        let mut events = vec![record("a", "A")];

        let replaced = upsert_by_id(&mut events, record("b", "B"));

        assert!(!replaced);
        assert_eq!(ids(&events), vec!["a", "b"]);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut events = vec![record("a", "A"), record("b", "B"), record("c", "C")];

        let replaced = upsert_by_id(&mut events, record("b", "B2"));

        assert!(replaced);
        assert_eq!(ids(&events), vec!["a", "b", "c"]);
        assert_eq!(events[1].title, "B2");
    }

    #[test]
    fn remove_existing_drops_exactly_one() {
        let mut events = vec![record("a", "A"), record("b", "B"), record("c", "C")];

        assert!(remove_by_id(&mut events, "b"));

        assert_eq!(events.len(), 2);
        assert!(find_by_id(&events, "b").is_none());
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut events = vec![record("a", "A"), record("b", "B")];

        assert!(!remove_by_id(&mut events, "zzz"));

        assert_eq!(ids(&events), vec!["a", "b"]);
    }

    #[test]
    fn dedup_keeps_first_position_and_last_value() {
        let events = dedup_by_id(vec![record("a", "A"), record("b", "B"), record("a", "A2")]);

        assert_eq!(ids(&events), vec!["a", "b"]);
        assert_eq!(events[0].title, "A2");
    }
}
