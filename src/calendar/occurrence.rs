use chrono::NaiveDate;

use crate::calendar::event::EventRecord;

/// True when `date` lies in the record's inclusive `[start_date, end_date]` range.
pub fn occurs_on(record: &EventRecord, date: NaiveDate) -> bool {
    record.start_date <= date && date <= record.end_date
}

/// Records occurring on `date`, in list order (not sorted by time).
pub fn events_on(events: &[EventRecord], date: NaiveDate) -> Vec<&EventRecord> {
    events.iter().filter(|event| occurs_on(event, date)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::event::EventForm;
    use proptest::prelude::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn ranged(id: &str, start: &str, end: &str, time: &str) -> EventRecord {
        EventRecord::from_form(&EventForm {
            id: Some(id.to_string()),
            title: id.to_string(),
            start_date: start.to_string(),
            end_date: end.to_string(),
            start_time: time.to_string(),
            ..EventForm::default()
        })
        .unwrap()
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let trip = ranged("trip", "2024-03-10", "2024-03-12", "");

        assert!(occurs_on(&trip, date(2024, 3, 10)));
        assert!(occurs_on(&trip, date(2024, 3, 11)));
        assert!(occurs_on(&trip, date(2024, 3, 12)));
        assert!(!occurs_on(&trip, date(2024, 3, 9)));
        assert!(!occurs_on(&trip, date(2024, 3, 13)));
    }

    #[test]
    fn range_spans_month_boundary() {
        let trip = ranged("trip", "2024-01-30", "2024-02-02", "");

        assert!(occurs_on(&trip, date(2024, 1, 31)));
        assert!(occurs_on(&trip, date(2024, 2, 1)));
        assert!(!occurs_on(&trip, date(2024, 2, 3)));
    }

    #[test]
    fn events_on_keeps_list_order_not_time_order() {
        let events = vec![
            ranged("late", "2024-03-10", "", "21:00"),
            ranged("other-day", "2024-03-11", "", "09:00"),
            ranged("early", "2024-03-10", "", "08:00"),
        ];

        let ids: Vec<_> = events_on(&events, date(2024, 3, 10))
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();

        assert_eq!(ids, vec!["late", "early"]);
    }

    #[test]
    fn events_on_empty_day_is_empty() {
        let events = vec![ranged("a", "2024-03-10", "", "")];

        assert!(events_on(&events, date(2024, 4, 1)).is_empty());
    }

    proptest! {
        #[test]
        fn occurs_on_matches_day_arithmetic(start_offset in 0i64..400, length in 0i64..20, probe in -5i64..430) {
            let base = date(2024, 1, 1);
            let start = base + chrono::Duration::days(start_offset);
            let end = start + chrono::Duration::days(length);
            let record = ranged(
                "r",
                &start.format("%Y-%m-%d").to_string(),
                &end.format("%Y-%m-%d").to_string(),
                "",
            );
            let day = base + chrono::Duration::days(probe);

            prop_assert_eq!(occurs_on(&record, day), start <= day && day <= end);
        }
    }
}
