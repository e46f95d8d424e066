use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::calendar::{add_days, day_span, local_date};
use crate::model::*;

/// Per-day availability over one window, keyed by local date.
///
/// Only valid for the window and slot list it was built from. Days outside
/// the window are absent and read as unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayIndex {
    days: BTreeMap<NaiveDate, DayIndexEntry>,
}

impl DayIndex {
    pub fn get(&self, day: NaiveDate) -> Option<&DayIndexEntry> {
        self.days.get(&day)
    }

    pub fn has_availability(&self, day: NaiveDate) -> bool {
        self.days.get(&day).is_some_and(|e| e.has_availability)
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.days.contains_key(&day)
    }

    /// Entries in date order. `NaiveDate` displays as ISO `YYYY-MM-DD`.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DayIndexEntry)> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Build the day index for every local day in `[window_start, window_end)`.
///
/// A day holds the slots overlapping its full local span. It has
/// availability iff one of them has seats; zero-seat slots are listed but do
/// not make the day available.
///
/// Precondition: `slots` sorted by `start` and disjoint.
pub fn index_by_date(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    slots: &[TimeSlot],
    tz: Tz,
) -> DayIndex {
    debug_assert!(
        super::merge::is_sorted_disjoint(slots),
        "time slots must be sorted and disjoint"
    );
    let mut days = BTreeMap::new();
    if window_start >= window_end {
        return DayIndex { days };
    }

    // Sorted and disjoint means ends are sorted too, so a slot that ends
    // before one day starts can be skipped for every later day.
    let mut lo = 0;
    let mut day = local_date(window_start, tz);
    loop {
        let (day_start, day_end) = day_span(day, tz);
        if day_start >= window_end {
            break;
        }
        while lo < slots.len() && slots[lo].end <= day_start {
            lo += 1;
        }
        let time_slots: Vec<TimeSlot> = slots[lo..]
            .iter()
            .take_while(|s| s.start < day_end)
            .copied()
            .collect();
        let has_availability = time_slots.iter().any(TimeSlot::has_seats);
        days.insert(
            day,
            DayIndexEntry {
                has_availability,
                time_slots,
            },
        );

        let next = add_days(day, 1);
        if next == day {
            break;
        }
        day = next;
    }

    DayIndex { days }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::{America::Los_Angeles, Etc::UTC};

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, d, h, 0, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn covers_every_day_of_window() {
        let idx = index_by_date(at(1, 0), at(8, 0), &[], UTC);
        assert_eq!(idx.len(), 7);
        assert!(idx.contains_day(date(1)));
        assert!(idx.contains_day(date(7)));
        assert!(!idx.contains_day(date(8)));
        assert!(idx.iter().all(|(_, e)| !e.has_availability && e.time_slots.is_empty()));
    }

    #[test]
    fn slot_marks_overlapped_days() {
        let s = TimeSlot::new(at(2, 0), at(4, 0), 2);
        let idx = index_by_date(at(1, 0), at(6, 0), &[s], UTC);
        assert!(!idx.has_availability(date(1)));
        assert!(idx.has_availability(date(2)));
        assert!(idx.has_availability(date(3)));
        // Ends at midnight: the 4th is not overlapped.
        assert!(!idx.has_availability(date(4)));
        assert_eq!(idx.get(date(2)).unwrap().time_slots, vec![s]);
    }

    #[test]
    fn partial_day_slot_counts() {
        let s = TimeSlot::new(at(3, 10), at(3, 12), 1);
        let idx = index_by_date(at(1, 0), at(6, 0), &[s], UTC);
        assert!(idx.has_availability(date(3)));
        assert!(!idx.has_availability(date(2)));
        assert!(!idx.has_availability(date(4)));
    }

    #[test]
    fn zero_seat_slot_is_unavailable_but_listed() {
        let s = TimeSlot::new(at(2, 0), at(3, 0), 0);
        let idx = index_by_date(at(1, 0), at(5, 0), &[s], UTC);
        let entry = idx.get(date(2)).unwrap();
        assert!(!entry.has_availability);
        assert_eq!(entry.time_slots.len(), 1);
    }

    #[test]
    fn day_with_mixed_slots_is_available() {
        let full = TimeSlot::new(at(2, 0), at(2, 12), 0);
        let open = TimeSlot::new(at(2, 12), at(3, 0), 3);
        let idx = index_by_date(at(1, 0), at(5, 0), &[full, open], UTC);
        let entry = idx.get(date(2)).unwrap();
        assert!(entry.has_availability);
        assert_eq!(entry.time_slots, vec![full, open]);
    }

    #[test]
    fn days_are_local_to_zone() {
        // 2024-07-02 00:00 to 2024-07-03 00:00 UTC is July 1st 17:00 to
        // July 2nd 17:00 in Los Angeles.
        let s = TimeSlot::new(at(2, 0), at(3, 0), 1);
        let window_start = Los_Angeles
            .with_ymd_and_hms(2024, 7, 1, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let window_end = Los_Angeles
            .with_ymd_and_hms(2024, 7, 5, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let idx = index_by_date(window_start, window_end, &[s], Los_Angeles);
        assert_eq!(idx.len(), 4);
        assert!(idx.has_availability(date(1)));
        assert!(idx.has_availability(date(2)));
        assert!(!idx.has_availability(date(3)));
    }

    #[test]
    fn empty_window() {
        assert!(index_by_date(at(5, 0), at(5, 0), &[], UTC).is_empty());
        assert!(index_by_date(at(6, 0), at(5, 0), &[], UTC).is_empty());
    }

    #[test]
    fn absent_day_reads_unavailable() {
        let idx = index_by_date(at(1, 0), at(2, 0), &[], UTC);
        assert!(!idx.has_availability(date(20)));
        assert!(idx.get(date(20)).is_none());
    }
}
