use chrono::{DateTime, Utc};

use crate::limits::MAX_SEAT_OPTIONS;
use crate::model::*;

/// Seat counts selectable for a booking over `[start, end]`: `1..=n` where
/// `n` is the seat count of the scarcest slot touching the range, capped at
/// [`MAX_SEAT_OPTIONS`]. Empty when a bound is missing or no slot touches
/// the range.
pub fn min_seats_options(
    slots: &[TimeSlot],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<u32> {
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };

    // min_by_key keeps the first of equal minima, i.e. the earliest slot.
    let scarcest = slots
        .iter()
        .filter(|s| {
            let covers_start = s.start <= start && s.end > start;
            let contained = s.start >= start && s.end <= end;
            let covers_end = s.start < end && s.end >= end;
            covers_start || contained || covers_end
        })
        .min_by_key(|s| s.seats);

    match scarcest {
        Some(slot) => (1..=slot.seats.min(MAX_SEAT_OPTIONS)).collect(),
        None => Vec::new(),
    }
}
