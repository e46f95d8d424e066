use chrono::{DateTime, Utc};

use crate::model::*;

/// Concatenate every fetched month in key order and coalesce back-to-back
/// slots with equal seat counts.
///
/// Upstream fetches in monthly chunks, so one continuous run of availability
/// can arrive split at a month boundary. Months that are unfetched or whose
/// latest fetch failed contribute nothing.
///
/// Precondition: each month's slots are sorted by `start` and disjoint, and
/// months do not overlap each other.
pub fn flatten_and_merge(monthly: &MonthlySlots) -> Vec<TimeSlot> {
    let all: Vec<TimeSlot> = monthly
        .values()
        .filter_map(MonthlySlotEntry::fetched_slots)
        .flatten()
        .copied()
        .collect();
    merge_adjacent(all)
}

/// Run-length encode an already flat, sorted, disjoint slot list.
/// Idempotent: merging merged output changes nothing.
pub fn merge_adjacent(slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
    debug_assert!(is_sorted_disjoint(&slots), "time slots must be sorted and disjoint");
    let mut merged: Vec<TimeSlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        if let Some(last) = merged.last_mut()
            && last.is_adjacent_to(&slot)
            && last.seats == slot.seats
        {
            last.end = slot.end;
            continue;
        }
        merged.push(slot);
    }
    merged
}

/// The whole contiguous block around the slot containing `selected_start`.
///
/// Neighbours are joined while they are back-to-back, whatever their seat
/// counts: this rebuilds the span a user may drag a selection across, it
/// does not collapse runs for display. The result carries the seats of the
/// slot containing `selected_start`. Empty if no slot contains it.
pub fn combine_around_selected_start(
    slots: &[TimeSlot],
    selected_start: DateTime<Utc>,
) -> Vec<TimeSlot> {
    debug_assert!(is_sorted_disjoint(slots), "time slots must be sorted and disjoint");
    let Some(idx) = slots.iter().position(|s| s.contains_instant(selected_start)) else {
        return Vec::new();
    };

    let mut first = idx;
    while first > 0 && slots[first - 1].is_adjacent_to(&slots[first]) {
        first -= 1;
    }
    let mut last = idx;
    while last + 1 < slots.len() && slots[last].is_adjacent_to(&slots[last + 1]) {
        last += 1;
    }

    vec![TimeSlot {
        start: slots[first].start,
        end: slots[last].end,
        ..slots[idx]
    }]
}

pub(crate) fn is_sorted_disjoint(slots: &[TimeSlot]) -> bool {
    slots.windows(2).all(|w| w[0].end <= w[1].start)
}
