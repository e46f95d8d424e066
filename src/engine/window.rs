use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar::{add_days, local_date, start_of_day};
use crate::model::*;

/// `[start of earliest fetched month, start of month after the latest)`.
///
/// Only months holding a slot array count (an empty array included); months
/// in flight, never requested, or failed do not. `None` when nothing has been
/// fetched yet; callers must not build a day index in that case.
pub fn fetched_range(monthly: &MonthlySlots, tz: Tz) -> Option<FetchedRange> {
    let mut fetched = monthly
        .iter()
        .filter(|(_, entry)| entry.is_fetched())
        .map(|(month, _)| *month);
    let first = fetched.next()?;
    let last = fetched.last().unwrap_or(first);
    Some(FetchedRange {
        start: first.start_in(tz),
        end: last.next().start_in(tz),
    })
}

/// Exclusive end of the bookable horizon: local midnight `day_count` days
/// after today.
pub fn horizon_end(now: DateTime<Utc>, tz: Tz, day_count: u32) -> DateTime<Utc> {
    start_of_day(add_days(local_date(now, tz), day_count.into()), tz)
}

/// Months prefetched for a listing: the current month and the next one,
/// minus any month that starts at or beyond the booking horizon.
pub fn months_to_fetch(now: DateTime<Utc>, tz: Tz, day_count: u32) -> Vec<MonthId> {
    let horizon = horizon_end(now, tz, day_count);
    let current = MonthId::of(now, tz);
    [current, current.next()]
        .into_iter()
        .filter(|m| m.start_in(tz) < horizon)
        .collect()
}

/// Instant window to request for `month`: the month clamped to
/// `[start of today, horizon end)`. `None` if nothing of it is bookable.
pub fn fetch_window(
    month: MonthId,
    now: DateTime<Utc>,
    tz: Tz,
    day_count: u32,
) -> Option<FetchedRange> {
    let today_start = start_of_day(local_date(now, tz), tz);
    let start = month.start_in(tz).max(today_start);
    let end = month.next().start_in(tz).min(horizon_end(now, tz, day_count));
    (start < end).then_some(FetchedRange { start, end })
}
