// ── Fetch metrics (request-driven) ──────────────────────────────

/// Counter: month fetches issued against the time-slot source. Labels: status.
pub const SLOT_FETCHES_TOTAL: &str = "bookable_slot_fetches_total";

/// Histogram: time-slot source latency in seconds.
pub const SLOT_FETCH_DURATION_SECONDS: &str = "bookable_slot_fetch_duration_seconds";

/// Counter: month fetches skipped because the month was cached or in flight.
pub const SLOT_FETCHES_SKIPPED_TOTAL: &str = "bookable_slot_fetches_skipped_total";

// ── Cache metrics (resource utilization) ────────────────────────

/// Gauge: listings with a slot cache in memory.
pub const LISTINGS_CACHED: &str = "bookable_listings_cached";

/// Label value for a fetch outcome.
pub fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(_) => "error",
    }
}
