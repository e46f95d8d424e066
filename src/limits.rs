/// Upper bound on the seat options offered for one booking.
pub const MAX_SEAT_OPTIONS: u32 = 100;

/// Longest booking horizon a marketplace may configure, in days.
pub const MAX_DAY_COUNT_AVAILABLE_FOR_BOOKING: u32 = 366;

/// Listings whose slot caches a single store keeps in memory.
pub const MAX_LISTINGS: usize = 10_000;

/// Months fetched by one `fetch_months` call.
pub const MAX_MONTHS_PER_FETCH: usize = 13;

/// Default booking horizon, in days.
pub const DEFAULT_DAY_COUNT_AVAILABLE_FOR_BOOKING: u32 = 90;
