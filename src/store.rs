use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::config::CalendarConfig;
use crate::engine::{fetch_window, months_to_fetch, EngineError, ListingCalendar};
use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability::*;
use crate::source::TimeSlotSource;

pub type SharedMonthlySlots = Arc<RwLock<MonthlySlots>>;

/// What one batch of month fetches did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub fetched: Vec<MonthId>,
    pub failed: Vec<MonthId>,
    /// Already cached, in flight, or outside the booking horizon.
    pub skipped: Vec<MonthId>,
}

/// Per-listing month-keyed slot caches in front of a [`TimeSlotSource`].
///
/// Locks are never held across a source call; readers get cloned snapshots.
pub struct SlotStore {
    listings: DashMap<Ulid, SharedMonthlySlots>,
    creating: Mutex<()>,
    max_listings: usize,
    source: Arc<dyn TimeSlotSource>,
    pub notify: Arc<NotifyHub>,
    config: CalendarConfig,
}

impl SlotStore {
    pub fn new(source: Arc<dyn TimeSlotSource>, config: CalendarConfig) -> Self {
        Self {
            listings: DashMap::new(),
            creating: Mutex::new(()),
            max_listings: MAX_LISTINGS,
            source,
            notify: Arc::new(NotifyHub::new()),
            config,
        }
    }

    /// Lower the listing cap below [`MAX_LISTINGS`].
    pub fn with_max_listings(mut self, max_listings: usize) -> Self {
        self.max_listings = max_listings.min(MAX_LISTINGS);
        self
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    /// Get or lazily create the cache for a listing.
    fn get_or_create(&self, listing_id: Ulid) -> Result<SharedMonthlySlots, EngineError> {
        if let Some(cache) = self.listings.get(&listing_id) {
            return Ok(cache.value().clone());
        }
        // Serialized so concurrent first fetches cannot overshoot the cap.
        let _creating = self.creating.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cache) = self.listings.get(&listing_id) {
            return Ok(cache.value().clone());
        }
        if self.listings.len() >= self.max_listings {
            return Err(EngineError::LimitExceeded("too many listings"));
        }
        let cache = self.listings.entry(listing_id).or_default().value().clone();
        metrics::gauge!(LISTINGS_CACHED).set(self.listings.len() as f64);
        Ok(cache)
    }

    /// Drop a listing's cache and its notification channel.
    pub fn evict(&self, listing_id: &Ulid) {
        self.listings.remove(listing_id);
        self.notify.remove(listing_id);
        metrics::gauge!(LISTINGS_CACHED).set(self.listings.len() as f64);
    }

    /// Copy of a listing's month map as of now. Empty if never fetched.
    pub async fn snapshot(&self, listing_id: Ulid) -> MonthlySlots {
        let cache = self.listings.get(&listing_id).map(|e| e.value().clone());
        match cache {
            Some(cache) => cache.read().await.clone(),
            None => MonthlySlots::new(),
        }
    }

    pub async fn calendar(&self, listing_id: Ulid) -> ListingCalendar {
        ListingCalendar::from_monthly(&self.snapshot(listing_id).await, self.config.time_zone)
    }

    /// Prefetch the current and next month.
    pub async fn fetch_monthly_time_slots(
        &self,
        listing_id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<FetchReport, EngineError> {
        let months = months_to_fetch(
            now,
            self.config.time_zone,
            self.config.day_count_available_for_booking,
        );
        self.fetch_months(listing_id, &months, now).await
    }

    /// Fetch a month a picker navigated to, and the one after it.
    pub async fn fetch_for_visible_month(
        &self,
        listing_id: Ulid,
        month: MonthId,
        now: DateTime<Utc>,
    ) -> Result<FetchReport, EngineError> {
        self.fetch_months(listing_id, &[month, month.next()], now).await
    }

    /// Fetch every listed month that is neither cached nor in flight,
    /// concurrently. A month whose last fetch failed is fetched again.
    pub async fn fetch_months(
        &self,
        listing_id: Ulid,
        months: &[MonthId],
        now: DateTime<Utc>,
    ) -> Result<FetchReport, EngineError> {
        if months.len() > MAX_MONTHS_PER_FETCH {
            return Err(EngineError::LimitExceeded("too many months in one fetch"));
        }
        let cache = self.get_or_create(listing_id)?;
        let (claimed, skipped) = self
            .claim(&cache, months, now, |entry| {
                !entry.fetch_in_progress && !entry.is_fetched()
            })
            .await;
        self.run_claimed(listing_id, &cache, claimed, skipped).await
    }

    /// Re-issue fetches for months whose last fetch failed.
    pub async fn retry_failed(
        &self,
        listing_id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<FetchReport, EngineError> {
        let failed: Vec<MonthId> = self
            .snapshot(listing_id)
            .await
            .iter()
            .filter(|(_, e)| e.fetch_error.is_some())
            .map(|(m, _)| *m)
            .collect();
        if failed.is_empty() {
            return Ok(FetchReport::default());
        }
        let cache = self.get_or_create(listing_id)?;
        let (claimed, skipped) = self
            .claim(&cache, &failed, now, |entry| {
                !entry.fetch_in_progress && entry.fetch_error.is_some()
            })
            .await;
        self.run_claimed(listing_id, &cache, claimed, skipped).await
    }

    /// Fetch one month unconditionally, replacing whatever is cached.
    pub async fn fetch_month(
        &self,
        listing_id: Ulid,
        month: MonthId,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let cache = self.get_or_create(listing_id)?;
        let (claimed, _) = self.claim(&cache, &[month], now, |_| true).await;
        match claimed.into_iter().next() {
            Some((month, window)) => self.run_fetch(listing_id, &cache, month, window).await,
            None => {
                debug!("{listing_id} {month}: outside booking horizon, not fetched");
                Ok(())
            }
        }
    }

    /// Mark the months that `wanted` accepts as in flight, in one critical
    /// section so concurrent callers never fetch the same month twice.
    async fn claim(
        &self,
        cache: &SharedMonthlySlots,
        months: &[MonthId],
        now: DateTime<Utc>,
        wanted: impl Fn(&MonthlySlotEntry) -> bool,
    ) -> (Vec<(MonthId, FetchedRange)>, Vec<MonthId>) {
        let tz = self.config.time_zone;
        let days = self.config.day_count_available_for_booking;
        let mut claimed = Vec::new();
        let mut skipped = Vec::new();

        let mut guard = cache.write().await;
        for &month in months {
            let Some(window) = fetch_window(month, now, tz, days) else {
                skipped.push(month);
                continue;
            };
            let entry = guard.entry(month).or_default();
            if claimed.iter().any(|(m, _)| *m == month) || !wanted(entry) {
                skipped.push(month);
                continue;
            }
            entry.fetch_in_progress = true;
            claimed.push((month, window));
        }
        drop(guard);

        if !skipped.is_empty() {
            metrics::counter!(SLOT_FETCHES_SKIPPED_TOTAL).increment(skipped.len() as u64);
        }
        (claimed, skipped)
    }

    async fn run_claimed(
        &self,
        listing_id: Ulid,
        cache: &SharedMonthlySlots,
        claimed: Vec<(MonthId, FetchedRange)>,
        skipped: Vec<MonthId>,
    ) -> Result<FetchReport, EngineError> {
        let fetches = claimed
            .into_iter()
            .map(|(month, window)| async move {
                (month, self.run_fetch(listing_id, cache, month, window).await)
            });

        let mut report = FetchReport {
            skipped,
            ..FetchReport::default()
        };
        for (month, result) in join_all(fetches).await {
            match result {
                Ok(()) => report.fetched.push(month),
                Err(_) => report.failed.push(month),
            }
        }
        Ok(report)
    }

    /// Call the source for a claimed month and record the outcome.
    async fn run_fetch(
        &self,
        listing_id: Ulid,
        cache: &SharedMonthlySlots,
        month: MonthId,
        window: FetchedRange,
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self
            .source
            .fetch_time_slots(listing_id, window, self.config.time_zone)
            .await;
        metrics::histogram!(SLOT_FETCH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        metrics::counter!(SLOT_FETCHES_TOTAL, "status" => status_label(&result)).increment(1);

        let event = {
            let mut guard = cache.write().await;
            let entry = guard.entry(month).or_default();
            entry.fetch_in_progress = false;
            match &result {
                Ok(slots) => {
                    debug_assert!(
                        slots.windows(2).all(|w| w[0].end <= w[1].start),
                        "source returned unsorted or overlapping slots"
                    );
                    entry.time_slots = Some(slots.clone());
                    entry.fetch_error = None;
                    SlotEvent::MonthFetched {
                        month,
                        slot_count: slots.len(),
                    }
                }
                Err(e) => {
                    entry.fetch_error = Some(e.clone());
                    SlotEvent::MonthFailed {
                        month,
                        error: e.clone(),
                    }
                }
            }
        };
        self.notify.send(listing_id, &event);

        match result {
            Ok(slots) => {
                info!("fetched {} time slots for {listing_id} {month}", slots.len());
                Ok(())
            }
            Err(e) => {
                warn!("fetching time slots for {listing_id} {month} failed: {e}");
                Err(EngineError::Fetch {
                    month,
                    message: e.message,
                })
            }
        }
    }
}
