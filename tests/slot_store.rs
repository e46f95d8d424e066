use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Semaphore;
use tokio_test::assert_ok;
use ulid::Ulid;

use bookable::config::CalendarConfig;
use bookable::model::*;
use bookable::source::{JsonFileSource, TimeSlotSource};
use bookable::store::SlotStore;

// ── Test infrastructure ──────────────────────────────────────

/// Serves fixed slots, failing chosen months once and optionally waiting on
/// a gate before answering.
struct ScriptedSource {
    inner: JsonFileSource,
    calls: AtomicUsize,
    fail_once: Mutex<HashSet<MonthId>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    fn new(slots: Vec<TimeSlot>) -> Self {
        Self {
            inner: JsonFileSource::from_slots(slots),
            calls: AtomicUsize::new(0),
            fail_once: Mutex::new(HashSet::new()),
            gate: None,
        }
    }

    fn failing_once(self, month: MonthId) -> Self {
        self.fail_once.lock().unwrap().insert(month);
        self
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimeSlotSource for ScriptedSource {
    async fn fetch_time_slots(
        &self,
        listing_id: Ulid,
        window: FetchedRange,
        time_zone: Tz,
    ) -> Result<Vec<TimeSlot>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let month = MonthId::of(window.start, time_zone);
        if self.fail_once.lock().unwrap().remove(&month) {
            return Err(FetchError::new(format!("503 for {month}")));
        }
        self.inner.fetch_time_slots(listing_id, window, time_zone).await
    }
}

fn at(m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn month(s: &str) -> MonthId {
    s.parse().unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 20, 9, 0, 0).unwrap()
}

// ── Fetch and query ──────────────────────────────────────────

#[tokio::test]
async fn fetch_then_query_picker() {
    let source = Arc::new(ScriptedSource::new(vec![
        TimeSlot::new(at(7, 22), at(7, 26), 3),
        TimeSlot::new(at(7, 26), at(8, 3), 1),
        TimeSlot::new(at(8, 10), at(8, 12), 5),
    ]));
    let store = SlotStore::new(source.clone(), CalendarConfig::default());
    let lid = Ulid::new();

    let report = assert_ok!(store.fetch_monthly_time_slots(lid, now()).await);
    assert_eq!(report.fetched.len(), 2);
    assert_eq!(source.calls(), 2);

    let cal = store.calendar(lid).await;
    assert_eq!(cal.time_slots.len(), 3);
    assert_eq!(cal.time_slots[1], TimeSlot::new(at(7, 26), at(8, 3), 1));

    let oracle = cal.day_blocked_oracle(UnitType::Nightly, Selection::new(Some(date(7, 23)), None));
    assert!(!oracle.is_day_blocked(date(8, 3)));
    assert!(oracle.is_day_blocked(date(8, 4)));
    assert!(oracle.is_day_blocked(date(8, 10)));

    let blocked = cal.is_blocked_between();
    assert!(blocked(date(7, 23), date(7, 28)));
    assert!(!blocked(date(7, 23), date(7, 26)));

    let stay = Selection::new(Some(date(7, 23)), Some(date(7, 25)));
    assert_eq!(cal.seat_options(stay), vec![1, 2, 3]);
}

#[tokio::test]
async fn failed_month_is_excluded_then_retried() {
    let source = Arc::new(
        ScriptedSource::new(vec![TimeSlot::new(at(8, 5), at(8, 9), 2)])
            .failing_once(month("2024-08")),
    );
    let store = SlotStore::new(source.clone(), CalendarConfig::default());
    let lid = Ulid::new();
    let mut events = store.notify.subscribe(lid);

    let report = assert_ok!(store.fetch_monthly_time_slots(lid, now()).await);
    assert_eq!(report.fetched, vec![month("2024-07")]);
    assert_eq!(report.failed, vec![month("2024-08")]);

    let snap = store.snapshot(lid).await;
    let aug = &snap[&month("2024-08")];
    assert!(aug.fetch_error.is_some());
    assert!(!aug.fetch_in_progress);

    let cal = store.calendar(lid).await;
    assert_eq!(cal.fetched_range.unwrap().end, at(8, 1));
    assert!(cal.time_slots.is_empty());

    let mut seen = Vec::new();
    for _ in 0..2 {
        seen.push(events.recv().await.unwrap());
    }
    assert!(seen.iter().any(|e| matches!(e, SlotEvent::MonthFailed { month: m, .. } if *m == month("2024-08"))));

    let retry = assert_ok!(store.retry_failed(lid, now()).await);
    assert_eq!(retry.fetched, vec![month("2024-08")]);
    assert_eq!(source.calls(), 3);

    let cal = store.calendar(lid).await;
    assert_eq!(cal.fetched_range.unwrap().end, at(9, 1));
    assert_eq!(cal.time_slots, vec![TimeSlot::new(at(8, 5), at(8, 9), 2)]);

    // Nothing left to retry.
    let again = assert_ok!(store.retry_failed(lid, now()).await);
    assert_eq!(again, Default::default());
}

#[tokio::test]
async fn in_flight_months_are_not_fetched_twice() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(ScriptedSource::new(vec![]).gated(gate.clone()));
    let store = Arc::new(SlotStore::new(source.clone(), CalendarConfig::default()));
    let lid = Ulid::new();

    let first = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_monthly_time_slots(lid, now()).await })
    };

    // Wait until both months are claimed and parked on the gate.
    for _ in 0..200 {
        if source.calls() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(source.calls(), 2);
    assert!(store.snapshot(lid).await.values().all(|e| e.fetch_in_progress));

    let second = assert_ok!(store.fetch_monthly_time_slots(lid, now()).await);
    assert!(second.fetched.is_empty());
    assert_eq!(second.skipped.len(), 2);

    gate.add_permits(2);
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.fetched.len(), 2);
    assert_eq!(source.calls(), 2);
    assert!(store.snapshot(lid).await.values().all(|e| e.is_fetched()));
}

#[tokio::test]
async fn forced_refetch_replaces_month() {
    let source = Arc::new(ScriptedSource::new(vec![TimeSlot::new(at(7, 22), at(7, 24), 1)]));
    let store = SlotStore::new(source.clone(), CalendarConfig::default());
    let lid = Ulid::new();

    assert_ok!(store.fetch_month(lid, month("2024-07"), now()).await);
    assert_ok!(store.fetch_month(lid, month("2024-07"), now()).await);
    assert_eq!(source.calls(), 2);
    assert_eq!(store.calendar(lid).await.time_slots.len(), 1);
}

#[tokio::test]
async fn fetch_error_surfaces_from_single_month() {
    let source = Arc::new(ScriptedSource::new(vec![]).failing_once(month("2024-07")));
    let store = SlotStore::new(source, CalendarConfig::default());
    let err = store
        .fetch_month(Ulid::new(), month("2024-07"), now())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("2024-07"));
}

#[tokio::test]
async fn visible_month_navigation_extends_range() {
    let source = Arc::new(ScriptedSource::new(vec![]));
    let store = SlotStore::new(source, CalendarConfig::default());
    let lid = Ulid::new();

    assert_ok!(store.fetch_monthly_time_slots(lid, now()).await);
    let before = store.calendar(lid).await.fetched_range.unwrap();

    assert_ok!(store.fetch_for_visible_month(lid, month("2024-09"), now()).await);
    let after = store.calendar(lid).await.fetched_range.unwrap();
    assert_eq!(after.start, before.start);
    // October is cut by the 90-day horizon but still fetched in part.
    assert_eq!(after.end, at(11, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn listing_cap_holds_under_concurrent_first_fetches() {
    let store = Arc::new(
        SlotStore::new(Arc::new(ScriptedSource::new(vec![])), CalendarConfig::default())
            .with_max_listings(4),
    );
    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.fetch_monthly_time_slots(Ulid::new(), now()).await })
        })
        .collect();

    let mut admitted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert!(e.to_string().contains("too many listings")),
        }
    }
    assert_eq!(admitted, 4);
    assert_eq!(store.listing_count(), 4);
}

#[test]
fn store_usable_from_sync_code() {
    let store = SlotStore::new(
        Arc::new(ScriptedSource::new(vec![TimeSlot::new(at(7, 22), at(7, 24), 1)])),
        CalendarConfig::default(),
    );
    let lid = Ulid::new();
    let cal = tokio_test::block_on(async {
        store.fetch_monthly_time_slots(lid, now()).await.unwrap();
        store.calendar(lid).await
    });
    assert!(cal.covers_day(date(7, 23)));
}
