use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use ulid::Ulid;

use bookable::calendar::{local_date, slot_end_day};
use bookable::config::CalendarConfig;
use bookable::model::Selection;
use bookable::source::JsonFileSource;
use bookable::store::SlotStore;

const USAGE: &str = "usage: bookable <slots.json> [start-date YYYY-MM-DD]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .or_else(|| std::env::var("BOOKABLE_SLOTS_FILE").ok())
        .ok_or(USAGE)?;
    let start_date: Option<NaiveDate> = args.next().map(|s| s.parse()).transpose()?;

    let config = CalendarConfig::from_env()?;
    let source = Arc::new(JsonFileSource::load(Path::new(&path))?);
    info!("loaded {} time slots from {path}", source.slots().len());
    info!("  time_zone: {}", config.time_zone);
    info!("  day_count_available_for_booking: {}", config.day_count_available_for_booking);
    info!("  unit_type: {:?}", config.unit_type);

    let store = SlotStore::new(source, config);
    let listing_id = Ulid::new();
    let now = Utc::now();

    let report = store.fetch_monthly_time_slots(listing_id, now).await?;
    if !report.failed.is_empty() {
        warn!("{} months failed, retrying once", report.failed.len());
        store.retry_failed(listing_id, now).await?;
    }

    let calendar = store.calendar(listing_id).await;
    let Some(range) = calendar.fetched_range else {
        warn!("no month could be fetched, nothing to show");
        return Ok(());
    };
    info!("fetched range: {} .. {}", range.start, range.end);

    let selection = Selection::new(start_date, None);
    let oracle = calendar.day_blocked_oracle(config.unit_type, selection);
    let today = local_date(now, config.time_zone);

    println!("{:<12} {:<9} {:<8} seats", "date", "blocked", "outside");
    for (day, entry) in oracle.index().iter() {
        if *day < today {
            continue;
        }
        let seats = entry.time_slots.iter().map(|s| s.seats).max().unwrap_or(0);
        println!(
            "{:<12} {:<9} {:<8} {seats}",
            day.to_string(),
            oracle.is_day_blocked(*day),
            calendar.is_outside_range(*day, &config, selection, now),
        );
    }

    if let Some(start) = start_date {
        match calendar.block_on_day(start) {
            Some(block) => println!(
                "\n{start}: bookable through {} ({} seats at start)",
                slot_end_day(block.end, config.time_zone),
                block.seats
            ),
            None => println!("\n{start}: no availability"),
        }
    }

    Ok(())
}
