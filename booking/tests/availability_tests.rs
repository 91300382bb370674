mod common;

use chrono::NaiveDate;

use common::{at, court, range, setup, setup_with, user};
use courtbook::{BookingId, CourtStatus, EngineConfig, NewBooking};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 1).unwrap()
}

#[tokio::test]
async fn test_is_available_excluding_own_booking() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    let b = t
        .engine
        .bookings()
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await?;

    let checker = t.engine.conflicts();
    assert!(!checker.is_available(c.id, &range(10, 30, 11, 30)).await?);
    assert!(checker.is_available_excluding(c.id, &range(10, 30, 11, 30), b.id).await?);
    assert!(!checker
        .is_available_excluding(c.id, &range(10, 30, 11, 30), BookingId::new(999)?)
        .await?);

    let overlapping = checker.conflicts(c.id, &range(9, 0, 12, 0)).await?;
    assert_eq!(overlapping.len(), 1);
    assert_eq!(overlapping[0].id, b.id);
    Ok(())
}

#[tokio::test]
async fn test_day_grid_marks_taken_and_past_slots() -> anyhow::Result<()> {
    let t = setup().await?;
    let a = court(&t.engine, "Court 1").await?;
    let b = court(&t.engine, "Court 2").await?;
    t.engine
        .bookings()
        .create(NewBooking::regular(a.id, user(1), range(10, 0, 11, 30)))
        .await?;

    let grid = t.engine.conflicts().day_availability(day()).await?;
    assert_eq!(grid.len(), 2);

    let first = &grid[0];
    assert_eq!(first.court.id, a.id);
    // Opening hours 06-22, clock at 08:00: 06:00 and 07:00 are gone.
    assert_eq!(first.slots.len(), 14);
    assert_eq!(first.slots[0].range.start(), at(8, 0));
    assert_eq!(first.slots.last().map(|s| s.range.end()), Some(at(22, 0)));

    let taken: Vec<_> = first
        .slots
        .iter()
        .filter(|s| !s.available)
        .map(|s| s.range.start())
        .collect();
    assert_eq!(taken, vec![at(10, 0), at(11, 0)]);

    assert!(grid[1].court.id == b.id && grid[1].slots.iter().all(|s| s.available));
    Ok(())
}

#[tokio::test]
async fn test_day_grid_for_offline_court_and_custom_slots() -> anyhow::Result<()> {
    let config = EngineConfig {
        opening_hour: 9,
        closing_hour: 12,
        slot_minutes: 90,
        ..EngineConfig::default()
    };
    let t = setup_with(config).await?;
    let c = court(&t.engine, "Court 1").await?;
    t.engine.courts().set_status(c.id, CourtStatus::Maintenance).await?;

    let grid = t.engine.conflicts().day_availability(day()).await?;
    let slots = &grid[0].slots;
    assert_eq!(
        slots.iter().map(|s| s.range).collect::<Vec<_>>(),
        vec![range(9, 0, 10, 30), range(10, 30, 12, 0)]
    );
    assert!(slots.iter().all(|s| !s.available));
    Ok(())
}
