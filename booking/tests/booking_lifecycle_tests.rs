mod common;

use chrono::{TimeDelta, TimeZone, Utc};
use tokio::task::JoinSet;
use tracing_test::traced_test;

use common::{at, court, range, session, setup, setup_with, training, user};
use courtbook::{
    BookingError, BookingId, BookingKind, BookingStatus, CourtId, CourtStatus, EngineConfig,
    NewBooking, TimeRange,
};

#[tokio::test]
async fn test_overlap_rejected_and_adjacent_accepted() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    let bookings = t.engine.bookings();

    let first = bookings
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await?;
    assert_eq!(first.status, BookingStatus::Pending);
    assert_eq!(first.kind, BookingKind::Regular);

    let first = bookings.set_status(first.id, BookingStatus::Confirmed).await?;
    assert_eq!(first.status, BookingStatus::Confirmed);

    let err = bookings
        .create(NewBooking::regular(c.id, user(2), range(10, 30, 11, 30)))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict { court_id, .. } if court_id == c.id));

    let err = bookings
        .create(NewBooking::regular(c.id, user(2), range(9, 0, 12, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict { .. }));

    // Half-open ranges: touching endpoints do not overlap.
    bookings
        .create(NewBooking::regular(c.id, user(2), range(11, 0, 12, 0)))
        .await?;
    bookings
        .create(NewBooking::regular(c.id, user(3), range(9, 0, 10, 0)))
        .await?;

    assert_eq!(bookings.list_for_court(c.id).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_same_slot_on_other_court_is_free() -> anyhow::Result<()> {
    let t = setup().await?;
    let a = court(&t.engine, "Court 1").await?;
    let b = court(&t.engine, "Court 2").await?;

    t.engine
        .bookings()
        .create(NewBooking::regular(a.id, user(1), range(10, 0, 11, 0)))
        .await?;
    t.engine
        .bookings()
        .create(NewBooking::regular(b.id, user(2), range(10, 0, 11, 0)))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_cancel_frees_the_slot() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    let bookings = t.engine.bookings();

    let b = bookings
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await?;
    assert!(!t.engine.conflicts().is_available(c.id, &range(10, 0, 11, 0)).await?);

    let cancelled = bookings.cancel(b.id, user(1)).await?;
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(bookings.get(b.id).await?.status, BookingStatus::Cancelled);
    assert!(t.engine.conflicts().is_available(c.id, &range(10, 0, 11, 0)).await?);

    bookings
        .create(NewBooking::regular(c.id, user(2), range(10, 0, 11, 0)))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_status_transitions() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    let bookings = t.engine.bookings();

    let b = bookings
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await?;

    let confirmed = bookings.set_status(b.id, BookingStatus::Confirmed).await?;
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    // Setting the current status again is a no-op.
    bookings.set_status(b.id, BookingStatus::Confirmed).await?;

    bookings.cancel(b.id, user(1)).await?;

    let err = bookings.cancel(b.id, user(1)).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Cancelled,
            ..
        }
    ));

    let err = bookings
        .set_status(b.id, BookingStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition { .. }));
    Ok(())
}

#[tokio::test]
async fn test_cannot_create_cancelled_booking() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;

    let new = NewBooking {
        status: BookingStatus::Cancelled,
        ..NewBooking::regular(c.id, user(1), range(10, 0, 11, 0))
    };
    let err = t.engine.bookings().create(new).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn test_training_kind_cannot_be_booked_directly() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;

    let new = NewBooking {
        kind: BookingKind::Training,
        status: BookingStatus::Confirmed,
        ..NewBooking::regular(c.id, user(1), range(10, 0, 11, 0))
    };
    let err = t.engine.bookings().create(new).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    assert!(t.engine.bookings().list_all().await?.is_empty());
    assert!(t.engine.conflicts().is_available(c.id, &range(10, 0, 11, 0)).await?);
    Ok(())
}

#[tokio::test]
async fn test_unknown_court_and_booking() -> anyhow::Result<()> {
    let t = setup().await?;

    let err = t
        .engine
        .bookings()
        .create(NewBooking::regular(CourtId::new(77)?, user(1), range(10, 0, 11, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound { entity: "court", .. }));

    let err = t
        .engine
        .bookings()
        .cancel(BookingId::new(5)?, user(1))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound { entity: "booking", .. }));
    Ok(())
}

#[tokio::test]
async fn test_maintenance_court_refuses_bookings() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    t.engine.courts().set_status(c.id, CourtStatus::Maintenance).await?;

    let err = t
        .engine
        .bookings()
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::CourtOffline { court_id } if court_id == c.id));
    assert!(!t.engine.conflicts().is_available(c.id, &range(10, 0, 11, 0)).await?);

    // `booked` is informational and does not block anything.
    t.engine.courts().set_status(c.id, CourtStatus::Booked).await?;
    t.engine
        .bookings()
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_booking_window_applies_to_regular_bookings() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    let bookings = t.engine.bookings();

    // Less than an hour of notice.
    let err = bookings
        .create(NewBooking::regular(c.id, user(1), range(8, 30, 9, 30)))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    // More than fourteen days ahead.
    let far = Utc.with_ymd_and_hms(2030, 6, 20, 10, 0, 0).unwrap();
    let err = bookings
        .create(NewBooking::regular(
            c.id,
            user(1),
            TimeRange::starting_at(far, TimeDelta::hours(1))?,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    // Exactly one hour of notice is enough.
    bookings
        .create(NewBooking::regular(c.id, user(1), range(9, 0, 10, 0)))
        .await?;

    // Coaches are not held to the window.
    session(&t.engine, c.id, range(8, 15, 8, 45), 4).await?;
    Ok(())
}

#[tokio::test]
async fn test_unvalidated_window_overflow_is_rejected() -> anyhow::Result<()> {
    let config = EngineConfig {
        max_days_ahead: u32::MAX,
        ..EngineConfig::default()
    };
    let t = setup_with(config).await?;
    let c = court(&t.engine, "Court 1").await?;

    let err = t
        .engine
        .bookings()
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn test_training_booking_cannot_be_cancelled_directly() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    let s = session(&t.engine, c.id, range(10, 0, 11, 0), 4).await?;

    let err = t
        .engine
        .bookings()
        .cancel(s.booking_id, user(900))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    let err = t
        .engine
        .bookings()
        .set_status(s.booking_id, BookingStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));

    let held = t.engine.bookings().get(s.booking_id).await?;
    assert_eq!(held.status, BookingStatus::Confirmed);
    assert_eq!(held.kind, BookingKind::Training);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_one_slot_yield_one_booking() -> anyhow::Result<()> {
    let t = setup().await?;
    let court_id = court(&t.engine, "Court 1").await?.id;

    let mut set = JoinSet::new();
    for n in 1..=8 {
        let engine = t.engine.clone();
        set.spawn(async move {
            engine
                .bookings()
                .create(NewBooking::regular(court_id, user(n), range(10, 0, 11, 0)))
                .await
        });
    }

    let mut ok = 0;
    let mut conflicts = 0;
    while let Some(res) = set.join_next().await {
        match res? {
            Ok(_) => ok += 1,
            Err(BookingError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(t.engine.bookings().list_for_court(court_id).await?.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_session_and_bookings_race_for_one_slot() -> anyhow::Result<()> {
    let t = setup().await?;
    let court_id = court(&t.engine, "Court 1").await?.id;

    let mut set = JoinSet::new();
    {
        let engine = t.engine.clone();
        set.spawn(async move {
            engine
                .sessions()
                .create_training_session(training(user(900), court_id, range(10, 0, 11, 0), 4))
                .await
                .map(|s| s.booking_id)
        });
    }
    for n in 1..=4 {
        let engine = t.engine.clone();
        set.spawn(async move {
            engine
                .bookings()
                .create(NewBooking::regular(court_id, user(n), range(10, 30, 11, 30)))
                .await
                .map(|b| b.id)
        });
    }

    let mut ok = 0;
    let mut conflicts = 0;
    while let Some(res) = set.join_next().await {
        match res? {
            Ok(_) => ok += 1,
            Err(BookingError::Conflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((ok, conflicts), (1, 4));

    // Whichever side won, the court holds exactly one live booking, and a
    // training booking always comes with its session.
    let held = t.engine.bookings().list_for_court(court_id).await?;
    assert_eq!(held.len(), 1);
    let sessions = t.engine.sessions().list_by_coach(user(900)).await?;
    match held[0].kind {
        BookingKind::Training => assert_eq!(sessions[0].booking_id, held[0].id),
        BookingKind::Regular => assert!(sessions.is_empty()),
    }
    Ok(())
}

#[tokio::test]
async fn test_listings() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;
    let bookings = t.engine.bookings();

    let early = bookings
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await?;
    let late = bookings
        .create(NewBooking::regular(c.id, user(1), range(14, 0, 15, 0)))
        .await?;
    let other = bookings
        .create(NewBooking::regular(c.id, user(2), range(12, 0, 13, 0)))
        .await?;
    let dropped = bookings
        .create(NewBooking::regular(c.id, user(1), range(16, 0, 17, 0)))
        .await?;
    bookings.cancel(dropped.id, user(1)).await?;

    let mine: Vec<_> = bookings.list_for_user(user(1)).await?.iter().map(|b| b.id).collect();
    assert_eq!(mine, vec![dropped.id, late.id, early.id]);

    let upcoming: Vec<_> = bookings
        .list_upcoming_for_user(user(1))
        .await?
        .iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(upcoming, vec![early.id, late.id]);

    // Once the first booking has ended it drops out of "upcoming".
    t.clock.set(at(11, 0));
    let upcoming = bookings.list_upcoming_for_user(user(1)).await?;
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, late.id);

    assert_eq!(bookings.list_all().await?.len(), 4);
    let recent = bookings.list_recent(2).await?;
    assert_eq!(recent.iter().map(|b| b.id).collect::<Vec<_>>(), vec![dropped.id, other.id]);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_create_and_conflict_are_logged() -> anyhow::Result<()> {
    let t = setup().await?;
    let c = court(&t.engine, "Court 1").await?;

    t.engine
        .bookings()
        .create(NewBooking::regular(c.id, user(1), range(10, 0, 11, 0)))
        .await?;
    let _ = t
        .engine
        .bookings()
        .create(NewBooking::regular(c.id, user(2), range(10, 0, 11, 0)))
        .await;

    assert!(logs_contain("booking created"));
    assert!(logs_contain("slot already taken"));
    Ok(())
}
