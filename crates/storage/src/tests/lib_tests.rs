use super::*;
use chrono::TimeZone;
use occupancy::SeatLayout;

fn label(raw: &str) -> SeatLabel {
    raw.parse().expect("label")
}

fn occupied_at(ms: i64) -> Seat {
    Seat {
        occupied: true,
        start_time: Some(Utc.timestamp_millis_opt(ms).unwrap()),
        paused_time: None,
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("seats.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn empty_table_loads_as_empty_collection() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let seats = storage.load_all().await.expect("load");
    assert!(seats.is_empty());
    assert_eq!(storage.seat_count().await.expect("count"), 0);
}

#[tokio::test]
async fn save_all_seeds_default_layout() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let layout = SeatCollection::from_layout(&SeatLayout::default());
    storage.save_all(&layout).await.expect("seed");

    let loaded = storage.load_all().await.expect("load");
    assert_eq!(loaded, layout);
    assert_eq!(storage.seat_count().await.expect("count"), 67);
}

#[tokio::test]
async fn save_one_round_trips_millisecond_timestamps() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_all(&SeatCollection::from_layout(&SeatLayout::default()))
        .await
        .expect("seed");

    let mut seat = occupied_at(1_700_000_000_123);
    seat.paused_time = Some(Utc.timestamp_millis_opt(1_700_000_300_456).unwrap());
    storage.save_one(&label("C7"), &seat).await.expect("save");

    let row = storage
        .load_seat(&label("C7"))
        .await
        .expect("load seat")
        .expect("row exists");
    assert_eq!(row.seat(), seat);
    assert!(row.updated_at.is_some());
}

#[tokio::test]
async fn save_one_rejects_unknown_seat() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let err = storage
        .save_one(&label("T1"), &occupied_at(0))
        .await
        .expect_err("no rows yet");
    assert!(matches!(err, StoreError::WriteFailure { .. }));
}

#[tokio::test]
async fn list_seats_orders_by_id() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_all(&SeatCollection::from_layout(&SeatLayout { t: 2, c: 1, b: 1 }))
        .await
        .expect("seed");
    let ids: Vec<String> = storage
        .list_seats()
        .await
        .expect("list")
        .into_iter()
        .map(|row| row.id.to_string())
        .collect();
    assert_eq!(ids, ["B1", "C1", "T1", "T2"]);
}

#[tokio::test]
async fn change_feed_emits_updated_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_all(&SeatCollection::from_layout(&SeatLayout::default()))
        .await
        .expect("seed");

    let mut changes = storage
        .subscribe_changes()
        .await
        .expect("subscribe")
        .expect("sqlite store has a change feed");

    let seat = occupied_at(1_700_000_000_000);
    storage.save_one(&label("B3"), &seat).await.expect("save");

    let SeatChange::Row(row) = changes.next().await.expect("change") else {
        panic!("expected a row change");
    };
    assert_eq!(row.id, label("B3"));
    assert_eq!(row.seat(), seat);
}

#[tokio::test]
async fn lagging_change_feed_asks_for_resync() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let layout = SeatLayout {
        t: CHANGE_FEED_CAPACITY as u32 + 10,
        c: 0,
        b: 0,
    };
    let mut changes = storage
        .subscribe_changes()
        .await
        .expect("subscribe")
        .expect("sqlite store has a change feed");

    // nothing reads the feed while the whole batch is broadcast
    storage
        .save_all(&SeatCollection::from_layout(&layout))
        .await
        .expect("seed");

    assert_eq!(changes.next().await, Some(SeatChange::Resync));
    let SeatChange::Row(row) = changes.next().await.expect("change") else {
        panic!("feed keeps delivering rows after a resync");
    };
    assert_eq!(row.id.zone(), shared::domain::Zone::T);
}
