use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::TimeZone;
use futures::StreamExt;
use shared::{
    error::ApiError,
    protocol::{SeatRow, SeatUpdateRequest},
};
use storage::SeatChange;
use tokio::{net::TcpListener, time::timeout};

use super::*;

async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

fn label(raw: &str) -> SeatLabel {
    raw.parse().expect("label")
}

fn occupied_since(secs: i64) -> Seat {
    Seat {
        occupied: true,
        start_time: Some(Utc.timestamp_opt(secs, 0).unwrap()),
        paused_time: None,
    }
}

async fn seat_list(State(storage): State<Storage>) -> Response {
    match storage.list_seats().await {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(err.to_string())),
        )
            .into_response(),
    }
}

async fn seat_patch(
    State(storage): State<Storage>,
    Path(raw): Path<String>,
    Json(req): Json<SeatUpdateRequest>,
) -> Response {
    let Ok(label) = raw.parse::<SeatLabel>() else {
        return (StatusCode::BAD_REQUEST, Json(ApiError::validation("bad label"))).into_response();
    };
    match storage.update_seat(&label, &Seat::from(req)).await {
        Ok(Some(row)) => Json(row).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!("seat {label} not found"))),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(err.to_string())),
        )
            .into_response(),
    }
}

async fn seat_replace(State(storage): State<Storage>, Json(rows): Json<Vec<SeatRow>>) -> Response {
    match storage.upsert_seats(&rows).await {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(err.to_string())),
        )
            .into_response(),
    }
}

/// Seat routes over `storage`, standing in for the seat server.
async fn spawn_seat_server(storage: Storage) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/seats", get(seat_list).put(seat_replace))
        .route("/seats/:label", patch(seat_patch))
        .with_state(storage);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn seed_refuses_to_overwrite_without_force() {
    let storage = memory_storage().await;
    assert_eq!(seed(&storage, false).await.expect("seed"), "seeded 67 seats");

    storage
        .update_seat(&label("T1"), &occupied_since(1_700_000_000))
        .await
        .expect("update");

    let skipped = seed(&storage, false).await.expect("seed again");
    assert!(skipped.contains("--force"), "{skipped}");
    let kept = storage.load_seat(&label("T1")).await.expect("load").expect("row");
    assert!(kept.occupied);

    seed(&storage, true).await.expect("forced seed");
    let cleared = storage.load_seat(&label("T1")).await.expect("load").expect("row");
    assert!(!cleared.occupied);
}

#[tokio::test]
async fn list_shows_status_and_elapsed_in_label_order() {
    let storage = memory_storage().await;
    seed(&storage, false).await.expect("seed");
    storage
        .update_seat(&label("C2"), &occupied_since(1_700_000_000))
        .await
        .expect("update");

    let now = Utc.timestamp_opt(1_700_000_065, 0).unwrap();
    let output = list(&storage, now).await.expect("list");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 67);
    assert_eq!(lines[1], "T2   empty");
    assert_eq!(lines[9], "T10  empty");
    assert!(lines.iter().any(|line| line.starts_with("C2") && line.ends_with("1:05")));
}

#[tokio::test]
async fn reset_unknown_seat_fails() {
    let storage = memory_storage().await;
    seed(&storage, false).await.expect("seed");
    assert!(reset(&storage, label("T29")).await.is_err());
    assert_eq!(reset(&storage, label("T28")).await.expect("reset"), "reset T28");
}

#[tokio::test]
async fn reset_all_clears_every_row() {
    let storage = memory_storage().await;
    seed(&storage, false).await.expect("seed");
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    for raw in ["T1", "C1", "B1"] {
        storage
            .update_seat(
                &label(raw),
                &Seat {
                    occupied: true,
                    start_time: Some(start),
                    paused_time: Some(start),
                },
            )
            .await
            .expect("update");
    }

    assert_eq!(reset_all(&storage).await.expect("reset all"), "reset 67 seats");
    let rows = storage.list_seats().await.expect("list");
    assert!(rows.iter().all(|row| row.seat() == Seat::available()));
}

#[tokio::test]
async fn resets_through_the_server_reach_its_change_feed() {
    let storage = memory_storage().await;
    seed(&storage, false).await.expect("seed");
    storage
        .update_seat(&label("B4"), &occupied_since(1_700_000_000))
        .await
        .expect("update");
    let mut feed = storage
        .subscribe_changes()
        .await
        .expect("subscribe")
        .expect("sqlite feed");

    let server_url = spawn_seat_server(storage.clone()).await;
    let remote = RemoteSeatStore::new(&server_url).expect("remote store");
    assert_eq!(reset(&remote, label("B4")).await.expect("reset"), "reset B4");

    let change = timeout(Duration::from_secs(3), feed.next())
        .await
        .expect("change in time")
        .expect("feed open");
    let SeatChange::Row(row) = change else {
        panic!("expected a row, got {change:?}");
    };
    assert_eq!(row.id, label("B4"));
    assert_eq!(row.seat(), Seat::available());

    assert!(reset(&remote, label("B21")).await.is_err());
}

#[tokio::test]
async fn reset_all_through_the_server_is_broadcast() {
    let storage = memory_storage().await;
    seed(&storage, false).await.expect("seed");
    let mut feed = storage
        .subscribe_changes()
        .await
        .expect("subscribe")
        .expect("sqlite feed");

    let server_url = spawn_seat_server(storage.clone()).await;
    let remote = RemoteSeatStore::new(&server_url).expect("remote store");
    assert_eq!(reset_all(&remote).await.expect("reset all"), "reset 67 seats");

    let first = timeout(Duration::from_secs(3), feed.next())
        .await
        .expect("change in time")
        .expect("feed open");
    assert!(matches!(first, SeatChange::Row(_)), "{first:?}");
}
