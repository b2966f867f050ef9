use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream::BoxStream, StreamExt};
use occupancy::SeatCollection;
use shared::{
    domain::{Seat, SeatLabel},
    protocol::SeatRow,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

mod local;

pub use local::LocalFileStore;

const CHANGE_FEED_CAPACITY: usize = 256;

/// One item of a store's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatChange {
    Row(SeatRow),
    /// Changes were dropped before delivery; only a full reload is accurate.
    Resync,
}

/// Changes in the backing store, in arrival order.
pub type SeatChangeStream = BoxStream<'static, SeatChange>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{backend} seat store read failed: {message}")]
    ReadFailure {
        backend: &'static str,
        message: String,
    },
    #[error("{backend} seat store write failed for {target}: {message}")]
    WriteFailure {
        backend: &'static str,
        target: String,
        message: String,
    },
    #[error("{backend} change feed unavailable: {message}")]
    Subscribe {
        backend: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn read(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ReadFailure {
            backend,
            message: format!("{err:#}"),
        }
    }

    pub fn write(
        backend: &'static str,
        target: impl std::fmt::Display,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::WriteFailure {
            backend,
            target: target.to_string(),
            message: format!("{err:#}"),
        }
    }

    pub fn subscribe(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Subscribe {
            backend,
            message: format!("{err:#}"),
        }
    }
}

/// Persistence seam for the seat collection.
///
/// Saves are best effort from the caller's point of view: a failed save is
/// reported here and logged by the caller, never rolled back in memory.
#[async_trait]
pub trait SeatStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn load_all(&self) -> Result<SeatCollection, StoreError>;

    async fn save_one(&self, label: &SeatLabel, seat: &Seat) -> Result<(), StoreError>;

    async fn save_all(&self, seats: &SeatCollection) -> Result<(), StoreError>;

    /// `Ok(None)` marks a poll-only backend.
    async fn subscribe_changes(&self) -> Result<Option<SeatChangeStream>, StoreError> {
        Ok(None)
    }
}

/// SQLite-backed `seats` table with an in-process change feed.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    changes: broadcast::Sender<SeatRow>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to `sqlite::memory:` opens its own empty database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self { pool, changes })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatRow> {
        self.changes.subscribe()
    }

    pub async fn list_seats(&self) -> Result<Vec<SeatRow>> {
        let rows = sqlx::query(
            "SELECT id, occupied, start_time, paused_time, updated_at FROM seats ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list seats")?;

        let mut seats = Vec::with_capacity(rows.len());
        for row in &rows {
            match seat_row_from_sql(row) {
                Ok(seat) => seats.push(seat),
                Err(error) => warn!(%error, "skipping unreadable seat row"),
            }
        }
        Ok(seats)
    }

    pub async fn load_seat(&self, label: &SeatLabel) -> Result<Option<SeatRow>> {
        let row = sqlx::query(
            "SELECT id, occupied, start_time, paused_time, updated_at FROM seats WHERE id = ?",
        )
        .bind(label.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(seat_row_from_sql).transpose()
    }

    /// Updates an existing row only; `None` when no row has this label.
    pub async fn update_seat(&self, label: &SeatLabel, seat: &Seat) -> Result<Option<SeatRow>> {
        let row = sqlx::query(
            "UPDATE seats
             SET occupied = ?1, start_time = ?2, paused_time = ?3, updated_at = ?4
             WHERE id = ?5
             RETURNING id, occupied, start_time, paused_time, updated_at",
        )
        .bind(seat.occupied)
        .bind(seat.start_time.map(|t| t.timestamp_millis()))
        .bind(seat.paused_time.map(|t| t.timestamp_millis()))
        .bind(Utc::now())
        .bind(label.to_string())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update seat {label}"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let updated = seat_row_from_sql(&row)?;
        let _ = self.changes.send(updated.clone());
        Ok(Some(updated))
    }

    pub async fn upsert_seats(&self, rows: &[SeatRow]) -> Result<Vec<SeatRow>> {
        let updated_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO seats (id, occupied, start_time, paused_time, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    occupied = excluded.occupied,
                    start_time = excluded.start_time,
                    paused_time = excluded.paused_time,
                    updated_at = excluded.updated_at",
            )
            .bind(row.id.to_string())
            .bind(row.occupied)
            .bind(row.start_time.map(|t| t.timestamp_millis()))
            .bind(row.paused_time.map(|t| t.timestamp_millis()))
            .bind(updated_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to upsert seat {}", row.id))?;
        }
        tx.commit().await.context("failed to commit seat upsert")?;

        let written: Vec<SeatRow> = rows
            .iter()
            .map(|row| SeatRow {
                updated_at: Some(updated_at),
                ..row.clone()
            })
            .collect();
        for row in &written {
            let _ = self.changes.send(row.clone());
        }
        Ok(written)
    }

    pub async fn seat_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl SeatStore for Storage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn load_all(&self) -> Result<SeatCollection, StoreError> {
        let rows = self
            .list_seats()
            .await
            .map_err(|err| StoreError::read(self.backend_name(), err))?;
        Ok(rows.into_iter().map(|row| (row.id, row.seat())).collect())
    }

    async fn save_one(&self, label: &SeatLabel, seat: &Seat) -> Result<(), StoreError> {
        match self.update_seat(label, seat).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(StoreError::write(
                self.backend_name(),
                label,
                "no such seat row",
            )),
            Err(err) => Err(StoreError::write(self.backend_name(), label, err)),
        }
    }

    async fn save_all(&self, seats: &SeatCollection) -> Result<(), StoreError> {
        let rows: Vec<SeatRow> = seats
            .iter()
            .map(|(label, seat)| SeatRow::new(*label, *seat, None))
            .collect();
        self.upsert_seats(&rows)
            .await
            .map(|_| ())
            .map_err(|err| StoreError::write(self.backend_name(), "all seats", err))
    }

    async fn subscribe_changes(&self) -> Result<Option<SeatChangeStream>, StoreError> {
        let stream = BroadcastStream::new(self.subscribe()).map(|item| match item {
            Ok(row) => SeatChange::Row(row),
            Err(error) => {
                warn!(%error, "seat change feed lagged; asking for a resync");
                SeatChange::Resync
            }
        });
        Ok(Some(stream.boxed()))
    }
}

fn seat_row_from_sql(row: &SqliteRow) -> Result<SeatRow> {
    let raw_id: String = row.try_get("id")?;
    let id = SeatLabel::from_str(&raw_id).with_context(|| format!("bad seat id '{raw_id}'"))?;
    Ok(SeatRow {
        id,
        occupied: row.try_get("occupied")?,
        start_time: millis_to_datetime(row.try_get("start_time")?)?,
        paused_time: millis_to_datetime(row.try_get("paused_time")?)?,
        updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
    })
}

fn millis_to_datetime(millis: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    millis
        .map(|ms| {
            DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp {ms} out of range"))
        })
        .transpose()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
