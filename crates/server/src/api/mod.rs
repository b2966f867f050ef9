use std::str::FromStr;

use anyhow::Error;
use shared::{
    domain::{Seat, SeatLabel},
    error::ApiError,
    protocol::{SeatRow, SeatUpdateRequest},
};
use storage::Storage;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_seats(ctx: &ApiContext) -> Result<Vec<SeatRow>, ApiError> {
    ctx.storage.list_seats().await.map_err(internal)
}

pub async fn update_seat(
    ctx: &ApiContext,
    raw_label: &str,
    req: SeatUpdateRequest,
) -> Result<SeatRow, ApiError> {
    let label = parse_label(raw_label)?;
    let seat = Seat::from(req);
    ensure_consistent(&label, &seat)?;

    let row = ctx
        .storage
        .update_seat(&label, &seat)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("seat {label} not found")))?;
    debug!(%label, occupied = row.occupied, "seat updated");
    Ok(row)
}

/// Upserts every row in one transaction. Nothing is written when any row
/// is invalid.
pub async fn replace_seats(ctx: &ApiContext, rows: Vec<SeatRow>) -> Result<Vec<SeatRow>, ApiError> {
    for row in &rows {
        ensure_consistent(&row.id, &row.seat())?;
    }
    let written = ctx.storage.upsert_seats(&rows).await.map_err(internal)?;
    info!(seats = written.len(), "seat rows replaced");
    Ok(written)
}

fn parse_label(raw: &str) -> Result<SeatLabel, ApiError> {
    SeatLabel::from_str(raw)
        .map_err(|err| ApiError::validation(format!("invalid seat label '{raw}': {err}")))
}

fn ensure_consistent(label: &SeatLabel, seat: &Seat) -> Result<(), ApiError> {
    if seat.is_consistent() {
        return Ok(());
    }
    Err(ApiError::validation(format!(
        "seat {label}: an occupied or paused seat needs start_time and only occupied seats may pause"
    )))
}

fn internal(err: Error) -> ApiError {
    ApiError::internal(format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
