use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Seat, SeatLabel},
    error::ApiError,
};

/// One row of the remote `seats` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRow {
    pub id: SeatLabel,
    pub occupied: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub paused_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SeatRow {
    pub fn new(id: SeatLabel, seat: Seat, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id,
            occupied: seat.occupied,
            start_time: seat.start_time,
            paused_time: seat.paused_time,
            updated_at,
        }
    }

    pub fn seat(&self) -> Seat {
        Seat {
            occupied: self.occupied,
            start_time: self.start_time,
            paused_time: self.paused_time,
        }
    }
}

/// Body of `PATCH /seats/:label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatUpdateRequest {
    pub occupied: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub paused_time: Option<DateTime<Utc>>,
}

impl From<Seat> for SeatUpdateRequest {
    fn from(seat: Seat) -> Self {
        Self {
            occupied: seat.occupied,
            start_time: seat.start_time,
            paused_time: seat.paused_time,
        }
    }
}

impl From<SeatUpdateRequest> for Seat {
    fn from(req: SeatUpdateRequest) -> Self {
        Self {
            occupied: req.occupied,
            start_time: req.start_time,
            paused_time: req.paused_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    SeatChanged { row: SeatRow },
    /// The server dropped `skipped` changes for this client.
    Resync { skipped: u64 },
    Error(ApiError),
}
