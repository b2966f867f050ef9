use chrono::{DateTime, Utc};
use shared::domain::Seat;

pub const OVERTIME_LIMIT_MINUTES: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatState {
    Available,
    Occupied,
    Paused,
}

/// What a seat looks like on screen. `Overtime` is only ever derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayClass {
    Available,
    Occupied,
    Paused,
    Overtime,
}

impl DisplayClass {
    pub fn css_class(self) -> &'static str {
        match self {
            DisplayClass::Available => "available",
            DisplayClass::Occupied => "occupied",
            DisplayClass::Paused => "paused",
            DisplayClass::Overtime => "overtime",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DisplayClass::Available => "empty",
            DisplayClass::Occupied => "occupied",
            DisplayClass::Paused => "paused",
            DisplayClass::Overtime => "over 90 min",
        }
    }

    pub fn icon(self) -> Option<&'static str> {
        match self {
            DisplayClass::Available => Some("✓"),
            DisplayClass::Occupied => None,
            DisplayClass::Paused => Some("⏸"),
            DisplayClass::Overtime => Some("⚠"),
        }
    }
}

pub fn seat_state(seat: &Seat) -> SeatState {
    if !seat.occupied {
        SeatState::Available
    } else if seat.paused_time.is_some() {
        SeatState::Paused
    } else {
        SeatState::Occupied
    }
}

/// Advances a seat one step: available -> occupied -> paused -> occupied.
///
/// Resuming shifts `start_time` forward by the length of the pause so the
/// elapsed active time continues from where it stopped.
pub fn toggle(seat: &Seat, now: DateTime<Utc>) -> Seat {
    match seat_state(seat) {
        SeatState::Available => Seat {
            occupied: true,
            start_time: Some(now),
            paused_time: None,
        },
        SeatState::Occupied => Seat {
            paused_time: Some(now),
            ..*seat
        },
        SeatState::Paused => {
            let start_time = match (seat.start_time, seat.paused_time) {
                (Some(start), Some(paused)) => start + (now - paused),
                _ => now,
            };
            Seat {
                occupied: true,
                start_time: Some(start_time),
                paused_time: None,
            }
        }
    }
}

pub fn reset(_seat: &Seat) -> Seat {
    Seat::available()
}

/// Active occupied time in whole seconds, never negative.
pub fn elapsed_seconds(seat: &Seat, now: DateTime<Utc>) -> i64 {
    if !seat.occupied {
        return 0;
    }
    let Some(start) = seat.start_time else {
        return 0;
    };
    let end = seat.paused_time.unwrap_or(now);
    (end - start).num_milliseconds().div_euclid(1000).max(0)
}

pub fn is_over_limit(seat: &Seat, now: DateTime<Utc>) -> bool {
    seat.occupied && elapsed_seconds(seat, now) / 60 >= OVERTIME_LIMIT_MINUTES
}

pub fn display_class(seat: &Seat, now: DateTime<Utc>) -> DisplayClass {
    match seat_state(seat) {
        SeatState::Available => DisplayClass::Available,
        SeatState::Paused => DisplayClass::Paused,
        SeatState::Occupied if is_over_limit(seat, now) => DisplayClass::Overtime,
        SeatState::Occupied => DisplayClass::Occupied,
    }
}

/// `H:MM:SS` from one hour upwards, `M:SS` below.
pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
