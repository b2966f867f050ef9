//! Seat state machine and the seat collection it operates on.

mod collection;
mod machine;

pub use collection::{OccupancyStats, SeatCollection, SeatLayout, ZoneCount};
pub use machine::{
    display_class, elapsed_seconds, format_elapsed, is_over_limit, reset, seat_state, toggle,
    DisplayClass, SeatState, OVERTIME_LIMIT_MINUTES,
};
