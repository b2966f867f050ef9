//! Render model handed to the presentation layer.

use anyhow::Result;
use chrono::{DateTime, Utc};
use occupancy::{display_class, elapsed_seconds, format_elapsed, DisplayClass};
use shared::domain::{SeatLabel, Zone};

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatTile {
    pub label: SeatLabel,
    pub class: DisplayClass,
    /// Elapsed active time, present while the seat is occupied.
    pub elapsed: Option<String>,
    /// Occupied seats offer a reset affordance.
    pub resettable: bool,
}

impl SeatTile {
    pub fn status_text(&self) -> String {
        match self.class.icon() {
            Some(icon) => format!("{icon} {}", self.class.label()),
            None => self.class.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTab {
    pub zone: Zone,
    pub occupied: usize,
    pub total: usize,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatView {
    pub now: DateTime<Utc>,
    pub active_zone: Zone,
    pub tabs: Vec<ZoneTab>,
    pub tiles: Vec<SeatTile>,
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
}

impl SeatView {
    pub fn build(state: &AppState) -> Self {
        let now = state.now();
        let active_zone = state.active_zone();
        let stats = state.seats().stats();

        let tabs = Zone::ALL
            .into_iter()
            .map(|zone| {
                let count = stats.zone(zone);
                ZoneTab {
                    zone,
                    occupied: count.occupied,
                    total: count.total,
                    active: zone == active_zone,
                }
            })
            .collect();

        let tiles = state
            .seats()
            .zone_seats(active_zone)
            .map(|(label, seat)| SeatTile {
                label: *label,
                class: display_class(seat, now),
                elapsed: seat
                    .occupied
                    .then(|| format_elapsed(elapsed_seconds(seat, now))),
                resettable: seat.occupied,
            })
            .collect();

        Self {
            now,
            active_zone,
            tabs,
            tiles,
            total: stats.total,
            occupied: stats.occupied,
            available: stats.available,
        }
    }
}

/// Presentation collaborator fed with every new view.
pub trait SeatRenderer: Send {
    fn render(&mut self, view: &SeatView) -> Result<()>;
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
