//! Application state and the reducer that turns inputs into effects.

use chrono::{DateTime, Utc};
use occupancy::{SeatCollection, SeatLayout};
use shared::{
    domain::{Seat, SeatLabel, Zone},
    protocol::SeatRow,
};
use storage::StoreError;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle(SeatLabel),
    Reset(SeatLabel),
    SwitchZone(Zone),
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Startup,
    Poll,
    Refresh,
}

/// Work the controller performs on behalf of the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Render,
    Persist { label: SeatLabel, seat: Seat },
    Seed(SeatCollection),
    Load(LoadPhase),
}

#[derive(Debug, Clone)]
pub struct AppState {
    layout: SeatLayout,
    seats: SeatCollection,
    now: DateTime<Utc>,
    active_zone: Zone,
}

impl AppState {
    pub fn new(layout: SeatLayout, now: DateTime<Utc>) -> Self {
        Self {
            layout,
            seats: SeatCollection::from_layout(&layout),
            now,
            active_zone: Zone::T,
        }
    }

    pub fn seats(&self) -> &SeatCollection {
        &self.seats
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn active_zone(&self) -> Zone {
        self.active_zone
    }

    pub fn handle_command(&mut self, command: Command, now: DateTime<Utc>) -> Vec<Effect> {
        match command {
            Command::Toggle(label) => {
                self.now = now;
                match self.seats.toggle(&label, now) {
                    Some(seat) => {
                        debug!(%label, occupied = seat.occupied, paused = seat.paused_time.is_some(), "seat toggled");
                        vec![Effect::Render, Effect::Persist { label, seat }]
                    }
                    None => {
                        warn!(%label, "toggle ignored for unknown seat");
                        Vec::new()
                    }
                }
            }
            Command::Reset(label) => {
                self.now = now;
                match self.seats.reset(&label) {
                    Some(seat) => {
                        debug!(%label, "seat reset");
                        vec![Effect::Render, Effect::Persist { label, seat }]
                    }
                    None => {
                        warn!(%label, "reset ignored for unknown seat");
                        Vec::new()
                    }
                }
            }
            Command::SwitchZone(zone) => {
                self.active_zone = zone;
                vec![Effect::Render]
            }
            Command::Refresh => vec![Effect::Load(LoadPhase::Refresh)],
        }
    }

    /// Display-only: moves the clock used for elapsed and overtime values.
    pub fn handle_clock_tick(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        self.now = now;
        vec![Effect::Render]
    }

    pub fn handle_poll_tick(&self) -> Vec<Effect> {
        vec![Effect::Load(LoadPhase::Poll)]
    }

    /// Applies a `load_all` result.
    ///
    /// A non-empty snapshot replaces the whole collection, including local
    /// changes whose save has not landed yet. An empty store is seeded with
    /// the default layout.
    pub fn handle_snapshot(
        &mut self,
        phase: LoadPhase,
        result: Result<SeatCollection, StoreError>,
    ) -> Vec<Effect> {
        match result {
            Ok(seats) if seats.is_empty() => {
                info!(?phase, seats = self.layout.total(), "store is empty; seeding default layout");
                self.seats = SeatCollection::from_layout(&self.layout);
                vec![Effect::Render, Effect::Seed(self.seats.clone())]
            }
            Ok(seats) => {
                debug!(?phase, seats = seats.len(), "applied seat snapshot");
                self.seats = seats;
                vec![Effect::Render]
            }
            Err(error) if phase == LoadPhase::Startup => {
                warn!(%error, "initial seat load failed; starting from default layout");
                self.seats = SeatCollection::from_layout(&self.layout);
                vec![Effect::Render]
            }
            Err(error) => {
                warn!(?phase, %error, "seat reload failed; keeping current state");
                Vec::new()
            }
        }
    }

    /// Remote state wins unconditionally.
    pub fn handle_remote_change(&mut self, row: SeatRow) -> Vec<Effect> {
        debug!(label = %row.id, occupied = row.occupied, "remote seat change");
        self.seats.apply_remote(row.id, row.seat());
        vec![Effect::Render]
    }

    /// The change feed skipped rows; reload the whole collection.
    pub fn handle_resync(&self) -> Vec<Effect> {
        vec![Effect::Load(LoadPhase::Refresh)]
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
