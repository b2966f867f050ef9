use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::{Seat, SeatLabel, Zone};

use crate::machine;

/// Per-zone capacities. Seats are labelled `<zone>1..=<capacity>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatLayout {
    pub t: u32,
    pub c: u32,
    pub b: u32,
}

impl Default for SeatLayout {
    fn default() -> Self {
        Self {
            t: 28,
            c: 19,
            b: 20,
        }
    }
}

impl SeatLayout {
    pub fn capacity(&self, zone: Zone) -> u32 {
        match zone {
            Zone::T => self.t,
            Zone::C => self.c,
            Zone::B => self.b,
        }
    }

    pub fn total(&self) -> u32 {
        Zone::ALL.iter().map(|zone| self.capacity(*zone)).sum()
    }

    pub fn labels(&self) -> impl Iterator<Item = SeatLabel> + '_ {
        Zone::ALL.into_iter().flat_map(move |zone| {
            (1..=self.capacity(zone)).map(move |number| SeatLabel::new(zone, number))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneCount {
    pub occupied: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccupancyStats {
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub per_zone: BTreeMap<Zone, ZoneCount>,
}

impl OccupancyStats {
    pub fn zone(&self, zone: Zone) -> ZoneCount {
        self.per_zone.get(&zone).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatCollection {
    seats: BTreeMap<SeatLabel, Seat>,
}

impl SeatCollection {
    pub fn from_layout(layout: &SeatLayout) -> Self {
        Self {
            seats: layout.labels().map(|label| (label, Seat::available())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn get(&self, label: &SeatLabel) -> Option<&Seat> {
        self.seats.get(label)
    }

    pub fn contains(&self, label: &SeatLabel) -> bool {
        self.seats.contains_key(label)
    }

    /// Seats in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&SeatLabel, &Seat)> {
        self.seats.iter()
    }

    pub fn zone_seats(&self, zone: Zone) -> impl Iterator<Item = (&SeatLabel, &Seat)> {
        self.seats.iter().filter(move |(label, _)| label.zone() == zone)
    }

    /// Returns the seat after the transition, or `None` for an unknown label.
    pub fn toggle(&mut self, label: &SeatLabel, now: DateTime<Utc>) -> Option<Seat> {
        let seat = self.seats.get_mut(label)?;
        *seat = machine::toggle(seat, now);
        Some(*seat)
    }

    pub fn reset(&mut self, label: &SeatLabel) -> Option<Seat> {
        let seat = self.seats.get_mut(label)?;
        *seat = machine::reset(seat);
        Some(*seat)
    }

    /// Last write wins; labels outside the current key set are added.
    pub fn apply_remote(&mut self, label: SeatLabel, seat: Seat) {
        self.seats.insert(label, seat);
    }

    pub fn stats(&self) -> OccupancyStats {
        let mut stats = OccupancyStats::default();
        for zone in Zone::ALL {
            stats.per_zone.insert(zone, ZoneCount::default());
        }
        for (label, seat) in &self.seats {
            let zone = stats.per_zone.entry(label.zone()).or_default();
            zone.total += 1;
            stats.total += 1;
            if seat.occupied {
                zone.occupied += 1;
                stats.occupied += 1;
            }
        }
        stats.available = stats.total - stats.occupied;
        stats
    }
}

impl FromIterator<(SeatLabel, Seat)> for SeatCollection {
    fn from_iter<I: IntoIterator<Item = (SeatLabel, Seat)>>(iter: I) -> Self {
        Self {
            seats: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SeatCollection {
    type Item = (SeatLabel, Seat);
    type IntoIter = std::collections::btree_map::IntoIter<SeatLabel, Seat>;

    fn into_iter(self) -> Self::IntoIter {
        self.seats.into_iter()
    }
}

#[cfg(test)]
#[path = "tests/collection_tests.rs"]
mod tests;
