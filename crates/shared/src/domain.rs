use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seat grouping. Declaration order is the display order of the zone tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    T,
    C,
    B,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::T, Zone::C, Zone::B];

    pub fn prefix(self) -> char {
        match self {
            Zone::T => 'T',
            Zone::C => 'C',
            Zone::B => 'B',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'T' => Some(Zone::T),
            'C' => Some(Zone::C),
            'B' => Some(Zone::B),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl FromStr for Zone {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(prefix), None) => {
                Zone::from_prefix(prefix).ok_or_else(|| LabelError::UnknownZone(s.to_string()))
            }
            _ => Err(LabelError::UnknownZone(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("seat label is empty")]
    Empty,
    #[error("unknown zone in '{0}'")]
    UnknownZone(String),
    #[error("seat label '{0}' must end in a positive number")]
    InvalidNumber(String),
}

/// Zone-prefixed seat identifier such as `T14`.
///
/// Ordering follows zone order first and the numeric suffix second, so `T2`
/// sorts before `T10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatLabel {
    zone: Zone,
    number: u32,
}

impl SeatLabel {
    pub fn new(zone: Zone, number: u32) -> Self {
        Self { zone, number }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for SeatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.zone.prefix(), self.number)
    }
}

impl FromStr for SeatLabel {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let prefix = chars.next().ok_or(LabelError::Empty)?;
        let zone = Zone::from_prefix(prefix).ok_or_else(|| LabelError::UnknownZone(s.to_string()))?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LabelError::InvalidNumber(s.to_string()));
        }
        let number = digits
            .parse::<u32>()
            .map_err(|_| LabelError::InvalidNumber(s.to_string()))?;
        if number == 0 {
            return Err(LabelError::InvalidNumber(s.to_string()));
        }
        Ok(Self { zone, number })
    }
}

impl TryFrom<String> for SeatLabel {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatLabel> for String {
    fn from(value: SeatLabel) -> Self {
        value.to_string()
    }
}

/// Persisted seat fields. Timestamps travel as epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub occupied: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub paused_time: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn available() -> Self {
        Self::default()
    }

    /// `paused_time` implies occupied, and a missing `start_time` implies an
    /// available seat with no pause.
    pub fn is_consistent(&self) -> bool {
        if self.paused_time.is_some() && !self.occupied {
            return false;
        }
        if self.start_time.is_none() && (self.occupied || self.paused_time.is_some()) {
            return false;
        }
        true
    }
}
