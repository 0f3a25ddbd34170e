// Copyright 2025 RadarScope contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Core flight-tracking data types shared by the provider and poller layers.
//!
//! A [`RadarSnapshot`] is one complete set of [`TrackedAircraft`] valid at a
//! single polling instant. Snapshots are immutable: each successful poll
//! produces a fresh snapshot that replaces the previous one wholesale, so
//! readers never observe partial updates.

use chrono::{DateTime, Utc};

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    /// Latitude in degrees, -90 to 90.
    pub lat: f64,
    /// Longitude in degrees, -180 to 180.
    pub lng: f64,
}

impl GeoPosition {
    /// Create a position from latitude and longitude in degrees.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both coordinates are finite numbers.
    ///
    /// Providers occasionally emit NaN or out-of-band sentinel values for
    /// aircraft without a live fix; such records are skipped per-aircraft
    /// rather than aborting the whole snapshot.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Operational status of a flight. Closed set; unknown provider values are
/// treated as malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightStatus {
    Scheduled,
    Active,
    Landed,
    Cancelled,
    Incident,
    Diverted,
}

impl FlightStatus {
    /// Parse a provider status string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "active" => Some(Self::Active),
            "landed" => Some(Self::Landed),
            "cancelled" => Some(Self::Cancelled),
            "incident" => Some(Self::Incident),
            "diverted" => Some(Self::Diverted),
            _ => None,
        }
    }

    /// Wire/query representation of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Landed => "landed",
            Self::Cancelled => "cancelled",
            Self::Incident => "incident",
            Self::Diverted => "diverted",
        }
    }
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked aircraft as reported by the provider.
///
/// Immutable within a snapshot. Altitude and ground speed may be unknown for
/// aircraft without live telemetry; consumers degrade to a placeholder
/// rendering instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAircraft {
    /// Flight identity (e.g. IATA flight number).
    pub id: String,
    /// Current geographic position.
    pub position: GeoPosition,
    /// Heading in degrees, 0-359, 0 = north, clockwise.
    pub heading: f64,
    /// Barometric altitude in feet, if known.
    pub altitude: Option<f64>,
    /// Ground speed in knots, if known.
    pub ground_speed: Option<f64>,
    /// Operational status.
    pub status: FlightStatus,
}

/// An ordered collection of tracked aircraft valid at one polling instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarSnapshot {
    /// Flights in provider order. Order is stable within a snapshot and is
    /// used for deterministic tie-breaking in hit-testing.
    pub flights: Vec<TrackedAircraft>,
    /// When this snapshot was accepted.
    pub fetched_at: DateTime<Utc>,
}

impl RadarSnapshot {
    /// Create a snapshot from freshly fetched flights, stamped now.
    #[must_use]
    pub fn new(flights: Vec<TrackedAircraft>) -> Self {
        Self {
            flights,
            fetched_at: Utc::now(),
        }
    }

    /// The empty snapshot used before the first successful poll.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of tracked aircraft.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Whether the snapshot contains no aircraft.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Look up a flight by id. Selection holds ids weakly; a miss here means
    /// the selection has gone stale, which callers must tolerate.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TrackedAircraft> {
        self.flights.iter().find(|f| f.id == id)
    }
}
