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

//! Provider layer for fetching flight data over REST.
//!
//! This module defines the [`FlightProvider`] trait as the seam between the
//! poller and the outside world, plus the [`RestProvider`] implementation for
//! JSON flight-data APIs. Provider failures are normalized into the
//! [`ProviderError`] taxonomy so the UI can classify them without knowing
//! anything about HTTP. Rate limiting is classified, never retried here.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{FlightStatus, GeoPosition, TrackedAircraft};

/// Request timeout applied to every provider fetch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed provider failures.
///
/// Variants carry owned messages rather than source errors so updates can be
/// published through a watch channel (which requires `Clone`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider's rate limit was exceeded (HTTP 429).
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// The API key was missing or rejected (HTTP 401).
    #[error("provider rejected the API key")]
    Unauthorized,

    /// The key is valid but not allowed to access this resource (HTTP 403).
    #[error("access to the requested provider resource is forbidden")]
    Forbidden,

    /// Transport-level failure: DNS, connect, TLS, or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Anything else the provider did that we cannot classify.
    #[error("unexpected provider response: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            code => Self::Provider(format!("HTTP {code}")),
        }
    }

    fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else {
            Self::Provider(err.to_string())
        }
    }
}

/// Query filters for a flight fetch.
///
/// All filters are optional; an empty query asks for every currently tracked
/// flight the key is allowed to see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightQuery {
    /// Restrict to flights in one operational status.
    pub status: Option<FlightStatus>,
    /// Restrict to flights on a given date.
    pub date: Option<NaiveDate>,
    /// Restrict to flights departing from an airport (IATA code).
    pub departure_airport: Option<String>,
    /// Page size.
    pub limit: Option<u32>,
    /// Page offset.
    pub offset: Option<u32>,
}

impl FlightQuery {
    /// Query for all currently airborne flights.
    #[must_use]
    pub fn active() -> Self {
        Self {
            status: Some(FlightStatus::Active),
            ..Self::default()
        }
    }

    /// Builder method to filter by departure airport.
    #[must_use]
    pub fn with_departure_airport(mut self, iata: impl Into<String>) -> Self {
        self.departure_airport = Some(iata.into());
        self
    }

    /// Builder method to request one result page.
    #[must_use]
    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Encode the filters as query parameters.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = self.status {
            params.push(("flight_status", status.as_str().to_owned()));
        }
        if let Some(date) = self.date {
            params.push(("flight_date", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(ref iata) = self.departure_airport {
            params.push(("dep_iata", iata.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        params
    }
}

/// Source of tracked-flight data.
///
/// The poller is generic over this trait so tests can substitute a scripted
/// provider without any network access.
pub trait FlightProvider: Send + Sync + 'static {
    /// Fetch the current set of tracked flights.
    fn fetch(&self) -> impl Future<Output = Result<Vec<TrackedAircraft>, ProviderError>> + Send;
}

/// REST client for a flight-data provider.
///
/// Issues one GET per fetch against the provider's `/flights` endpoint,
/// authenticated with a static access key passed as a query parameter.
#[derive(Debug, Clone)]
pub struct RestProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    query: FlightQuery,
}

impl RestProvider {
    /// Create a provider client for the given endpoint and key.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        query: FlightQuery,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            query,
        })
    }

    async fn fetch_flights(&self) -> Result<Vec<TrackedAircraft>, ProviderError> {
        let url = format!("{}/flights", self.base_url);
        let params = self.query.to_params();

        let response = self
            .http
            .get(&url)
            .query(&[("access_key", self.api_key.as_str())])
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status));
        }

        let body: FlightsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("malformed response body: {e}")))?;

        Ok(normalize_flights(body.data))
    }
}

impl FlightProvider for RestProvider {
    fn fetch(&self) -> impl Future<Output = Result<Vec<TrackedAircraft>, ProviderError>> + Send {
        self.fetch_flights()
    }
}

/// Top-level response envelope.
#[derive(Debug, Deserialize)]
struct FlightsResponse {
    #[serde(default)]
    data: Vec<WireFlight>,
}

/// One flight record as the provider serializes it.
#[derive(Debug, Default, Deserialize)]
struct WireFlight {
    flight: Option<WireFlightIdent>,
    flight_status: Option<String>,
    live: Option<WireLive>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFlightIdent {
    iata: Option<String>,
    icao: Option<String>,
}

/// Live telemetry block. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
struct WireLive {
    latitude: Option<f64>,
    longitude: Option<f64>,
    direction: Option<f64>,
    altitude: Option<f64>,
    speed_horizontal: Option<f64>,
}

/// Normalize wire records, skipping malformed ones per-record.
fn normalize_flights(records: Vec<WireFlight>) -> Vec<TrackedAircraft> {
    records
        .into_iter()
        .filter_map(|record| match normalize_flight(record) {
            Ok(aircraft) => Some(aircraft),
            Err(reason) => {
                warn!("Skipping malformed flight record: {reason}");
                None
            }
        })
        .collect()
}

fn normalize_flight(record: WireFlight) -> Result<TrackedAircraft, String> {
    let id = record
        .flight
        .and_then(|ident| ident.iata.or(ident.icao))
        .filter(|id| !id.is_empty())
        .ok_or("missing flight identity")?;

    let status = record
        .flight_status
        .as_deref()
        .and_then(FlightStatus::parse)
        .ok_or_else(|| format!("unknown status {:?} for {id}", record.flight_status))?;

    let live = record.live.ok_or_else(|| format!("no live block for {id}"))?;

    let position = match (live.latitude, live.longitude) {
        (Some(lat), Some(lng)) => GeoPosition::new(lat, lng),
        _ => return Err(format!("no live position for {id}")),
    };
    if !position.is_finite() {
        return Err(format!("non-finite position for {id}"));
    }

    Ok(TrackedAircraft {
        id,
        position,
        heading: live.direction.unwrap_or(0.0).rem_euclid(360.0),
        // Negative telemetry is a provider artifact; treat it as unknown.
        altitude: live.altitude.filter(|alt| *alt >= 0.0),
        ground_speed: live.speed_horizontal.filter(|spd| *spd >= 0.0),
        status,
    })
}
