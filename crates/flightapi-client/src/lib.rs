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

//! Client library for REST flight-data providers.
//!
//! Provides layers that can be used independently or composed together:
//!
//! - **Types**: the snapshot data model ([`TrackedAircraft`], [`RadarSnapshot`])
//! - **Provider layer**: a typed REST client with query filters and a
//!   classified error taxonomy ([`RestProvider`], [`ProviderError`])
//! - **Poller layer**: a background polling service that atomically replaces
//!   the latest snapshot and publishes it through a watch channel
//!   ([`FlightPoller`])
//!
//! # Quick Start
//!
//! ```no_run
//! use flightapi_client::{FlightPoller, FlightQuery, PollerConfig, RestProvider};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = RestProvider::new(
//!         "https://api.example.com/v1",
//!         "my-access-key",
//!         FlightQuery::active(),
//!     )
//!     .expect("HTTP client");
//!
//!     let poller = FlightPoller::spawn(provider, PollerConfig {
//!         interval: Duration::from_secs(10),
//!         ..Default::default()
//!     });
//!
//!     let mut updates = poller.subscribe();
//!     while updates.changed().await.is_ok() {
//!         let update = updates.borrow().clone();
//!         println!("{} aircraft tracked", update.snapshot.len());
//!     }
//! }
//! ```

pub mod poller;
pub mod provider;
pub mod types;

pub use poller::{FlightPoller, PollUpdate, PollerConfig};
pub use provider::{FlightProvider, FlightQuery, ProviderError, RestProvider};
pub use types::{FlightStatus, GeoPosition, RadarSnapshot, TrackedAircraft};
