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

//! Polling service that keeps the latest flight snapshot current.
//!
//! [`FlightPoller::spawn`] starts a background task that fetches from a
//! [`FlightProvider`] immediately and then on a fixed interval. State is
//! published through a `tokio::sync::watch` channel: readers only ever see
//! the latest accepted snapshot, replaced atomically as a whole.
//!
//! Failure semantics:
//! - a failed poll never discards the last good snapshot; the error rides
//!   alongside the stale data and auto-clears after a short display window,
//! - at most one fetch is in flight at any instant; interval ticks that fire
//!   while a fetch is outstanding are dropped, not queued,
//! - `stop()` (or dropping the handle) cancels the task and suppresses any
//!   in-flight fetch's effect on state.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::provider::{FlightProvider, ProviderError};
use crate::types::RadarSnapshot;

/// Configuration for the polling service.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between fetches.
    pub interval: Duration,
    /// How long a transient error stays visible before auto-clearing.
    pub error_display: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            error_display: Duration::from_secs(3),
        }
    }
}

/// The latest poller state: newest accepted snapshot plus a transient error.
///
/// `error` being `Some` means the most recent poll failed; the snapshot is
/// the last good one and keeps rendering while the error is displayed.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    /// Most recent accepted snapshot.
    pub snapshot: Arc<RadarSnapshot>,
    /// Transient error from the last poll, if it failed.
    pub error: Option<ProviderError>,
}

/// Handle to a running polling task.
///
/// Cheap snapshot access through [`snapshot`](Self::snapshot), change
/// notification through [`subscribe`](Self::subscribe), and graceful
/// teardown through [`stop`](Self::stop). Dropping the handle stops the task.
#[derive(Debug)]
pub struct FlightPoller {
    update_rx: watch::Receiver<PollUpdate>,
    cancel_token: CancellationToken,
}

impl FlightPoller {
    /// Spawn the polling task on the current Tokio runtime.
    ///
    /// The first fetch is issued immediately, then every `config.interval`.
    #[must_use]
    pub fn spawn<P: FlightProvider>(provider: P, config: PollerConfig) -> Self {
        let (update_tx, update_rx) = watch::channel(PollUpdate {
            snapshot: Arc::new(RadarSnapshot::empty()),
            error: None,
        });
        let cancel_token = CancellationToken::new();

        let task_cancel = cancel_token.clone();
        tokio::spawn(async move {
            poll_loop(provider, config, update_tx, task_cancel).await;
        });

        Self {
            update_rx,
            cancel_token,
        }
    }

    /// Get the most recent accepted snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RadarSnapshot> {
        self.update_rx.borrow().snapshot.clone()
    }

    /// Get the full current state, snapshot plus transient error.
    #[must_use]
    pub fn latest(&self) -> PollUpdate {
        self.update_rx.borrow().clone()
    }

    /// Subscribe to state changes.
    ///
    /// The receiver yields on every transition: new snapshot, new error,
    /// and error auto-clear.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollUpdate> {
        self.update_rx.clone()
    }

    /// Stop polling. Any in-flight fetch is abandoned without touching state.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for FlightPoller {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn poll_loop<P: FlightProvider>(
    provider: P,
    config: PollerConfig,
    update_tx: watch::Sender<PollUpdate>,
    cancel_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.interval);
    // A tick that fires while a fetch is outstanding is dropped, not queued.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Deadline at which the currently displayed error expires.
    let mut error_clear_at: Option<tokio::time::Instant> = None;

    loop {
        let clear_timer = error_expiry(error_clear_at);
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Poller cancelled");
                return;
            }
            () = clear_timer => {
                error_clear_at = None;
                update_tx.send_modify(|update| update.error = None);
            }
            _ = interval.tick() => {
                let fetch = provider.fetch();
                tokio::pin!(fetch);

                // Keep the cancel token and the error-expiry timer live
                // while the fetch is outstanding.
                let result = loop {
                    let clear_timer = error_expiry(error_clear_at);
                    tokio::select! {
                        () = cancel_token.cancelled() => {
                            info!("Poller cancelled during fetch");
                            return;
                        }
                        () = clear_timer => {
                            error_clear_at = None;
                            update_tx.send_modify(|update| update.error = None);
                        }
                        result = &mut fetch => break result,
                    }
                };

                match result {
                    Ok(flights) => {
                        error_clear_at = None;
                        let snapshot = Arc::new(RadarSnapshot::new(flights));
                        update_tx.send_modify(|update| {
                            update.snapshot = snapshot;
                            update.error = None;
                        });
                    }
                    Err(err) => {
                        warn!("Poll failed ({err}); keeping previous snapshot");
                        error_clear_at =
                            Some(tokio::time::Instant::now() + config.error_display);
                        update_tx.send_modify(|update| update.error = Some(err));
                    }
                }
            }
        }
    }
}

/// Resolves when the current error display window expires; pends forever if
/// no error is being displayed.
async fn error_expiry(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FlightStatus, GeoPosition, TrackedAircraft};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn aircraft(id: &str, lat: f64, lng: f64) -> TrackedAircraft {
        TrackedAircraft {
            id: id.to_owned(),
            position: GeoPosition::new(lat, lng),
            heading: 90.0,
            altitude: Some(35000.0),
            ground_speed: Some(440.0),
            status: FlightStatus::Active,
        }
    }

    /// Scripted provider: pops queued responses, then repeats `steady`.
    #[derive(Clone)]
    struct MockProvider {
        inner: Arc<MockInner>,
    }

    struct MockInner {
        responses: Mutex<VecDeque<Result<Vec<TrackedAircraft>, ProviderError>>>,
        steady: Result<Vec<TrackedAircraft>, ProviderError>,
        fetch_delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockProvider {
        fn new(
            responses: Vec<Result<Vec<TrackedAircraft>, ProviderError>>,
            steady: Result<Vec<TrackedAircraft>, ProviderError>,
            fetch_delay: Duration,
        ) -> Self {
            Self {
                inner: Arc::new(MockInner {
                    responses: Mutex::new(responses.into()),
                    steady,
                    fetch_delay,
                    calls: AtomicUsize::new(0),
                    in_flight: AtomicUsize::new(0),
                    max_in_flight: AtomicUsize::new(0),
                }),
            }
        }

        fn calls(&self) -> usize {
            self.inner.calls.load(Ordering::SeqCst)
        }

        fn max_in_flight(&self) -> usize {
            self.inner.max_in_flight.load(Ordering::SeqCst)
        }
    }

    impl FlightProvider for MockProvider {
        fn fetch(
            &self,
        ) -> impl std::future::Future<Output = Result<Vec<TrackedAircraft>, ProviderError>> + Send
        {
            let inner = self.inner.clone();
            async move {
                inner.calls.fetch_add(1, Ordering::SeqCst);
                let concurrent = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                inner.max_in_flight.fetch_max(concurrent, Ordering::SeqCst);

                if !inner.fetch_delay.is_zero() {
                    tokio::time::sleep(inner.fetch_delay).await;
                }

                inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                inner
                    .responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| inner.steady.clone())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_is_immediate() {
        let provider = MockProvider::new(
            vec![Ok(vec![aircraft("UA123", 37.0, -122.0)])],
            Ok(vec![]),
            Duration::ZERO,
        );
        let poller = FlightPoller::spawn(provider, PollerConfig::default());

        tokio::time::sleep(Duration::from_millis(10)).await;

        let update = poller.latest();
        assert_eq!(update.snapshot.len(), 1);
        assert!(update.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_retains_previous_snapshot() {
        let provider = MockProvider::new(
            vec![
                Ok(vec![aircraft("UA123", 37.0, -122.0), aircraft("DL9", 10.0, 10.0)]),
                Err(ProviderError::Network("connection reset".to_owned())),
            ],
            Err(ProviderError::Network("connection reset".to_owned())),
            Duration::ZERO,
        );
        let config = PollerConfig {
            interval: Duration::from_secs(10),
            error_display: Duration::from_secs(3),
        };
        let poller = FlightPoller::spawn(provider, config);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let good = poller.snapshot();
        assert_eq!(good.len(), 2);

        // Second poll fails; the accepted snapshot must be untouched.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let update = poller.latest();
        assert!(matches!(update.error, Some(ProviderError::Network(_))));
        assert_eq!(update.snapshot.flights, good.flights);
        assert_eq!(update.snapshot.fetched_at, good.fetched_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_error_auto_clears() {
        let provider = MockProvider::new(
            vec![
                Ok(vec![aircraft("UA123", 37.0, -122.0)]),
                Err(ProviderError::RateLimited),
            ],
            Ok(vec![aircraft("UA123", 37.0, -122.0)]),
            Duration::ZERO,
        );
        let config = PollerConfig {
            interval: Duration::from_secs(30),
            error_display: Duration::from_secs(3),
        };
        let poller = FlightPoller::spawn(provider, config);

        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        let update = poller.latest();
        assert_eq!(update.error, Some(ProviderError::RateLimited));
        assert_eq!(update.snapshot.len(), 1);

        // Still displayed just before the window expires...
        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(poller.latest().error, Some(ProviderError::RateLimited));

        // ...and cleared right after, well before the next poll.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let cleared = poller.latest();
        assert!(cleared.error.is_none());
        assert_eq!(cleared.snapshot.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_fetch_in_flight() {
        // Fetches take 2.5 intervals; ticks fired meanwhile must be dropped.
        let provider = MockProvider::new(vec![], Ok(vec![]), Duration::from_millis(250));
        let config = PollerConfig {
            interval: Duration::from_millis(100),
            error_display: Duration::from_secs(3),
        };
        let poller = FlightPoller::spawn(provider.clone(), config);

        tokio::time::sleep(Duration::from_secs(2)).await;
        poller.stop();

        assert_eq!(provider.max_in_flight(), 1);
        // With queued ticks this would be ~20; with skip it is bounded by
        // one fetch per fetch-duration rounded up to the interval.
        assert!(provider.calls() <= 8, "calls = {}", provider.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_suppresses_in_flight_fetch() {
        let provider = MockProvider::new(
            vec![Ok(vec![aircraft("UA123", 37.0, -122.0)])],
            Ok(vec![]),
            Duration::from_millis(500),
        );
        let poller = FlightPoller::spawn(provider, PollerConfig::default());

        // Let the first fetch start, then stop while it is outstanding.
        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let update = poller.latest();
        assert!(update.snapshot.is_empty());
        assert!(update.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_error_transitions() {
        let provider = MockProvider::new(
            vec![Ok(vec![aircraft("UA123", 37.0, -122.0)]), Err(ProviderError::RateLimited)],
            Ok(vec![aircraft("UA123", 37.0, -122.0)]),
            Duration::ZERO,
        );
        let config = PollerConfig {
            interval: Duration::from_secs(10),
            error_display: Duration::from_secs(3),
        };
        let poller = FlightPoller::spawn(provider, config);
        let mut rx = poller.subscribe();

        // First snapshot.
        rx.changed().await.unwrap();
        assert!(rx.borrow().error.is_none());

        // Failure with stale snapshot alongside.
        rx.changed().await.unwrap();
        {
            let update = rx.borrow();
            assert_eq!(update.error, Some(ProviderError::RateLimited));
            assert_eq!(update.snapshot.len(), 1);
        }

        // Auto-clear notification.
        rx.changed().await.unwrap();
        assert!(rx.borrow().error.is_none());
    }
}
