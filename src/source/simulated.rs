//! Simulated provider: a receiver travelling in a straight line.
//!
//! Used by the command line front-end when no platform positioning backend
//! is wired in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{PositionSample, MEAN_EARTH_RADIUS_M};
use crate::source::{
    FixSink, PositionProvider, ProviderError, ProviderId, ProviderResult, SubscriptionRequest,
};

pub struct SimulatedProvider {
    id: ProviderId,
    motion: Motion,
    enabled: Arc<AtomicBool>,
    subscription: Mutex<Option<Subscription>>,
}

/// Live push feed: the task's stop token and the sink it feeds
struct Subscription {
    cancel: CancellationToken,
    sink: FixSink,
}

/// Straight-line track shared with the push feed task
#[derive(Debug, Clone, Copy)]
struct Motion {
    origin: (f64, f64),
    altitude_m: f64,
    accuracy_m: f64,
    speed_mps: f64,
    bearing_deg: f64,
    started: Instant,
}

impl Motion {
    fn position_after(&self, elapsed_s: f64) -> (f64, f64) {
        let travelled = self.speed_mps * elapsed_s;
        let bearing = self.bearing_deg.to_radians();
        let (lat0, lon0) = self.origin;

        let lat = lat0 + (travelled * bearing.cos() / MEAN_EARTH_RADIUS_M).to_degrees();
        let cos_lat = lat0.to_radians().cos().max(1e-6);
        let lon = lon0 + (travelled * bearing.sin() / (MEAN_EARTH_RADIUS_M * cos_lat)).to_degrees();

        (lat.clamp(-90.0, 90.0), wrap_longitude(lon))
    }

    fn fix(&self, provider: &ProviderId) -> ProviderResult<PositionSample> {
        let (lat, lon) = self.position_after(self.started.elapsed().as_secs_f64());
        PositionSample::new(Utc::now(), lat, lon, self.altitude_m, self.accuracy_m).map_err(|e| {
            ProviderError::Backend {
                provider: provider.clone(),
                details: e.to_string(),
            }
        })
    }
}

impl SimulatedProvider {
    /// Stationary receiver at the given coordinates
    pub fn new(id: ProviderId, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            motion: Motion {
                origin: (latitude, longitude),
                altitude_m: 0.0,
                accuracy_m: 5.0,
                speed_mps: 0.0,
                bearing_deg: 0.0,
                started: Instant::now(),
            },
            enabled: Arc::new(AtomicBool::new(true)),
            subscription: Mutex::new(None),
        }
    }

    /// Move at `speed_mps` along `bearing_deg` (0 = north, 90 = east)
    pub fn with_motion(mut self, speed_mps: f64, bearing_deg: f64) -> Self {
        self.motion.speed_mps = speed_mps.max(0.0);
        self.motion.bearing_deg = bearing_deg;
        self
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.motion.altitude_m = altitude_m;
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.motion.accuracy_m = accuracy_m.max(0.0);
        self
    }

    /// Switch the receiver on or off, notifying an active subscriber.
    /// A disabled receiver keeps its feed task but pushes nothing.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous == enabled {
            return;
        }
        let sink = self.subscription().as_ref().map(|sub| sub.sink.clone());
        if let Some(sink) = sink {
            sink.availability_changed(enabled);
        }
    }

    /// Position after travelling `elapsed_s` seconds
    pub fn position_after(&self, elapsed_s: f64) -> (f64, f64) {
        self.motion.position_after(elapsed_s)
    }

    fn subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_subscription(&self) {
        if let Some(previous) = self.subscription().take() {
            previous.cancel.cancel();
        }
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

impl PositionProvider for SimulatedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn is_enabled(&self) -> ProviderResult<bool> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    fn subscribe(&self, request: &SubscriptionRequest, sink: FixSink) -> ProviderResult<()> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable {
                provider: self.id.clone(),
            });
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| ProviderError::Backend {
            provider: self.id.clone(),
            details: e.to_string(),
        })?;

        self.cancel_subscription();
        let token = CancellationToken::new();
        *self.subscription() = Some(Subscription {
            cancel: token.clone(),
            sink: sink.clone(),
        });

        let motion = self.motion;
        let enabled = Arc::clone(&self.enabled);
        let id = self.id.clone();
        let request = *request;

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(request.min_interval());
            let mut last_pushed: Option<PositionSample> = None;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !enabled.load(Ordering::SeqCst) {
                            continue;
                        }
                        let Ok(fix) = motion.fix(&id) else { continue };
                        let moved = last_pushed
                            .as_ref()
                            .map_or(true, |last| last.distance_to(&fix) >= request.min_distance_m);
                        if !moved {
                            continue;
                        }
                        if sink.deliver(fix.clone()) {
                            last_pushed = Some(fix);
                        } else if sink.is_closed() {
                            break;
                        }
                    }
                }
            }
            debug!(provider = %id, "Simulated push feed stopped");
        });
        Ok(())
    }

    fn last_known_fix(&self) -> ProviderResult<Option<PositionSample>> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.motion.fix(&self.id).map(Some)
    }

    fn unsubscribe(&self) -> ProviderResult<()> {
        self.cancel_subscription();
        Ok(())
    }
}

impl Drop for SimulatedProvider {
    fn drop(&mut self) {
        self.cancel_subscription();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stationary_receiver() {
        let provider = SimulatedProvider::new(ProviderId::gps(), 10.0, 20.0);
        assert_eq!(provider.position_after(3600.0), (10.0, 20.0));
        let fix = provider.last_known_fix().unwrap().unwrap();
        assert_eq!((fix.latitude, fix.longitude), (10.0, 20.0));
        assert_eq!(fix.accuracy, 5.0);
    }

    #[test]
    fn test_moves_north() {
        let provider = SimulatedProvider::new(ProviderId::gps(), 10.0, 20.0).with_motion(10.0, 0.0);
        let (lat, lon) = provider.position_after(10.0);
        let travelled = crate::core::surface_distance_m(10.0, 20.0, lat, lon);
        assert!((travelled - 100.0).abs() < 0.1, "got {}", travelled);
        assert!((lon - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_has_no_fix() {
        let provider = SimulatedProvider::new(ProviderId::network(), 0.0, 0.0);
        provider.set_enabled(false);
        assert!(!provider.is_enabled().unwrap());
        assert!(provider.last_known_fix().unwrap().is_none());
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(181.0), -179.0);
        assert_eq!(wrap_longitude(-181.0), 179.0);
        assert_eq!(wrap_longitude(180.0), 180.0);
        assert_eq!(wrap_longitude(45.0), 45.0);
    }

    mod feed {
        use super::*;
        use std::time::Duration;
        use crate::source::SourceEvent;
        use tokio::sync::mpsc;

        fn subscribed(
            provider: &SimulatedProvider,
            min_interval_ms: u64,
            min_distance_m: f64,
        ) -> mpsc::Receiver<SourceEvent> {
            let (tx, rx) = mpsc::channel(16);
            let sink = FixSink::new(provider.id().clone(), tx, CancellationToken::new());
            provider
                .subscribe(&SubscriptionRequest::new(min_interval_ms, min_distance_m), sink)
                .unwrap();
            rx
        }

        async fn next_fix(rx: &mut mpsc::Receiver<SourceEvent>) -> PositionSample {
            loop {
                match rx.recv().await {
                    Some(SourceEvent::Fix { sample, .. }) => return sample,
                    Some(SourceEvent::Availability { .. }) => continue,
                    None => panic!("feed closed"),
                }
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_feed_delivers_fixes() {
            let provider =
                SimulatedProvider::new(ProviderId::gps(), 10.0, 20.0).with_motion(10.0, 0.0);
            let mut rx = subscribed(&provider, 1000, 5.0);

            let first = next_fix(&mut rx).await;
            let second = next_fix(&mut rx).await;
            let moved = first.distance_to(&second);
            assert!((moved - 10.0).abs() < 0.1, "got {}", moved);
            assert!(second.latitude > first.latitude);
        }

        #[tokio::test(start_paused = true)]
        async fn test_feed_suppresses_short_moves() {
            // 2 m per tick against a 5 m hint: every third tick is pushed
            let provider =
                SimulatedProvider::new(ProviderId::gps(), 0.0, 0.0).with_motion(2.0, 90.0);
            let mut rx = subscribed(&provider, 1000, 5.0);

            let first = next_fix(&mut rx).await;
            let started = Instant::now();
            let second = next_fix(&mut rx).await;

            assert_eq!(started.elapsed(), Duration::from_secs(3));
            assert!(first.distance_to(&second) >= 5.0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stationary_feed_pushes_once() {
            let provider = SimulatedProvider::new(ProviderId::gps(), 5.0, 5.0);
            let mut rx = subscribed(&provider, 1000, 5.0);

            next_fix(&mut rx).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
            assert!(rx.try_recv().is_err());
        }

        #[tokio::test(start_paused = true)]
        async fn test_unsubscribe_stops_feed() {
            let provider =
                SimulatedProvider::new(ProviderId::gps(), 0.0, 0.0).with_motion(10.0, 0.0);
            let mut rx = subscribed(&provider, 1000, 5.0);
            next_fix(&mut rx).await;

            provider.unsubscribe().unwrap();
            // the task drops the last sender when it exits
            while let Some(event) = rx.recv().await {
                assert!(matches!(event, SourceEvent::Fix { .. }));
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_drop_stops_feed() {
            let provider =
                SimulatedProvider::new(ProviderId::gps(), 0.0, 0.0).with_motion(10.0, 0.0);
            let mut rx = subscribed(&provider, 1000, 5.0);
            next_fix(&mut rx).await;

            drop(provider);
            tokio::time::sleep(Duration::from_secs(5)).await;
            let mut remaining = 0;
            while rx.recv().await.is_some() {
                remaining += 1;
            }
            assert!(remaining <= 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_availability_forwarded_to_subscriber() {
            let provider =
                SimulatedProvider::new(ProviderId::network(), 0.0, 0.0).with_motion(10.0, 0.0);
            let mut rx = subscribed(&provider, 1000, 5.0);

            provider.set_enabled(false);
            // repeated state is not re-announced
            provider.set_enabled(false);
            let event = rx.recv().await.unwrap();
            assert!(matches!(
                event,
                SourceEvent::Availability { enabled: false, .. }
            ));

            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(rx.try_recv().is_err());

            provider.set_enabled(true);
            assert!(matches!(
                rx.recv().await,
                Some(SourceEvent::Availability { enabled: true, .. })
            ));
            next_fix(&mut rx).await;
        }
    }
}
