//! Accuracy-driven location acquisition.
//!
//! A session asks the sensor for a quick coarse fix and at the same time
//! subscribes to precise samples. Every sample is reported to the caller,
//! the lowest-error one is remembered, and the session settles on the first
//! sample within the required accuracy. When the time budget runs out it
//! settles on the best sample seen so far instead.

use std::time::Duration;

use futures::{FutureExt, StreamExt};
use serde::Serialize;
use utoipa::ToSchema;

use super::distance::haversine_m;
use super::sensor::{ChannelSensor, LocationSensor, PositionOptions, SensorError, SensorResult, WatchId};
use super::{GeoPoint, LocationReading};

#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    pub required_accuracy_m: f64,
    pub max_duration: Duration,
    pub quick_fix_timeout: Duration,
    /// Only used to report distance while sampling.
    pub target: Option<GeoPoint>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            required_accuracy_m: 80.0,
            max_duration: Duration::from_millis(10_000),
            quick_fix_timeout: Duration::from_secs(5),
            target: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Initial,
    Searching,
    Improving,
    Success,
    Error,
}

/// Progress report, emitted once per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub reading: LocationReading,
    pub is_reliable: bool,
    pub best_accuracy: f64,
    pub distance_to_target_m: Option<f64>,
    pub state: AcquisitionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LocationResult {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub is_reliable: bool,
    pub distance_to_target_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied. Allow location access and retry.")]
    PermissionDenied,
    #[error("Location information is unavailable. Move to an open area and retry.")]
    PositionUnavailable,
    #[error("Location request timed out. Please retry.")]
    Timeout,
    #[error("Geolocation is not supported on this device.")]
    Unsupported,
    #[error("No location reading was obtained in time. Please retry.")]
    NoReadingObtained,
}

impl From<SensorError> for LocationError {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::PermissionDenied => LocationError::PermissionDenied,
            SensorError::PositionUnavailable => LocationError::PositionUnavailable,
            SensorError::Timeout => LocationError::Timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    QuickFix,
    Watch,
}

enum Step {
    Sample(Source, SensorResult),
    WatchEnded,
    Deadline,
}

pub struct AcquisitionSession<S: LocationSensor> {
    sensor: S,
    config: AcquisitionConfig,
    state: AcquisitionState,
    readings: Vec<LocationReading>,
    best: Option<LocationReading>,
    watch: Option<WatchId>,
}

impl<S: LocationSensor> AcquisitionSession<S> {
    pub fn new(sensor: S, config: AcquisitionConfig) -> Self {
        Self {
            sensor,
            config,
            state: AcquisitionState::Initial,
            readings: Vec::new(),
            best: None,
            watch: None,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn readings(&self) -> &[LocationReading] {
        &self.readings
    }

    pub fn best_reading(&self) -> Option<&LocationReading> {
        self.best.as_ref()
    }

    /// Runs one acquisition. Calling it again starts over with a fresh
    /// subscription; that is how a caller retries.
    pub async fn run<F>(&mut self, mut on_update: F) -> Result<LocationResult, LocationError>
    where
        F: FnMut(&LocationUpdate),
    {
        self.cancel();
        self.readings.clear();
        self.best = None;
        self.state = AcquisitionState::Initial;

        if !self.sensor.is_supported() {
            self.state = AcquisitionState::Error;
            return Err(LocationError::Unsupported);
        }

        self.state = AcquisitionState::Searching;
        let mut quick = self
            .sensor
            .current_position(PositionOptions::quick(self.config.quick_fix_timeout))
            .fuse();
        let (watch_id, watch) = self.sensor.watch_position(PositionOptions::precise());
        self.watch = Some(watch_id);
        let mut watch = watch.fuse();
        let deadline_at = tokio::time::Instant::now() + self.config.max_duration;
        let deadline = tokio::time::sleep_until(deadline_at);
        tokio::pin!(deadline);

        let mut quick_done = false;
        let mut watch_done = false;

        let outcome = loop {
            let step = tokio::select! {
                biased;
                _ = &mut deadline => Step::Deadline,
                result = &mut quick, if !quick_done => Step::Sample(Source::QuickFix, result),
                item = watch.next(), if !watch_done => match item {
                    Some(result) => Step::Sample(Source::Watch, result),
                    None => Step::WatchEnded,
                },
            };

            match step {
                // A backlog drained after the deadline does not count.
                Step::Sample(..) if tokio::time::Instant::now() >= deadline_at => break self.fallback(),
                Step::Sample(source, result) => {
                    if source == Source::QuickFix {
                        quick_done = true;
                    }
                    if let Some(outcome) = self.on_sample(source, result, &mut on_update) {
                        break outcome;
                    }
                }
                Step::WatchEnded => watch_done = true,
                Step::Deadline => break self.fallback(),
            }

            // Nothing left that could still report.
            if quick_done && watch_done {
                break self.fallback();
            }
        };

        drop(quick);
        drop(watch);
        self.cancel();

        self.state = match outcome {
            Ok(_) => AcquisitionState::Success,
            Err(_) => AcquisitionState::Error,
        };
        match &outcome {
            Ok(result) => tracing::debug!(
                accuracy = result.accuracy,
                reliable = result.is_reliable,
                samples = self.readings.len(),
                "Location acquired"
            ),
            Err(e) => tracing::debug!(error = %e, "Location acquisition failed"),
        }
        outcome
    }

    /// Clears the watch subscription. Safe to call any number of times.
    pub fn cancel(&mut self) {
        if let Some(id) = self.watch.take() {
            self.sensor.clear_watch(id);
        }
    }

    fn on_sample<F>(
        &mut self,
        source: Source,
        result: SensorResult,
        on_update: &mut F,
    ) -> Option<Result<LocationResult, LocationError>>
    where
        F: FnMut(&LocationUpdate),
    {
        match result {
            Ok(reading) => {
                self.readings.push(reading);
                if self.best.is_none_or(|best| reading.accuracy < best.accuracy) {
                    self.best = Some(reading);
                }

                let is_reliable = reading.is_reliable(self.config.required_accuracy_m);
                self.state = if is_reliable {
                    AcquisitionState::Success
                } else {
                    AcquisitionState::Improving
                };

                on_update(&LocationUpdate {
                    reading,
                    is_reliable,
                    best_accuracy: self.best.map_or(reading.accuracy, |b| b.accuracy),
                    distance_to_target_m: self.distance_to_target(&reading),
                    state: self.state,
                });

                is_reliable.then(|| Ok(self.result_for(reading)))
            }
            // The coarse request giving up only ends the fast path.
            Err(SensorError::Timeout) if source == Source::QuickFix => None,
            Err(e) => Some(match self.best {
                Some(best) => Ok(self.result_for(best)),
                None => Err(e.into()),
            }),
        }
    }

    fn fallback(&self) -> Result<LocationResult, LocationError> {
        self.best
            .map(|best| self.result_for(best))
            .ok_or(LocationError::NoReadingObtained)
    }

    fn distance_to_target(&self, reading: &LocationReading) -> Option<f64> {
        self.config.target.map(|t| haversine_m(t, reading.point()))
    }

    fn result_for(&self, reading: LocationReading) -> LocationResult {
        LocationResult {
            latitude: reading.latitude,
            longitude: reading.longitude,
            accuracy: reading.accuracy,
            is_reliable: reading.is_reliable(self.config.required_accuracy_m),
            distance_to_target_m: self.distance_to_target(&reading),
        }
    }
}

impl<S: LocationSensor> Drop for AcquisitionSession<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One-off acquisition with a fresh session.
pub async fn acquire_location<S, F>(
    sensor: S,
    config: AcquisitionConfig,
    on_update: F,
) -> Result<LocationResult, LocationError>
where
    S: LocationSensor,
    F: FnMut(&LocationUpdate),
{
    AcquisitionSession::new(sensor, config).run(on_update).await
}

/// Runs a session over samples that were already collected, in order. The
/// first sample doubles as the quick fix.
pub async fn settle_samples(
    samples: &[LocationReading],
    config: AcquisitionConfig,
) -> Result<LocationResult, LocationError> {
    let (sensor, mut feed) = ChannelSensor::channel();
    let mut rest = samples.iter();
    if let Some(first) = rest.next() {
        feed.quick_fix(Ok(*first));
    }
    for reading in rest {
        feed.push(*reading);
    }
    drop(feed);

    acquire_location(sensor, config, |update| {
        tracing::trace!(accuracy = update.reading.accuracy, state = ?update.state, "Replayed sample");
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::sensor::SensorFeed;
    use chrono::Utc;

    fn reading(accuracy: f64) -> LocationReading {
        LocationReading {
            latitude: 23.0225,
            longitude: 72.5714,
            accuracy,
            timestamp: Utc::now(),
        }
    }

    fn session() -> (AcquisitionSession<ChannelSensor>, SensorFeed) {
        let (sensor, feed) = ChannelSensor::channel();
        (AcquisitionSession::new(sensor, AcquisitionConfig::default()), feed)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_reliable_reading() {
        let (mut session, feed) = session();
        for accuracy in [150.0, 60.0, 30.0] {
            feed.push(reading(accuracy));
        }

        let mut updates = Vec::new();
        let result = session.run(|u| updates.push(u.clone())).await.unwrap();

        assert_eq!(result.accuracy, 60.0);
        assert!(result.is_reliable);
        let seen: Vec<_> = updates.iter().map(|u| u.reading.accuracy).collect();
        assert_eq!(seen, vec![150.0, 60.0]);
        assert!(!updates[0].is_reliable);
        assert!(updates[1].is_reliable);
        assert_eq!(session.state(), AcquisitionState::Success);
        assert!(!feed.is_watching());
        assert_eq!(feed.clear_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_settles_on_best_reading() {
        let (mut session, feed) = session();
        feed.push(reading(150.0));
        feed.push(reading(95.0));

        let mut count = 0;
        let result = session.run(|_| count += 1).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(result.accuracy, 95.0);
        assert!(!result.is_reliable);
        assert_eq!(session.best_reading().map(|r| r.accuracy), Some(95.0));
        assert_eq!(feed.clear_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_readings_is_an_error() {
        let (mut session, feed) = session();
        let err = session.run(|_| {}).await.unwrap_err();
        assert_eq!(err, LocationError::NoReadingObtained);
        assert_eq!(session.state(), AcquisitionState::Error);
        assert_eq!(feed.clear_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_error_before_any_reading_is_terminal() {
        let (mut session, feed) = session();
        feed.fail(SensorError::PermissionDenied);
        assert_eq!(session.run(|_| {}).await, Err(LocationError::PermissionDenied));
        assert!(!feed.is_watching());
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_error_after_a_reading_uses_best() {
        let (mut session, feed) = session();
        feed.push(reading(150.0));
        feed.fail(SensorError::PositionUnavailable);
        feed.push(reading(10.0));

        let result = session.run(|_| {}).await.unwrap();
        assert_eq!(result.accuracy, 150.0);
        assert!(!result.is_reliable);
        assert_eq!(session.readings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_fix_can_settle_the_session() {
        let (mut session, mut feed) = session();
        feed.quick_fix(Ok(reading(40.0)));

        let result = session.run(|_| {}).await.unwrap();
        assert_eq!(result.accuracy, 40.0);
        assert!(result.is_reliable);
        assert_eq!(feed.clear_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_sensor_never_subscribes() {
        let (sensor, feed) = ChannelSensor::unsupported();
        let err = acquire_location(sensor, AcquisitionConfig::default(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::Unsupported);
        assert_eq!(feed.clear_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_distance_to_target() {
        let (sensor, feed) = ChannelSensor::channel();
        let config = AcquisitionConfig {
            target: Some(GeoPoint {
                latitude: 23.0235,
                longitude: 72.5714,
            }),
            ..Default::default()
        };
        feed.push(reading(20.0));

        let mut distances = Vec::new();
        let result = acquire_location(sensor, config, |u| distances.push(u.distance_to_target_m))
            .await
            .unwrap();

        let d = result.distance_to_target_m.unwrap();
        assert!((d - 111.2).abs() < 0.5, "got {d}");
        assert_eq!(distances.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_again_restarts_the_session() {
        let (mut session, feed) = session();
        assert!(session.run(|_| {}).await.is_err());

        feed.push(reading(25.0));
        let result = session.run(|_| {}).await.unwrap();
        assert_eq!(result.accuracy, 25.0);
        assert_eq!(session.readings().len(), 1);
        assert_eq!(feed.clear_count(), 2);

        session.cancel();
        session.cancel();
        assert_eq!(feed.clear_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_feed_settles_without_waiting() {
        let (mut session, feed) = session();
        feed.push(reading(150.0));
        feed.push(reading(95.0));
        drop(feed);

        let started = tokio::time::Instant::now();
        let result = session.run(|_| {}).await.unwrap();

        assert_eq!(result.accuracy, 95.0);
        assert!(started.elapsed() < AcquisitionConfig::default().max_duration);
    }

    #[tokio::test(start_paused = true)]
    async fn samples_after_the_deadline_are_ignored() {
        let (sensor, feed) = ChannelSensor::channel();
        feed.push(reading(20.0));
        let config = AcquisitionConfig {
            max_duration: Duration::ZERO,
            ..Default::default()
        };

        let mut updates = 0;
        let err = acquire_location(sensor, config, |_| updates += 1)
            .await
            .unwrap_err();

        assert_eq!(err, LocationError::NoReadingObtained);
        assert_eq!(updates, 0);
        assert_eq!(feed.clear_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_samples_picks_first_reliable() {
        let samples = [reading(300.0), reading(120.0), reading(45.0), reading(10.0)];
        let result = settle_samples(&samples, AcquisitionConfig::default()).await.unwrap();
        assert_eq!(result.accuracy, 45.0);
        assert!(result.is_reliable);

        let err = settle_samples(&[], AcquisitionConfig::default()).await.unwrap_err();
        assert_eq!(err, LocationError::NoReadingObtained);
    }
}
