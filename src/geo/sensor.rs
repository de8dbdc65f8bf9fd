//! The location sensor seam plus a channel-backed implementation that can be
//! fed from any transport (a websocket relay, a device bridge, tests).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::channel::{mpsc, oneshot};
use futures::future::{self, BoxFuture};
use futures::lock::Mutex;
use futures::stream::{self, BoxStream, StreamExt};

use super::LocationReading;

pub type WatchId = u64;

/// Error codes a platform sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timeout")]
    Timeout,
}

impl SensorError {
    /// Numeric codes as used by browser geolocation.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(SensorError::PermissionDenied),
            2 => Some(SensorError::PositionUnavailable),
            3 => Some(SensorError::Timeout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Option<Duration>,
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// Cheap first fix: coarse, may be cached.
    pub fn quick(timeout: Duration) -> Self {
        Self {
            high_accuracy: false,
            timeout: Some(timeout),
            maximum_age: Duration::from_secs(30),
        }
    }

    /// Fresh high-accuracy samples for the watch.
    pub fn precise() -> Self {
        Self {
            high_accuracy: true,
            timeout: None,
            maximum_age: Duration::ZERO,
        }
    }
}

pub type SensorResult = Result<LocationReading, SensorError>;

pub trait LocationSensor: Send {
    fn is_supported(&self) -> bool {
        true
    }

    /// One-shot position request.
    fn current_position(&mut self, options: PositionOptions) -> BoxFuture<'static, SensorResult>;

    /// Continuous subscription; the stream ends once the watch is cleared.
    fn watch_position(&mut self, options: PositionOptions) -> (WatchId, BoxStream<'static, SensorResult>);

    fn clear_watch(&mut self, id: WatchId);
}

#[derive(Default)]
struct FeedState {
    active_watch: AtomicU64,
    clears: AtomicUsize,
}

const NO_WATCH: u64 = 0;

/// A sensor whose readings are pushed through a [`SensorFeed`].
pub struct ChannelSensor {
    supported: bool,
    quick: Option<oneshot::Receiver<SensorResult>>,
    watch: Arc<Mutex<mpsc::UnboundedReceiver<SensorResult>>>,
    state: Arc<FeedState>,
    next_id: WatchId,
}

/// Producer side of a [`ChannelSensor`].
pub struct SensorFeed {
    quick: Option<oneshot::Sender<SensorResult>>,
    watch: mpsc::UnboundedSender<SensorResult>,
    state: Arc<FeedState>,
}

impl ChannelSensor {
    pub fn channel() -> (ChannelSensor, SensorFeed) {
        let (quick_tx, quick_rx) = oneshot::channel();
        let (watch_tx, watch_rx) = mpsc::unbounded();
        let state = Arc::new(FeedState::default());

        let sensor = ChannelSensor {
            supported: true,
            quick: Some(quick_rx),
            watch: Arc::new(Mutex::new(watch_rx)),
            state: state.clone(),
            next_id: 1,
        };
        let feed = SensorFeed {
            quick: Some(quick_tx),
            watch: watch_tx,
            state,
        };
        (sensor, feed)
    }

    /// A sensor for a device without location support.
    pub fn unsupported() -> (ChannelSensor, SensorFeed) {
        let (mut sensor, feed) = Self::channel();
        sensor.supported = false;
        (sensor, feed)
    }
}

impl LocationSensor for ChannelSensor {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn current_position(&mut self, options: PositionOptions) -> BoxFuture<'static, SensorResult> {
        let rx = self.quick.take();
        Box::pin(async move {
            // A quick fix is answered at most once; later requests stay silent.
            let Some(rx) = rx else {
                return future::pending().await;
            };
            // A dropped feed will never answer.
            let fix = async move { rx.await.unwrap_or(Err(SensorError::Timeout)) };
            match options.timeout {
                Some(limit) => tokio::time::timeout(limit, fix)
                    .await
                    .unwrap_or(Err(SensorError::Timeout)),
                None => fix.await,
            }
        })
    }

    fn watch_position(&mut self, _options: PositionOptions) -> (WatchId, BoxStream<'static, SensorResult>) {
        let id = self.next_id;
        self.next_id += 1;
        self.state.active_watch.store(id, Ordering::SeqCst);

        let state = self.state.clone();
        let rx = self.watch.clone();
        let readings = stream::unfold((rx, state), move |(rx, state)| async move {
            if state.active_watch.load(Ordering::SeqCst) != id {
                return None;
            }
            let next = rx.lock().await.next().await?;
            Some((next, (rx, state)))
        });

        (id, readings.boxed())
    }

    fn clear_watch(&mut self, id: WatchId) {
        let _ = self
            .state
            .active_watch
            .compare_exchange(id, NO_WATCH, Ordering::SeqCst, Ordering::SeqCst);
        self.state.clears.fetch_add(1, Ordering::SeqCst);
    }
}

impl SensorFeed {
    /// Answers the pending quick-fix request. Returns false if it was
    /// already answered or nobody is listening.
    pub fn quick_fix(&mut self, result: SensorResult) -> bool {
        match self.quick.take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn push(&self, reading: LocationReading) -> bool {
        self.watch.unbounded_send(Ok(reading)).is_ok()
    }

    pub fn fail(&self, error: SensorError) -> bool {
        self.watch.unbounded_send(Err(error)).is_ok()
    }

    pub fn is_watching(&self) -> bool {
        self.state.active_watch.load(Ordering::SeqCst) != NO_WATCH
    }

    /// How many times a watch has been cleared.
    pub fn clear_count(&self) -> usize {
        self.state.clears.load(Ordering::SeqCst)
    }
}
