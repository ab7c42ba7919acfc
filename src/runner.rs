//! Host-side driver for an [`AdvertisementPublisher`].
//!
//! Ticks the publisher from a tokio task. The publisher sits behind a mutex
//! so a tick from the background loop and a manual [`PublisherRunner::tick_now`]
//! never overlap.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ble::radio::RadioSink;
use crate::bthome::AdvertisementPayload;
use crate::error::Result;
use crate::publisher::{AdvertisementPublisher, TickOutcome};
use crate::sensor::SensorSource;

/// Default time between polls of the publisher.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Event emitted for every tick that did something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    /// A cycle completed and `payload` is on air.
    Published {
        /// Whether this was the first start or a refresh.
        outcome: TickOutcome,
        /// The new payload.
        payload: AdvertisementPayload,
    },
    /// A cycle failed; the previous advertisement is left standing.
    Failed {
        /// Description of the failure.
        error: String,
    },
}

/// Drives an [`AdvertisementPublisher`] from a background tokio task.
pub struct PublisherRunner<S, R> {
    /// The publisher, shared with the background task.
    publisher: Arc<Mutex<AdvertisementPublisher<S, R>>>,
    /// How often the background task polls the publisher.
    poll_interval: Duration,
    /// Publish event channel.
    event_tx: broadcast::Sender<PublishEvent>,
    /// Background task handle.
    background_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
    /// Running flag.
    is_running: Arc<AtomicBool>,
}

impl<S, R> PublisherRunner<S, R>
where
    S: SensorSource + Send + 'static,
    R: RadioSink + Send + 'static,
{
    /// Wrap a publisher. Nothing runs until [`start`](Self::start).
    pub fn new(publisher: AdvertisementPublisher<S, R>) -> Self {
        let (event_tx, _) = broadcast::channel(32);

        Self {
            publisher: Arc::new(Mutex::new(publisher)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_tx,
            background_handle: RwLock::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Poll the publisher every `poll_interval` instead of the default 50 ms.
    ///
    /// The publisher only runs a cycle once its own interval has elapsed, so
    /// this bounds how late a cycle can start, not how often one runs.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Start ticking the publisher in the background.
    ///
    /// The first cycle runs immediately.
    pub fn start(&self) -> Result<()> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            debug!("Publisher already running");
            return Ok(());
        }

        info!(
            "Starting publisher for {}",
            self.publisher.lock().config().device_name
        );

        let publisher = self.publisher.clone();
        let event_tx = self.event_tx.clone();
        let is_running = self.is_running.clone();
        let poll_interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while is_running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }
                let _ = Self::run_tick(&publisher, &event_tx, Instant::now());
            }

            debug!("Publisher background task ended");
        });

        *self.background_handle.write() = Some(handle);

        Ok(())
    }

    /// Stop the background loop and wait for it to finish.
    ///
    /// The last advertisement stays on air; the radio is not touched.
    pub async fn stop(&self) -> Result<()> {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Stopping publisher");

        let handle = self.background_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        Ok(())
    }

    /// Tick the publisher once, right now, on the caller's thread.
    pub fn tick_now(&self) -> Result<TickOutcome> {
        Self::run_tick(&self.publisher, &self.event_tx, Instant::now())
    }

    /// Check if the background loop is running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Subscribe to publish events.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishEvent> {
        self.event_tx.subscribe()
    }

    /// Run `f` with exclusive access to the publisher.
    pub fn with_publisher<T>(&self, f: impl FnOnce(&mut AdvertisementPublisher<S, R>) -> T) -> T {
        f(&mut self.publisher.lock())
    }

    fn run_tick(
        publisher: &Mutex<AdvertisementPublisher<S, R>>,
        event_tx: &broadcast::Sender<PublishEvent>,
        now: Instant,
    ) -> Result<TickOutcome> {
        let mut publisher = publisher.lock();

        match publisher.tick(now) {
            Ok(TickOutcome::NotDue) => Ok(TickOutcome::NotDue),
            Ok(outcome) => {
                if let Some(payload) = publisher.current_payload() {
                    let _ = event_tx.send(PublishEvent::Published {
                        outcome,
                        payload: payload.clone(),
                    });
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!("Publish cycle failed: {}", e);
                let _ = event_tx.send(PublishEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

impl<S, R> Drop for PublisherRunner<S, R> {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}
