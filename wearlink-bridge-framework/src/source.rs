//! Sensor subscriptions.
//!
//! A [`SensorSource`] registers the heart-rate and accelerometer feeds of a
//! [`SensorHost`] and forwards every reading to a [`ReadingSink`]. Each feed
//! gets its own channel and forwarding task, so readings of one feed reach
//! the sink in capture order while the two feeds run independently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use wearlink_common::{Reading, SensorKind};

use crate::error::SensorUnavailable;
use crate::status::SharedStatusSink;

/// Receives readings from the sensor feeds.
///
/// Called from one task per feed, concurrently across feeds.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn on_reading(&self, reading: Reading);
}

/// Requested delivery rate of a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingRate {
    /// 200 ms between events.
    #[default]
    Normal,
    /// 60 ms between events.
    Ui,
    /// 20 ms between events.
    Game,
    /// As fast as the hardware delivers.
    Fastest,
}

impl SamplingRate {
    /// Nominal period between events. `Duration::ZERO` for `Fastest`.
    pub fn period(&self) -> Duration {
        match self {
            SamplingRate::Normal => Duration::from_millis(200),
            SamplingRate::Ui => Duration::from_millis(60),
            SamplingRate::Game => Duration::from_millis(20),
            SamplingRate::Fastest => Duration::ZERO,
        }
    }
}

/// Provides sensor feeds.
pub trait SensorHost: Send + Sync {
    /// Whether the host has a sensor of this kind.
    fn has_sensor(&self, kind: SensorKind) -> bool;

    /// Start pushing readings of `kind` into `tx`.
    ///
    /// Delivery continues until the returned handle is stopped or `tx` is
    /// closed. Hosts should not block on a full channel.
    fn start_feed(
        &self,
        kind: SensorKind,
        rate: SamplingRate,
        tx: mpsc::Sender<Reading>,
    ) -> FeedHandle;
}

/// A registered feed. Stopping it (or dropping it) ends delivery.
pub struct FeedHandle {
    kind: SensorKind,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl FeedHandle {
    /// A feed stopped by calling `stop`.
    pub fn new(kind: SensorKind, stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            kind,
            stop: Some(Box::new(stop)),
        }
    }

    /// A feed driven by a tokio task; stopping aborts the task.
    pub fn from_task(kind: SensorKind, task: JoinHandle<()>) -> Self {
        Self::new(kind, move || task.abort())
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Stop delivery. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
            debug!(kind = %self.kind, "Feed stopped");
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle")
            .field("kind", &self.kind)
            .field("stopped", &self.stop.is_none())
            .finish()
    }
}

/// Default capacity of each feed channel.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Subscribes to both sensor feeds, both-or-none.
pub struct SensorSource {
    host: Arc<dyn SensorHost>,
    status: SharedStatusSink,
    rate: SamplingRate,
    capacity: usize,
    feeds: Vec<FeedHandle>,
    forwarders: Vec<JoinHandle<()>>,
}

impl SensorSource {
    pub fn new(host: Arc<dyn SensorHost>, status: SharedStatusSink) -> Self {
        Self {
            host,
            status,
            rate: SamplingRate::default(),
            capacity: DEFAULT_FEED_CAPACITY,
            feeds: Vec::new(),
            forwarders: Vec::new(),
        }
    }

    pub fn with_rate(mut self, rate: SamplingRate) -> Self {
        self.rate = rate;
        self
    }

    /// Set the per-feed channel capacity (at least 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Kinds of the feeds currently registered.
    pub fn active_feeds(&self) -> Vec<SensorKind> {
        self.feeds.iter().map(FeedHandle::kind).collect()
    }

    pub fn is_subscribed(&self) -> bool {
        !self.feeds.is_empty()
    }

    /// Register both feeds and forward their readings to `sink`.
    ///
    /// If either sensor is missing nothing is registered, the failure is
    /// reported on the status sink and returned. Must be called from within a
    /// tokio runtime. Subscribing an already subscribed source does nothing.
    pub fn subscribe(&mut self, sink: Arc<dyn ReadingSink>) -> Result<(), SensorUnavailable> {
        if self.is_subscribed() {
            return Ok(());
        }

        if let Some(missing) = SensorKind::ALL
            .into_iter()
            .find(|kind| !self.host.has_sensor(*kind))
        {
            let err = SensorUnavailable::from(missing);
            self.status.report(&err.to_string());
            return Err(err);
        }

        for kind in SensorKind::ALL {
            let (tx, mut rx) = mpsc::channel(self.capacity);
            self.feeds.push(self.host.start_feed(kind, self.rate, tx));

            let sink = sink.clone();
            self.forwarders.push(tokio::spawn(async move {
                while let Some(reading) = rx.recv().await {
                    sink.on_reading(reading).await;
                }
                debug!(kind = %kind, "Feed ended");
            }));
        }

        info!(rate = ?self.rate, capacity = self.capacity, "Sensor feeds registered");
        self.status.report("Sensors initialized successfully");
        Ok(())
    }

    /// Stop both feeds. Idempotent, and safe if `subscribe` never succeeded.
    pub fn unsubscribe(&mut self) {
        for forwarder in self.stop_feeds() {
            forwarder.abort();
        }
    }

    /// Stop both feeds and hand back the forwarding tasks still running.
    ///
    /// A forwarder may be in the middle of a delivery; the caller decides
    /// when to abort it.
    pub fn stop_feeds(&mut self) -> Vec<JoinHandle<()>> {
        for mut feed in self.feeds.drain(..) {
            feed.stop();
        }
        std::mem::take(&mut self.forwarders)
    }
}

impl Drop for SensorSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
