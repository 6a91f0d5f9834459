//! One bridging session: sensor subscriptions plus a single connection.
//!
//! [`Session::start`] subscribes to the sensor feeds and issues the one-shot
//! connect on a background task. [`Session::shutdown`] closes the connection
//! and releases the feeds exactly once; dropping the session does the same on
//! a best-effort basis.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::connection::{Connection, ConnectionManager, ConnectionState, PeerHandle};
use crate::error::SensorUnavailable;
use crate::source::{SensorHost, SensorSource};
use crate::status::SharedStatusSink;
use crate::writer::{SharedConnection, Uplink, WriterStats};

pub struct Session {
    connection: SharedConnection,
    uplink: Arc<Uplink>,
    source: Mutex<SensorSource>,
    sensors: Result<(), SensorUnavailable>,
    connect_task: Mutex<Option<JoinHandle<()>>>,
    status: SharedStatusSink,
    shut_down: AtomicBool,
}

impl Session {
    /// Subscribe to the sensors and start connecting.
    ///
    /// A missing sensor does not stop the session: it is reported, the
    /// connection is still attempted, and [`sensor_status`](Self::sensor_status)
    /// returns the failure. Must be called from within a tokio runtime.
    pub fn start(
        config: &SessionConfig,
        manager: ConnectionManager,
        host: Arc<dyn SensorHost>,
        status: SharedStatusSink,
    ) -> Self {
        status.report("Initializing sensors...");

        let connection: SharedConnection = Arc::new(tokio::sync::Mutex::new(Connection::absent()));
        let uplink = Arc::new(Uplink::new(connection.clone(), status.clone()));

        let mut source = SensorSource::new(host, status.clone())
            .with_rate(config.sampling_rate)
            .with_capacity(config.feed_capacity);
        let sensors = source.subscribe(uplink.clone());
        if let Err(e) = &sensors {
            warn!(error = %e, "Continuing without sensor feeds");
        }

        // Nothing else holds the lock yet.
        if let Ok(mut conn) = connection.try_lock() {
            conn.begin_connect();
        }
        status.report("Starting Bluetooth connection...");

        let connect_task = tokio::spawn(run_connect(
            manager,
            config.clone(),
            connection.clone(),
            status.clone(),
        ));

        Self {
            connection,
            uplink,
            source: Mutex::new(source),
            sensors,
            connect_task: Mutex::new(Some(connect_task)),
            status,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Outcome of the sensor subscription.
    pub fn sensor_status(&self) -> Result<(), SensorUnavailable> {
        self.sensors
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.lock().await.state()
    }

    /// Peer of the connection, once it has opened.
    pub async fn peer(&self) -> Option<PeerHandle> {
        self.connection.lock().await.peer().cloned()
    }

    pub fn stats(&self) -> WriterStats {
        self.uplink.stats()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Wait until the connect attempt has finished, whatever its outcome.
    ///
    /// Returns immediately when called a second time.
    pub async fn wait_for_connect(&self) {
        let task = self
            .connect_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Connect task did not complete");
            }
        }
    }

    /// Close the connection and release the sensor feeds. Idempotent.
    ///
    /// The connection is closed under its lock, so a write in progress
    /// finishes first and no partial frame is left behind.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.status.report("Cleaning up...");

        let closed = self.connection.lock().await.close().await;
        debug!(closed, "Connection released");

        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsubscribe();

        let stats = self.stats();
        info!(
            written = stats.written,
            dropped = stats.dropped,
            failed = stats.failed,
            success_rate = format!("{:.1}%", stats.success_rate()),
            "Session stopped"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.status.report("Cleaning up...");

        // Forwarders keep running until the connection is closed, so a frame
        // being written is finished rather than cut off.
        let forwarders = self
            .source
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .stop_feeds();

        match self.connection.try_lock() {
            Ok(mut conn) => {
                conn.close_now();
                forwarders.iter().for_each(JoinHandle::abort);
            }
            Err(_) => match tokio::runtime::Handle::try_current() {
                // A write or the connect task holds the lock; close once it is released.
                Ok(handle) => {
                    let connection = self.connection.clone();
                    handle.spawn(async move {
                        connection.lock().await.close().await;
                        forwarders.iter().for_each(JoinHandle::abort);
                    });
                }
                Err(_) => forwarders.iter().for_each(JoinHandle::abort),
            },
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("sensors", &self.sensors)
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

async fn run_connect(
    manager: ConnectionManager,
    config: SessionConfig,
    connection: SharedConnection,
    status: SharedStatusSink,
) {
    let result = manager.connect(&config.selector()).await;

    let mut conn = connection.lock().await;
    match result {
        Ok(established) => {
            let peer = established
                .peer()
                .map(|p| p.name.clone())
                .unwrap_or_default();
            match conn.complete(established) {
                Ok(()) => {
                    info!(peer = %peer, "Connected");
                    status.report(&format!("Connected to: {}", peer));
                }
                Err(mut late) => {
                    debug!(peer = %peer, state = %conn.state(), "Discarding late connection");
                    late.close().await;
                }
            }
        }
        Err(e) => {
            conn.fail();
            warn!(error = %e, "Connect failed");
            status.report(&e.to_string());
        }
    }
}
