//! Frame writing onto the session's connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{trace, warn};

use wearlink_common::{Frame, Reading, Timestamp, current_timestamp_millis, encode};

use crate::connection::Connection;
use crate::error::WriteError;
use crate::source::ReadingSink;
use crate::status::SharedStatusSink;

/// Connection cell shared by the connect task, the writers and teardown.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Writes frames onto an open connection.
///
/// Exclusive access comes from the `&mut Connection`: callers sharing a
/// connection hold its mutex for the whole write.
pub struct StreamWriter;

impl StreamWriter {
    /// Write the whole frame and flush.
    ///
    /// On `WriteError::Io` part of the frame may already be on the wire; the
    /// caller must close the connection rather than retry.
    pub async fn write(conn: &mut Connection, frame: &Frame) -> Result<(), WriteError> {
        let stream = conn.stream_mut().ok_or(WriteError::NotOpen)?;
        stream
            .write_all(frame.as_bytes())
            .await
            .map_err(WriteError::Io)?;
        stream.flush().await.map_err(WriteError::Io)?;
        Ok(())
    }
}

/// Counters of the write path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterStats {
    /// Frames fully written and flushed.
    pub written: u64,
    /// Readings dropped because the connection was not open.
    pub dropped: u64,
    /// Writes that failed and closed the connection.
    pub failed: u64,
}

impl WriterStats {
    /// Total number of write attempts.
    pub fn attempts(&self) -> u64 {
        self.written + self.failed
    }

    /// Success rate of write attempts as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.attempts() == 0 {
            100.0
        } else {
            (self.written as f64 / self.attempts() as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// The reading sink of a session: encodes each reading and writes it, or
/// drops it when the connection is not open.
pub struct Uplink {
    connection: SharedConnection,
    status: SharedStatusSink,
    counters: Counters,
    clock: fn() -> Timestamp,
}

impl Uplink {
    pub fn new(connection: SharedConnection, status: SharedStatusSink) -> Self {
        Self {
            connection,
            status,
            counters: Counters::default(),
            clock: current_timestamp_millis,
        }
    }

    /// Replace the clock used to stamp frames.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            written: self.counters.written.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Deliver one reading.
    ///
    /// The frame is stamped under the connection lock, right before the write.
    pub async fn deliver(&self, reading: Reading) {
        let mut conn = self.connection.lock().await;

        if !conn.is_open() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(kind = %reading.kind(), state = %conn.state(), "Dropping reading");
            return;
        }

        let frame = encode(&reading, (self.clock)());
        match StreamWriter::write(&mut conn, &frame).await {
            Ok(()) => {
                self.counters.written.fetch_add(1, Ordering::Relaxed);
                trace!(frame = %frame, "Frame written");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Write failed, closing connection");
                conn.close().await;
                self.status.report(&e.to_string());
            }
        }
    }
}

#[async_trait]
impl ReadingSink for Uplink {
    async fn on_reading(&self, reading: Reading) {
        self.deliver(reading).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionState, PeerHandle};
    use crate::status::ChannelStatusSink;
    use std::io;
    use tokio::io::AsyncReadExt;

    fn fixed_clock() -> Timestamp {
        1_699_999_999_000
    }

    fn peer() -> PeerHandle {
        PeerHandle::new("receiver", "tcp://127.0.0.1:5555")
    }

    #[test]
    fn test_writer_stats() {
        let mut stats = WriterStats::default();
        assert_eq!(stats.attempts(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.written = 9;
        stats.failed = 1;
        stats.dropped = 40;
        assert_eq!(stats.attempts(), 10);
        assert_eq!(stats.success_rate(), 90.0);
    }

    #[tokio::test]
    async fn test_write_full_frame() {
        let frame = encode(&Reading::heart_rate(72.0), fixed_clock());
        let mock = tokio_test::io::Builder::new()
            .write(b"HR:72.0;1699999999000\n")
            .build();
        let mut conn = Connection::open(peer(), Box::new(mock));

        StreamWriter::write(&mut conn, &frame).await.unwrap();
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_write_not_open() {
        let frame = encode(&Reading::heart_rate(72.0), 0);
        let mut conn = Connection::absent();

        let err = StreamWriter::write(&mut conn, &frame).await.unwrap_err();
        assert!(matches!(err, WriteError::NotOpen));
    }

    #[tokio::test]
    async fn test_write_error_is_io() {
        let frame = encode(&Reading::acceleration(0.0, 0.0, 9.81), 0);
        let mock = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            .build();
        let mut conn = Connection::open(peer(), Box::new(mock));

        let err = StreamWriter::write(&mut conn, &frame).await.unwrap_err();
        assert!(matches!(err, WriteError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn test_uplink_drops_when_not_open() {
        let (sink, mut rx) = ChannelStatusSink::new();
        let connection = Arc::new(Mutex::new(Connection::absent()));
        let uplink = Uplink::new(connection, Arc::new(sink));

        uplink.deliver(Reading::heart_rate(60.0)).await;
        uplink.deliver(Reading::acceleration(0.0, 0.0, 9.8)).await;

        assert_eq!(
            uplink.stats(),
            WriterStats {
                written: 0,
                dropped: 2,
                failed: 0
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_uplink_writes_stamped_frames() {
        let (sink, _rx) = ChannelStatusSink::new();
        let (local, mut remote) = tokio::io::duplex(256);
        let connection = Arc::new(Mutex::new(Connection::open(peer(), Box::new(local))));
        let uplink = Uplink::new(connection, Arc::new(sink)).with_clock(fixed_clock);

        uplink.deliver(Reading::heart_rate(72.0)).await;
        uplink
            .deliver(Reading::acceleration(0.12, -9.81, 0.03))
            .await;

        let expected = "HR:72.0;1699999999000\nACC:0.12,-9.81,0.03;1699999999000\n";
        let mut buf = vec![0u8; expected.len()];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
        assert_eq!(uplink.stats().written, 2);
    }

    #[tokio::test]
    async fn test_uplink_closes_on_failure() {
        let (sink, mut rx) = ChannelStatusSink::new();
        let mock = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            .build();
        let connection = Arc::new(Mutex::new(Connection::open(peer(), Box::new(mock))));
        let uplink = Uplink::new(connection.clone(), Arc::new(sink));

        uplink.deliver(Reading::heart_rate(72.0)).await;
        uplink.deliver(Reading::heart_rate(73.0)).await;

        assert_eq!(connection.lock().await.state(), ConnectionState::Closed);
        assert_eq!(rx.try_recv().unwrap(), "Error sending data: peer gone");
        assert!(rx.try_recv().is_err());

        let stats = uplink.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.written, 0);
    }
}
