//! Outbound connection lifecycle.
//!
//! [`ConnectionManager::connect`] performs the one-shot connect: adapter
//! probe, permission check, peer selection, then a single handshake through
//! the [`Transport`]. The result is a [`Connection`], which walks the
//! `Absent → Connecting → Open → Closed` state machine and never leaves
//! `Closed`.

use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AdapterFault, ConnectError};
use crate::status::SharedStatusSink;

/// Service identifier shared with the receiving peer (Serial Port Profile).
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// An open, bidirectional byte stream to one peer.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Boxed duplex stream handed out by transports.
pub type BoxedStream = Box<dyn DuplexStream>;

/// A previously bonded peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerHandle {
    /// Human-readable name shown in status messages.
    pub name: String,
    /// Transport-specific address (device path, `host:port`, MAC).
    pub address: String,
}

impl PeerHandle {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Capabilities a bridge may need authorization for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Open connections to bonded peers.
    Connect,
    /// Enumerate nearby devices.
    Scan,
    /// Read body sensors.
    BodySensors,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Connect => "connect",
            Capability::Scan => "scan",
            Capability::BodySensors => "body_sensors",
        }
    }
}

/// Answers whether the process may use a capability.
pub trait PermissionAuthority: Send + Sync {
    fn is_authorized(&self, capability: Capability) -> bool;
}

/// Enumerates bonded peers. Order is collaborator-defined and may change
/// between calls.
pub trait PeerRegistry: Send + Sync {
    fn bonded_peers(&self) -> Vec<PeerHandle>;
}

/// State of the local radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Ready,
    Disabled,
    Missing,
}

/// Establishes duplex streams to peers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Probe the local adapter.
    fn adapter_state(&self) -> AdapterState;

    /// Perform one handshake with `peer` for the given service.
    ///
    /// Blocks for as long as the underlying transport takes; no timeout is
    /// imposed here.
    async fn open(&self, peer: &PeerHandle, service: Uuid) -> io::Result<BoxedStream>;
}

/// How to pick a peer among the bonded ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PeerSelector {
    /// First peer in enumeration order.
    #[default]
    First,
    /// First peer whose name or address equals the given string.
    Named(String),
}

impl PeerSelector {
    /// Pick a peer, or `None` if nothing matches.
    pub fn select<'a>(&self, peers: &'a [PeerHandle]) -> Option<&'a PeerHandle> {
        match self {
            PeerSelector::First => peers.first(),
            PeerSelector::Named(wanted) => peers
                .iter()
                .find(|p| &p.name == wanted || &p.address == wanted),
        }
    }
}

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Absent,
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Absent => "absent",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single outbound connection of a session.
///
/// Holds the stream only while `Open`. Every transition method is a no-op
/// when called from a state it does not apply to, so `Closed` stays terminal.
pub struct Connection {
    state: ConnectionState,
    stream: Option<BoxedStream>,
    peer: Option<PeerHandle>,
}

impl Connection {
    /// A connection that has not been attempted yet.
    pub fn absent() -> Self {
        Self {
            state: ConnectionState::Absent,
            stream: None,
            peer: None,
        }
    }

    /// A connection wrapping a stream that is already open.
    pub fn open(peer: PeerHandle, stream: BoxedStream) -> Self {
        Self {
            state: ConnectionState::Open,
            stream: Some(stream),
            peer: Some(peer),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// The peer this connection was opened to, if it ever opened.
    pub fn peer(&self) -> Option<&PeerHandle> {
        self.peer.as_ref()
    }

    /// `Absent → Connecting`. Returns false from any other state.
    pub fn begin_connect(&mut self) -> bool {
        if self.state == ConnectionState::Absent {
            self.state = ConnectionState::Connecting;
            true
        } else {
            false
        }
    }

    /// `Connecting → Open`, taking over the stream of `established`.
    ///
    /// If this connection is no longer connecting (it was torn down while the
    /// handshake ran), the stream is handed back so the caller can close it.
    pub fn complete(&mut self, established: Connection) -> Result<(), Connection> {
        if self.state != ConnectionState::Connecting || !established.is_open() {
            return Err(established);
        }
        self.state = ConnectionState::Open;
        self.stream = established.stream;
        self.peer = established.peer;
        Ok(())
    }

    /// `Connecting → Closed` after a failed handshake.
    pub fn fail(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Closed;
        }
    }

    /// Mutable access to the stream while open.
    pub(crate) fn stream_mut(&mut self) -> Option<&mut BoxedStream> {
        if self.is_open() {
            self.stream.as_mut()
        } else {
            None
        }
    }

    /// Close the connection.
    ///
    /// Never fails. Closing an already closed connection does nothing.
    /// Returns true if this call performed the transition.
    pub async fn close(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "Error shutting down stream");
            }
        }
        true
    }

    /// Close without flushing or shutting the stream down.
    ///
    /// Used where no async context is available; dropping the stream
    /// releases the underlying handle.
    pub fn close_now(&mut self) {
        self.state = ConnectionState::Closed;
        self.stream = None;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("peer", &self.peer)
            .finish()
    }
}

/// Performs the one-shot connect of a session.
pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    registry: Box<dyn PeerRegistry>,
    authority: Box<dyn PermissionAuthority>,
    status: SharedStatusSink,
}

impl ConnectionManager {
    pub fn new(
        transport: impl Transport + 'static,
        registry: impl PeerRegistry + 'static,
        authority: impl PermissionAuthority + 'static,
        status: SharedStatusSink,
    ) -> Self {
        Self {
            transport: Box::new(transport),
            registry: Box::new(registry),
            authority: Box::new(authority),
            status,
        }
    }

    /// Connect once to a bonded peer.
    ///
    /// No retry is attempted. Progress is reported on the status sink; the
    /// outcome is left to the caller to report.
    pub async fn connect(&self, selector: &PeerSelector) -> Result<Connection, ConnectError> {
        match self.transport.adapter_state() {
            AdapterState::Ready => {}
            AdapterState::Disabled => {
                return Err(ConnectError::AdapterUnavailable(AdapterFault::Disabled));
            }
            AdapterState::Missing => {
                return Err(ConnectError::AdapterUnavailable(AdapterFault::Missing));
            }
        }

        if !self.authority.is_authorized(Capability::Connect) {
            warn!(capability = Capability::Connect.as_str(), "Permission denied");
            return Err(ConnectError::PermissionDenied);
        }

        let peers = self.registry.bonded_peers();
        if peers.is_empty() {
            return Err(ConnectError::NoPeers);
        }

        self.status.report(&format!("Found {} paired devices", peers.len()));
        for peer in &peers {
            debug!(name = %peer.name, address = %peer.address, "Paired device");
        }

        let peer = selector.select(&peers).ok_or(ConnectError::NoPeers)?.clone();

        self.status.report(&format!("Connecting to: {}", peer.name));
        info!(
            peer = %peer.name,
            address = %peer.address,
            service = %SERVICE_UUID,
            "Opening stream"
        );

        let stream = self
            .transport
            .open(&peer, SERVICE_UUID)
            .await
            .map_err(ConnectError::Io)?;

        Ok(Connection::open(peer, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ChannelStatusSink;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeTransport {
        state: AdapterState,
        fail: bool,
        opens: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn adapter_state(&self) -> AdapterState {
            self.state
        }

        async fn open(&self, _peer: &PeerHandle, service: Uuid) -> io::Result<BoxedStream> {
            assert_eq!(service, SERVICE_UUID);
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            let (local, _remote) = tokio::io::duplex(64);
            Ok(Box::new(local))
        }
    }

    struct Peers(Vec<PeerHandle>);

    impl PeerRegistry for Peers {
        fn bonded_peers(&self) -> Vec<PeerHandle> {
            self.0.clone()
        }
    }

    struct Allow(bool);

    impl PermissionAuthority for Allow {
        fn is_authorized(&self, _capability: Capability) -> bool {
            self.0
        }
    }

    fn build_manager(
        state: AdapterState,
        fail: bool,
        peers: Vec<PeerHandle>,
        allowed: bool,
    ) -> (
        ConnectionManager,
        Arc<AtomicUsize>,
        tokio::sync::mpsc::UnboundedReceiver<String>,
    ) {
        let opens = Arc::new(AtomicUsize::new(0));
        let (sink, rx) = ChannelStatusSink::new();
        let transport = FakeTransport {
            state,
            fail,
            opens: opens.clone(),
        };
        (
            ConnectionManager::new(transport, Peers(peers), Allow(allowed), Arc::new(sink)),
            opens,
            rx,
        )
    }

    fn watch() -> PeerHandle {
        PeerHandle::new("watch", "/dev/rfcomm0")
    }

    #[test]
    fn test_service_uuid() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_selector() {
        let peers = vec![
            PeerHandle::new("phone", "AA:BB"),
            PeerHandle::new("laptop", "CC:DD"),
        ];
        assert_eq!(PeerSelector::First.select(&peers).unwrap().name, "phone");
        assert_eq!(
            PeerSelector::Named("CC:DD".into())
                .select(&peers)
                .unwrap()
                .name,
            "laptop"
        );
        assert!(PeerSelector::Named("tablet".into()).select(&peers).is_none());
        assert!(PeerSelector::First.select(&[]).is_none());
    }

    #[tokio::test]
    async fn test_connect_success() {
        let (manager, opens, mut rx) =
            build_manager(AdapterState::Ready, false, vec![watch()], true);

        let conn = manager.connect(&PeerSelector::First).await.unwrap();
        assert!(conn.is_open());
        assert_eq!(conn.peer().unwrap().name, "watch");
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        assert_eq!(rx.try_recv().unwrap(), "Found 1 paired devices");
        assert_eq!(rx.try_recv().unwrap(), "Connecting to: watch");
    }

    #[tokio::test]
    async fn test_connect_no_peers() {
        let (manager, opens, mut rx) = build_manager(AdapterState::Ready, false, vec![], true);

        let err = manager.connect(&PeerSelector::First).await.unwrap_err();
        assert!(matches!(err, ConnectError::NoPeers));
        assert_eq!(opens.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_permission_denied_skips_handshake() {
        let (manager, opens, _rx) = build_manager(AdapterState::Ready, false, vec![watch()], false);

        let err = manager.connect(&PeerSelector::First).await.unwrap_err();
        assert!(matches!(err, ConnectError::PermissionDenied));
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connect_adapter_states() {
        let (manager, _, _rx) = build_manager(AdapterState::Missing, false, vec![watch()], true);
        assert!(matches!(
            manager.connect(&PeerSelector::First).await,
            Err(ConnectError::AdapterUnavailable(AdapterFault::Missing))
        ));

        let (manager, _, _rx) = build_manager(AdapterState::Disabled, false, vec![watch()], true);
        assert!(matches!(
            manager.connect(&PeerSelector::First).await,
            Err(ConnectError::AdapterUnavailable(AdapterFault::Disabled))
        ));
    }

    #[tokio::test]
    async fn test_connect_handshake_failure() {
        let (manager, opens, _rx) = build_manager(AdapterState::Ready, true, vec![watch()], true);

        let err = manager.connect(&PeerSelector::First).await.unwrap_err();
        assert!(matches!(err, ConnectError::Io(_)));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_state_machine() {
        let mut conn = Connection::absent();
        assert_eq!(conn.state(), ConnectionState::Absent);
        assert!(conn.begin_connect());
        assert!(!conn.begin_connect());

        let (local, _remote) = tokio::io::duplex(16);
        let established = Connection::open(watch(), Box::new(local));
        assert!(conn.complete(established).is_ok());
        assert!(conn.is_open());

        assert!(conn.close().await);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.close().await);
        assert!(!conn.begin_connect());
        assert!(conn.stream_mut().is_none());
    }

    #[tokio::test]
    async fn test_complete_after_close_hands_stream_back() {
        let mut conn = Connection::absent();
        conn.begin_connect();
        conn.close().await;

        let (local, _remote) = tokio::io::duplex(16);
        let late = Connection::open(watch(), Box::new(local));
        let mut rejected = conn.complete(late).unwrap_err();
        assert!(rejected.is_open());
        assert!(rejected.close().await);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_close_without_stream() {
        let mut conn = Connection::absent();
        assert!(conn.close().await);
        assert!(!conn.close().await);

        let mut failed = Connection::absent();
        failed.begin_connect();
        failed.fail();
        assert_eq!(failed.state(), ConnectionState::Closed);
        assert!(!failed.close().await);
    }
}
