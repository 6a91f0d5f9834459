//! Transports that open a duplex stream to a configured peer.

use std::io;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info};
use uuid::Uuid;
use wearlink_bridge_framework::{AdapterState, BoxedStream, PeerHandle, Transport};

use crate::adapter::SysfsAdapter;
use crate::config::TransportConfig;

/// Serial link over an RFCOMM TTY.
///
/// The TTY is already bound to the peer's service channel, so `open` only
/// opens the device file.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    adapter: SysfsAdapter,
    baud_rate: u32,
}

impl SerialTransport {
    pub fn new(adapter: SysfsAdapter, baud_rate: u32) -> Self {
        Self { adapter, baud_rate }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn adapter_state(&self) -> AdapterState {
        self.adapter.probe()
    }

    async fn open(&self, peer: &PeerHandle, service: Uuid) -> io::Result<BoxedStream> {
        debug!(
            device = %peer.address,
            service = %service,
            baud_rate = self.baud_rate,
            "Opening RFCOMM device"
        );

        let builder = tokio_serial::new(peer.address.as_str(), self.baud_rate);
        let serial = tokio_serial::SerialStream::open(&builder).map_err(io::Error::from)?;

        info!(device = %peer.address, "RFCOMM device open");
        Ok(Box::new(serial))
    }
}

/// Plain TCP; the adapter is always ready.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    fn adapter_state(&self) -> AdapterState {
        AdapterState::Ready
    }

    async fn open(&self, peer: &PeerHandle, service: Uuid) -> io::Result<BoxedStream> {
        debug!(address = %peer.address, service = %service, "Opening TCP stream");

        let stream = TcpStream::connect(peer.address.as_str()).await?;
        stream.set_nodelay(true)?;

        info!(address = %peer.address, local = ?stream.local_addr().ok(), "TCP stream open");
        Ok(Box::new(stream))
    }
}

/// The transport selected by configuration.
#[derive(Debug, Clone)]
pub enum RfcommTransport {
    Serial(SerialTransport),
    Tcp(TcpTransport),
}

impl From<&TransportConfig> for RfcommTransport {
    fn from(config: &TransportConfig) -> Self {
        match config {
            TransportConfig::Serial {
                baud_rate,
                hci,
                sysfs_root,
            } => RfcommTransport::Serial(SerialTransport::new(
                SysfsAdapter::new(sysfs_root.clone(), hci.clone()),
                *baud_rate,
            )),
            TransportConfig::Tcp => RfcommTransport::Tcp(TcpTransport),
        }
    }
}

#[async_trait]
impl Transport for RfcommTransport {
    fn adapter_state(&self) -> AdapterState {
        match self {
            RfcommTransport::Serial(t) => t.adapter_state(),
            RfcommTransport::Tcp(t) => t.adapter_state(),
        }
    }

    async fn open(&self, peer: &PeerHandle, service: Uuid) -> io::Result<BoxedStream> {
        match self {
            RfcommTransport::Serial(t) => t.open(peer, service).await,
            RfcommTransport::Tcp(t) => t.open(peer, service).await,
        }
    }
}
