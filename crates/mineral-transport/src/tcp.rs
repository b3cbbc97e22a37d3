//! TCP transport.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};

use crate::{Connection, ConnectionId, PacketReader, PacketWriter, Transport, TransportError};

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    next_id: AtomicU64,
    write_timeout: Duration,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    ///
    /// `write_timeout` bounds every write on connections this transport
    /// accepts.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        write_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "TCP transport listening");
        }
        Ok(Self {
            listener,
            next_id: AtomicU64::new(1),
            write_timeout,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

impl Transport for TcpTransport {
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Connection, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        Ok(Connection {
            id,
            peer: Some(peer),
            reader: PacketReader::new(read_half),
            writer: PacketWriter::new(id, write_half, self.write_timeout),
        })
    }
}
