use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{ConnectionId, PacketReader, PacketWriter};

/// A freshly accepted connection, split into its two halves.
///
/// The reader is meant to be moved into the task that decodes incoming
/// messages; the writer is cloned into whoever needs to send.
pub struct Connection {
    /// Transport-assigned id, used for logging.
    pub id: ConnectionId,
    /// Remote address, if the underlying stream has one.
    pub peer: Option<SocketAddr>,
    /// Inbound half.
    pub reader: PacketReader,
    /// Outbound half.
    pub writer: PacketWriter,
}

impl Connection {
    /// Wraps any bidirectional stream as a connection.
    ///
    /// Used by [`TcpTransport`](crate::TcpTransport) for its sockets and
    /// by tests with in-memory `tokio::io::duplex` pipes.
    pub fn from_stream<S>(id: ConnectionId, stream: S, write_timeout: Duration) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Sync + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            id,
            peer: None,
            reader: PacketReader::new(read_half),
            writer: PacketWriter::new(id, write_half, write_timeout),
        }
    }

    /// Installs the stream cipher on both halves at once.
    ///
    /// Everything read or written after this call goes through
    /// AES-128/CFB8 keyed by `secret`.
    pub async fn enable_encryption(
        &mut self,
        secret: &[u8],
    ) -> Result<(), crate::TransportError> {
        self.reader.enable_encryption(secret)?;
        self.writer.enable_encryption(secret).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("encrypted", &self.reader.is_encrypted())
            .finish()
    }
}
