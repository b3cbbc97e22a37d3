use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::cipher::{self, Encryptor};
use crate::{ConnectionId, TransportError};

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

struct WriterState {
    stream: BoxedWrite,
    cipher: Option<Encryptor>,
    scratch: Vec<u8>,
    closed: bool,
}

/// Outbound half of a connection.
///
/// Cloning is cheap; all clones share the same stream. Each [`send`] is
/// written as one contiguous run of bytes under an internal lock, so
/// messages from concurrent senders never interleave and the cipher
/// state advances in wire order.
///
/// A write that fails or exceeds the timeout marks the writer closed.
/// With encryption on, a partial write would leave the cipher out of
/// step with the peer, so the connection cannot be reused anyway.
///
/// [`send`]: PacketWriter::send
#[derive(Clone)]
pub struct PacketWriter {
    id: ConnectionId,
    state: Arc<Mutex<WriterState>>,
    write_timeout: Duration,
}

impl PacketWriter {
    /// Wraps a raw byte sink.
    pub fn new<W>(id: ConnectionId, stream: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            state: Arc::new(Mutex::new(WriterState {
                stream: Box::new(stream),
                cipher: None,
                scratch: Vec::new(),
                closed: false,
            })),
            write_timeout,
        }
    }

    /// Returns the id of the connection this writer belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Writes `data` in full, encrypting it first if the cipher is on.
    ///
    /// # Errors
    /// - [`TransportError::ConnectionClosed`] if an earlier write failed
    ///   or [`close`](PacketWriter::close) was called.
    /// - [`TransportError::SendFailed`] on an I/O error.
    /// - [`TransportError::Timeout`] if the write took too long.
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }

        let result = {
            let WriterState {
                stream,
                cipher,
                scratch,
                ..
            } = &mut *state;
            let payload: &[u8] = match cipher.as_mut() {
                Some(cipher) => {
                    scratch.clear();
                    scratch.extend_from_slice(data);
                    cipher::encrypt_in_place(cipher, scratch);
                    scratch
                }
                None => data,
            };
            tokio::time::timeout(self.write_timeout, write_flush(stream, payload)).await
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                state.closed = true;
                Err(TransportError::SendFailed(e))
            }
            Err(_) => {
                state.closed = true;
                tracing::warn!(id = %self.id, timeout = ?self.write_timeout, "write timed out");
                Err(TransportError::Timeout(self.write_timeout))
            }
        }
    }

    /// Encrypts every byte written from now on with AES-128/CFB8.
    pub async fn enable_encryption(&self, secret: &[u8]) -> Result<(), TransportError> {
        let cipher = cipher::encryptor(secret)?;
        self.state.lock().await.cipher = Some(cipher);
        Ok(())
    }

    /// Returns `true` once the writer refuses further sends.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Shuts the stream down. Later sends fail with
    /// [`TransportError::ConnectionClosed`]. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state
            .stream
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}

async fn write_flush(stream: &mut BoxedWrite, payload: &[u8]) -> io::Result<()> {
    stream.write_all(payload).await?;
    stream.flush().await
}

impl std::fmt::Debug for PacketWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketWriter")
            .field("id", &self.id)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{decrypt_in_place, decryptor};
    use tokio::io::AsyncReadExt;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_send_plaintext_reaches_peer() {
        let (client, mut server) = tokio::io::duplex(64);
        let writer = PacketWriter::new(ConnectionId::new(1), client, TIMEOUT);

        writer.send(&[0xFF, 0x00, 0x00]).await.unwrap();
        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xFF, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_send_encrypted_round_trips_through_decryptor() {
        let secret = [3u8; 16];
        let (client, mut server) = tokio::io::duplex(64);
        let writer = PacketWriter::new(ConnectionId::new(1), client, TIMEOUT);
        writer.enable_encryption(&secret).await.unwrap();

        writer.send(b"abc").await.unwrap();
        writer.send(b"def").await.unwrap();

        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_ne!(&buf, b"abcdef");
        decrypt_in_place(&mut decryptor(&secret).unwrap(), &mut buf);
        assert_eq!(&buf, b"abcdef");
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let writer = PacketWriter::new(ConnectionId::new(9), client, TIMEOUT);
        writer.close().await.unwrap();
        writer.close().await.unwrap();

        let err = writer.send(&[1]).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
        assert!(writer.is_closed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_times_out_when_peer_stops_reading() {
        // A 4-byte pipe that nobody drains fills up on the first write.
        let (client, _server) = tokio::io::duplex(4);
        let writer = PacketWriter::new(ConnectionId::new(2), client, Duration::from_millis(100));

        let err = writer.send(&[0u8; 64]).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(matches!(
            writer.send(&[0]).await.unwrap_err(),
            TransportError::ConnectionClosed(_)
        ));
    }
}
