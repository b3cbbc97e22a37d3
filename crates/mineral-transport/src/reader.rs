use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, BufReader, ReadBuf};

use crate::TransportError;
use crate::cipher::{self, Decryptor};

type BoxedRead = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Inbound half of a connection.
///
/// Buffers the raw stream and, once [`enable_encryption`] has been
/// called, decrypts bytes as they are handed to the caller. The cipher
/// sits above the buffer, so bytes that were already buffered when the
/// cipher is switched on are still decrypted correctly.
///
/// [`enable_encryption`]: PacketReader::enable_encryption
pub struct PacketReader {
    inner: BufReader<BoxedRead>,
    cipher: Option<Decryptor>,
}

impl PacketReader {
    /// Wraps a raw byte stream.
    pub fn new<R>(inner: R) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        Self {
            inner: BufReader::new(Box::new(inner)),
            cipher: None,
        }
    }

    /// Decrypts every byte read from now on with AES-128/CFB8.
    pub fn enable_encryption(&mut self, secret: &[u8]) -> Result<(), TransportError> {
        self.cipher = Some(cipher::decryptor(secret)?);
        Ok(())
    }

    /// Returns `true` once the stream cipher has been installed.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }
}

impl AsyncRead for PacketReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if let Some(cipher) = this.cipher.as_mut() {
            cipher::decrypt_in_place(cipher, &mut buf.filled_mut()[before..]);
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{encrypt_in_place, encryptor};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_reader_plaintext_passthrough() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = PacketReader::new(server);

        client.write_all(&[0xFE, 0x01]).await.unwrap();
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xFE, 0x01]);
        assert!(!reader.is_encrypted());
    }

    #[tokio::test]
    async fn test_reader_decrypts_bytes_buffered_before_switch() {
        let secret = [7u8; 16];
        let (mut client, server) = tokio::io::duplex(256);
        let mut reader = PacketReader::new(server);

        // One plaintext byte followed immediately by ciphertext, delivered
        // in a single write so the reader buffers both.
        let mut tail = b"secret".to_vec();
        encrypt_in_place(&mut encryptor(&secret).unwrap(), &mut tail);
        let mut wire = vec![0xAA];
        wire.extend_from_slice(&tail);
        client.write_all(&wire).await.unwrap();

        assert_eq!(reader.read_u8().await.unwrap(), 0xAA);
        reader.enable_encryption(&secret).unwrap();

        let mut out = [0u8; 6];
        reader.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"secret");
    }
}
