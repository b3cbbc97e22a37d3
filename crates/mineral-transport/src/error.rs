use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// Every variant is treated as "this connection is gone" by the layers
/// above; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was already closed when a write was attempted.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A write did not complete within the configured timeout.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// The shared secret has the wrong length for AES-128.
    #[error("invalid shared secret length: {0} bytes (expected 16)")]
    InvalidKey(usize),
}
