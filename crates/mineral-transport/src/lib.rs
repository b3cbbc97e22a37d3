//! Transport layer for Mineral.
//!
//! The wire protocol is a raw byte stream, not a sequence of framed
//! messages, so this crate hands out the two halves of a connection
//! separately:
//!
//! - [`PacketReader`]: owned by the connection's handler task, read
//!   one field at a time by the protocol decoder.
//! - [`PacketWriter`]: cheaply cloneable, shared with every task that
//!   broadcasts to this connection. Writes are serialized internally and
//!   bounded by a per-write timeout.
//!
//! Both halves can be upgraded in place to the AES-128/CFB8 stream
//! cipher negotiated during the encryption handshake (see [`cipher`]).

#![allow(async_fn_in_trait)]

pub mod cipher;
mod connection;
mod error;
mod reader;
mod tcp;
mod writer;

pub use connection::Connection;
pub use error::TransportError;
pub use reader::PacketReader;
pub use tcp::TcpTransport;
pub use writer::PacketWriter;

use std::fmt;

/// Opaque identifier for a connection.
///
/// Issued by the transport that accepted the connection; unrelated to
/// the entity ids a session is given later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Connection, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
        assert_ne!(ConnectionId::new(1), ConnectionId::new(2));
    }
}
