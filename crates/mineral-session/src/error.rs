//! Error types for the session layer.

use mineral_protocol::{EntityId, ProtocolError};
use mineral_transport::TransportError;

/// Errors that can occur while managing sessions and entity ids.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session with this name is already registered.
    #[error("name already in use: {0}")]
    NameTaken(String),

    /// The registry already holds its maximum number of sessions.
    #[error("server is full ({0} players)")]
    Full(usize),

    /// The session has not completed its handshake, so it has no name
    /// and cannot be registered.
    #[error("session {0} has no name yet")]
    Unnamed(EntityId),

    /// The session was already given a name.
    #[error("session {0} is already named")]
    AlreadyNamed(EntityId),

    /// The free-id queue is at capacity. This means ids are being
    /// released that were never acquired, or released more than once.
    #[error("entity id free list is full ({capacity} entries)")]
    FreeListFull { capacity: usize },

    /// The id is already waiting in the free list.
    #[error("entity id {0} released twice")]
    AlreadyReleased(EntityId),

    /// The id is negative or was never handed out.
    #[error("entity id {0} was never allocated")]
    InvalidId(EntityId),

    /// The session server could not be asked, or gave an unusable answer.
    #[error("session verification failed: {0}")]
    VerifyFailed(String),

    /// Encoding a message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Writing to the session's connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
