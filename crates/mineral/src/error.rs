//! Error types for the Mineral server.

use mineral_protocol::{PacketId, ProtocolError};
use mineral_session::SessionError;
use mineral_transport::TransportError;

use crate::{ConfigError, KeyError};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `mineral` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates a `From` impl, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MineralError {
    /// Binding, accepting, reading, or writing a socket.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding a message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Registry or id allocation failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// RSA key generation or decryption.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Why a single connection was closed.
///
/// Every variant ends exactly one connection. None of them reach the tick
/// loop or any other connection's task.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The handshake named a different protocol version.
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    ProtocolVersionMismatch { expected: i8, got: i8 },

    /// A message body could not be decoded. The stream cannot be
    /// resynchronised after this.
    #[error("malformed message: {0}")]
    MalformedMessage(#[source] ProtocolError),

    /// The id byte names no message a client may send.
    #[error("unknown message id 0x{0:02X}")]
    UnknownMessageId(u8),

    /// A known message arrived in a state that does not accept it.
    #[error("unexpected {id} while {state}")]
    UnexpectedMessage { id: PacketId, state: &'static str },

    /// The echoed verification token did not match the one sent.
    #[error("verification token mismatch")]
    HandshakeTokenMismatch,

    /// The session server did not vouch for the player.
    #[error("session verification failed")]
    SessionVerificationFailed,

    /// The id allocator refused an id during cleanup.
    #[error("entity id bookkeeping failed: {0}")]
    IdentifierExhaustion(#[source] SessionError),

    /// The socket failed or went idle. Always a plain disconnect.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Login refused for a reason the player should see.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ConnectionError {
    /// Shown to players whose online-mode verification fails.
    pub const REASON_NOT_PREMIUM: &'static str = "Failed to login: User not premium.";

    /// The Disconnect text sent to the client before closing.
    pub fn reason(&self) -> String {
        match self {
            Self::ProtocolVersionMismatch { expected, got } if got < expected => {
                "Outdated client!".to_string()
            }
            Self::ProtocolVersionMismatch { .. } => "Outdated server!".to_string(),
            Self::MalformedMessage(e) => format!("Bad packet: {e}"),
            Self::UnknownMessageId(id) => format!("Unknown packet 0x{id:02X}"),
            Self::UnexpectedMessage { id, .. } => format!("Unexpected packet {}", id.name()),
            Self::HandshakeTokenMismatch => Self::REASON_NOT_PREMIUM.to_string(),
            Self::SessionVerificationFailed => "Failed to verify username!".to_string(),
            Self::IdentifierExhaustion(_) => "Internal server error".to_string(),
            Self::Transport(_) => "Connection lost".to_string(),
            Self::Rejected(reason) => reason.clone(),
        }
    }

    /// `false` when the socket is already unusable, so a Disconnect
    /// would go nowhere.
    pub fn should_notify(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}

impl From<SessionError> for ConnectionError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Transport(t) => Self::Transport(t),
            SessionError::NameTaken(_) => Self::Rejected("Name already in use".to_string()),
            SessionError::Full(_) => Self::Rejected("Server is full".to_string()),
            SessionError::FreeListFull { .. }
            | SessionError::AlreadyReleased(_)
            | SessionError::InvalidId(_) => Self::IdentifierExhaustion(e),
            other => Self::Rejected(other.to_string()),
        }
    }
}
