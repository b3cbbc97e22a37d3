//! Error types for the protocol layer.
//!
//! Every decode error is fatal to the connection it came from: the
//! stream has no framing beyond the message id, so after a bad field
//! there is no way to find the start of the next message.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Reading from the stream failed, including a truncated message
    /// (`UnexpectedEof`).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The leading byte does not name any known message kind.
    #[error("unknown packet id 0x{0:02X}")]
    UnknownPacketId(u8),

    /// A signed length prefix was negative where no sentinel applies.
    #[error("negative length prefix: {0}")]
    NegativeLength(i64),

    /// A length prefix exceeds what the field can carry, on either side.
    #[error("length {0} exceeds the field limit")]
    LengthTooLarge(usize),

    /// A string's code units are not valid UTF-16.
    #[error("string is not valid UTF-16")]
    InvalidString,

    /// A string does not fit its 16-bit length prefix.
    #[error("string of {0} code units does not fit a 16-bit length")]
    StringTooLong(usize),

    /// An entity-metadata entry carries a type tag above 6.
    #[error("unknown metadata type {0}")]
    InvalidMetadataType(u8),

    /// The message is well-formed but violates a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The inventory payload codec rejected its input.
    #[error("payload codec error: {0}")]
    Payload(String),
}
