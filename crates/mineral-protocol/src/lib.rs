//! Wire protocol for Mineral.
//!
//! This crate defines the binary "language" clients and the server
//! speak:
//!
//! - **Fields** ([`wire`]): big-endian numbers, UTF-16 strings, and
//!   length-prefixed arrays; each type knows how to read and write itself.
//! - **Composites**: inventory slots ([`ItemStack`]), entity
//!   [`Metadata`], fixed-point [`AbsolutePos`] and [`Angle`].
//! - **Messages**: one struct per message kind, each implementing
//!   [`Message`], plus the tagged union [`Packet`] and its [`PacketId`].
//! - **Errors** ([`ProtocolError`]).
//!
//! # Framing
//!
//! ```text
//! [1 byte packet id][message fields, big-endian, no length prefix]
//! ```
//!
//! There is no outer length, so a message can only be skipped by
//! decoding it. Any decode error leaves the stream at an unknown offset
//! and must close the connection.
//!
//! # Example
//!
//! ```
//! use mineral_protocol::{ChatMessage, Direction, Message, Packet};
//!
//! # tokio_test_block_on(async {
//! let bytes = ChatMessage { message: "hi".into() }
//!     .encode(Direction::Clientbound)
//!     .unwrap();
//! let mut slice: &[u8] = &bytes;
//! let packet = Packet::read_from(&mut slice, Direction::Clientbound).await.unwrap();
//! assert_eq!(packet, Packet::ChatMessage(ChatMessage { message: "hi".into() }));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod messages;
mod metadata;
mod packet;
mod slot;
mod types;
pub mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::ProtocolError;
pub use messages::*;
pub use metadata::{MAX_METADATA_INDEX, Metadata, MetadataValue};
pub use packet::{Flow, Message, Packet, PacketId};
pub use slot::{Gzipped, ItemStack, PayloadCodec, RawPayload};
pub use types::{
    AbsolutePos, Angle, Axis, CLIENTBOUND_POSITION_ORDER, Direction, EntityId, ObjectData,
    SERVERBOUND_POSITION_ORDER,
};

/// Protocol version spoken by this server (Minecraft 1.5.1).
pub const PROTOCOL_VERSION: i8 = 60;

/// Game version advertised in the server list.
pub const GAME_VERSION: &str = "1.5.1";
