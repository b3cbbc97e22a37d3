//! Packet ids and the tagged union of all messages.
//!
//! The table at the bottom of this file is the single source of truth
//! for which byte maps to which message, which way each one may travel,
//! and how it is decoded. Adding a message kind means adding a line
//! there; every `match` on [`Packet`] then fails to compile until the
//! new kind is handled.

use std::fmt;
use std::future::Future;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ProtocolError;
use crate::messages::*;
use crate::types::Direction;

/// Which directions a message kind may travel in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Server to client only.
    Clientbound,
    /// Client to server only.
    Serverbound,
    /// Either way.
    Both,
}

impl Flow {
    /// Returns `true` if a message with this flow may travel in `dir`.
    pub const fn allows(self, dir: Direction) -> bool {
        matches!(
            (self, dir),
            (Flow::Both, _)
                | (Flow::Clientbound, Direction::Clientbound)
                | (Flow::Serverbound, Direction::Serverbound)
        )
    }
}

/// A message kind with a fixed id and a body layout.
///
/// The body is everything after the id byte. `dir` only matters for the
/// few kinds whose layout differs between directions.
pub trait Message: Sized + Send {
    /// The id byte that precedes this message on the wire.
    const ID: PacketId;

    /// Reads the message body (the id byte has already been consumed).
    fn read_body<R>(
        r: &mut R,
        dir: Direction,
    ) -> impl Future<Output = Result<Self, ProtocolError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Appends the message body (without the id byte) to `buf`.
    fn write_body(&self, buf: &mut BytesMut, dir: Direction) -> Result<(), ProtocolError>;

    /// Encodes the id byte followed by the body.
    ///
    /// The number of bytes written is the length of the returned buffer.
    fn encode(&self, dir: Direction) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(Self::ID.into());
        self.write_body(&mut buf, dir)?;
        Ok(buf)
    }
}

macro_rules! packets {
    ($( $id:literal => $name:ident, $flow:ident; )*) => {
        /// One-byte message tag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum PacketId {
            $( $name = $id, )*
        }

        impl PacketId {
            /// Every known id, in ascending order.
            pub const ALL: &'static [PacketId] = &[$( PacketId::$name, )*];

            /// The message name, for logs.
            pub const fn name(self) -> &'static str {
                match self {
                    $( PacketId::$name => stringify!($name), )*
                }
            }

            /// Directions this kind may travel in.
            pub const fn flow(self) -> Flow {
                match self {
                    $( PacketId::$name => Flow::$flow, )*
                }
            }

            /// Returns `true` if this kind may be received travelling `dir`.
            pub const fn accepts(self, dir: Direction) -> bool {
                self.flow().allows(dir)
            }
        }

        impl TryFrom<u8> for PacketId {
            type Error = ProtocolError;

            fn try_from(byte: u8) -> Result<Self, Self::Error> {
                match byte {
                    $( $id => Ok(PacketId::$name), )*
                    other => Err(ProtocolError::UnknownPacketId(other)),
                }
            }
        }

        /// Any message, tagged by kind.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $( $name($name), )*
        }

        $(
            impl From<$name> for Packet {
                fn from(message: $name) -> Self {
                    Packet::$name(message)
                }
            }
        )*

        impl Packet {
            /// The kind of this message.
            pub fn id(&self) -> PacketId {
                match self {
                    $( Packet::$name(_) => PacketId::$name, )*
                }
            }

            /// Decodes the body of a message whose id byte has already
            /// been read and looked up.
            pub async fn decode_body<R>(
                id: PacketId,
                r: &mut R,
                dir: Direction,
            ) -> Result<Self, ProtocolError>
            where
                R: AsyncRead + Unpin + Send,
            {
                Ok(match id {
                    $( PacketId::$name => Packet::$name(<$name as Message>::read_body(r, dir).await?), )*
                })
            }

            /// Encodes the id byte followed by the body.
            pub fn encode(&self, dir: Direction) -> Result<BytesMut, ProtocolError> {
                match self {
                    $( Packet::$name(message) => message.encode(dir), )*
                }
            }
        }
    };
}

impl Packet {
    /// Reads one complete message: the id byte, then the body.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownPacketId`] for an unassigned id byte, or
    /// whatever the body decoder reports.
    pub async fn read_from<R>(r: &mut R, dir: Direction) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let id = PacketId::try_from(r.read_u8().await?)?;
        Self::decode_body(id, r, dir).await
    }
}

impl From<PacketId> for u8 {
    fn from(id: PacketId) -> u8 {
        id as u8
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

packets! {
    0x00 => KeepAlive, Both;
    0x01 => LoginInfo, Clientbound;
    0x02 => Handshake, Serverbound;
    0x03 => ChatMessage, Both;
    0x04 => TimeUpdate, Clientbound;
    0x05 => EntityEquipment, Clientbound;
    0x06 => SpawnPosition, Clientbound;
    0x07 => EntityInteract, Serverbound;
    0x08 => HealthUpdate, Clientbound;
    0x09 => Respawn, Clientbound;
    0x0A => Player, Serverbound;
    0x0B => PlayerPos, Serverbound;
    0x0C => PlayerLook, Serverbound;
    0x0D => PlayerPosLook, Both;
    0x0E => PlayerAction, Serverbound;
    0x0F => PlayerBlockPlace, Serverbound;
    0x10 => ItemHeldChange, Both;
    0x11 => BedUse, Clientbound;
    0x12 => Animation, Both;
    0x13 => EntityAction, Serverbound;
    0x14 => EntityNamedSpawn, Clientbound;
    0x16 => ItemCollect, Clientbound;
    0x17 => SpawnObjectVehicle, Clientbound;
    0x18 => SpawnMob, Clientbound;
    0x19 => SpawnPainting, Clientbound;
    0x1A => SpawnExperienceOrb, Clientbound;
    0x1C => EntityVelocity, Clientbound;
    0x1D => EntityDestroy, Clientbound;
    0x1E => Entity, Clientbound;
    0x1F => EntityRelMove, Clientbound;
    0x20 => EntityLook, Clientbound;
    0x21 => EntityLookRelMove, Clientbound;
    0x22 => EntityTeleport, Clientbound;
    0x23 => EntityHeadLook, Clientbound;
    0x26 => EntityStatus, Clientbound;
    0x27 => EntityAttach, Clientbound;
    0x28 => EntityMetadata, Clientbound;
    0x29 => EntityEffect, Clientbound;
    0x2A => EntityEffectRemove, Clientbound;
    0x2B => SetExperience, Clientbound;
    0x33 => ChunkData, Clientbound;
    0x34 => BlockChangeMulti, Clientbound;
    0x35 => BlockChange, Clientbound;
    0x36 => BlockAction, Clientbound;
    0x37 => BlockBreakAnimation, Clientbound;
    0x38 => MapChunkBulk, Clientbound;
    0x3C => Explosion, Clientbound;
    0x3D => SoundEffect, Clientbound;
    0x3E => NamedSoundEffect, Clientbound;
    0x3F => Particle, Clientbound;
    0x46 => GameState, Clientbound;
    0x47 => GlobalEntity, Clientbound;
    0x64 => WindowOpen, Clientbound;
    0x65 => WindowClose, Both;
    0x66 => WindowClick, Serverbound;
    0x67 => SlotSet, Clientbound;
    0x68 => SetWindowItems, Clientbound;
    0x69 => WindowProperty, Clientbound;
    0x6A => ConfirmTransaction, Both;
    0x6B => CreativeInventoryAction, Both;
    0x6C => EnchantItem, Serverbound;
    0x82 => SignUpdate, Both;
    0x83 => ItemData, Clientbound;
    0x84 => TileEntityUpdate, Clientbound;
    0xC8 => StatIncrement, Clientbound;
    0xC9 => PlayerListItem, Clientbound;
    0xCA => PlayerAbilities, Both;
    0xCB => TabComplete, Both;
    0xCC => ClientSettings, Serverbound;
    0xCD => ClientStatuses, Serverbound;
    0xCE => ScoreObjective, Clientbound;
    0xCF => ScoreUpdate, Clientbound;
    0xD0 => ScoreDisplay, Clientbound;
    0xD1 => Teams, Clientbound;
    0xFA => PluginMessage, Both;
    0xFC => EncryptionKeyResponse, Both;
    0xFD => EncryptionKeyRequest, Clientbound;
    0xFE => ServerListPing, Serverbound;
    0xFF => Disconnect, Both;
}
