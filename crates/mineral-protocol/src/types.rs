//! Small wire types shared by many messages.

use std::fmt;

use bytes::BytesMut;
use tokio::io::AsyncRead;

use crate::ProtocolError;
use crate::wire::Field;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Entity identifier, as carried on the wire.
///
/// Players, mobs, and objects all share one id space. Valid ids are
/// non-negative; the allocator in `mineral-session` hands them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

impl Field for EntityId {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(Self(i32::read(r).await?))
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.0.write(buf)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which way a message travels.
///
/// Almost every message has the same layout both ways. The exception is
/// [`PlayerPosLook`](crate::PlayerPosLook), whose Y and Stance fields
/// trade places; the codec takes a `Direction` so that asymmetry lives
/// in one table instead of in two hand-written decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server.
    Serverbound,
    /// Server to client.
    Clientbound,
}

/// One of the four coordinates in a position/look message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Stance,
    Z,
}

/// Field order of the four `f64`s when the client sends a position/look.
pub const SERVERBOUND_POSITION_ORDER: [Axis; 4] = [Axis::X, Axis::Y, Axis::Stance, Axis::Z];

/// Field order of the four `f64`s when the server sends a position/look.
pub const CLIENTBOUND_POSITION_ORDER: [Axis; 4] = [Axis::X, Axis::Stance, Axis::Y, Axis::Z];

impl Direction {
    /// Returns the coordinate order used by position/look messages
    /// travelling in this direction.
    pub const fn position_order(self) -> [Axis; 4] {
        match self {
            Self::Serverbound => SERVERBOUND_POSITION_ORDER,
            Self::Clientbound => CLIENTBOUND_POSITION_ORDER,
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed-point position and angle
// ---------------------------------------------------------------------------

/// Absolute position in 1/32-block units, as an `i32` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AbsolutePos(pub i32);

impl AbsolutePos {
    /// Units per block.
    pub const SCALE: f64 = 32.0;

    /// Converts block coordinates, truncating toward zero.
    pub fn from_blocks(blocks: f64) -> Self {
        Self((blocks * Self::SCALE) as i32)
    }

    /// Converts back to block coordinates.
    pub fn to_blocks(self) -> f64 {
        f64::from(self.0) / Self::SCALE
    }
}

impl Field for AbsolutePos {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(Self(i32::read(r).await?))
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.0.write(buf)
    }
}

/// Rotation in 1/256-turn steps, as an `i8` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Angle(pub i8);

impl Angle {
    /// Converts degrees. Angles wrap, so 270° and -90° encode the same.
    pub fn from_degrees(degrees: f32) -> Self {
        Self(((degrees / 360.0 * 256.0) as i32) as i8)
    }

    /// Converts back to degrees in `[-180, 180)`.
    pub fn to_degrees(self) -> f32 {
        f32::from(self.0) * 360.0 / 256.0
    }
}

impl Field for Angle {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(Self(i8::read(r).await?))
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.0.write(buf)
    }
}

// ---------------------------------------------------------------------------
// ObjectData
// ---------------------------------------------------------------------------

/// Trailing data of a spawned object or vehicle.
///
/// The three speed components are only on the wire when `data` is
/// non-zero; with `data == 0` they are neither read nor written, and
/// decode as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectData {
    /// Meaning depends on the object kind (thrower id, block type, ...).
    pub data: i32,
    pub speed_x: i16,
    pub speed_y: i16,
    pub speed_z: i16,
}

impl Field for ObjectData {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let data = i32::read(r).await?;
        if data == 0 {
            return Ok(Self::default());
        }
        Ok(Self {
            data,
            speed_x: i16::read(r).await?,
            speed_y: i16::read(r).await?,
            speed_z: i16::read(r).await?,
        })
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.data.write(buf)?;
        if self.data != 0 {
            self.speed_x.write(buf)?;
            self.speed_y.write(buf)?;
            self.speed_z.write(buf)?;
        }
        Ok(())
    }
}
