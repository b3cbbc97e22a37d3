//! Entity metadata: a small map of typed values keyed by index.
//!
//! Each entry starts with one key byte, `type << 5 | index`, followed by
//! the value. The map ends with [`METADATA_TERMINATOR`].

use std::collections::BTreeMap;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ProtocolError;
use crate::slot::ItemStack;
use crate::wire::{Field, METADATA_TERMINATOR};

/// Highest index a key byte can carry.
pub const MAX_METADATA_INDEX: u8 = 0x1F;

/// One metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Float(f32),
    String(String),
    Slot(Option<ItemStack>),
    Vector([i32; 3]),
}

impl MetadataValue {
    /// The 3-bit type tag stored in the key byte.
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Byte(_) => 0,
            Self::Short(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::String(_) => 4,
            Self::Slot(_) => 5,
            Self::Vector(_) => 6,
        }
    }

    fn write_value(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            Self::Byte(v) => v.write(buf),
            Self::Short(v) => v.write(buf),
            Self::Int(v) => v.write(buf),
            Self::Float(v) => v.write(buf),
            Self::String(v) => v.write(buf),
            Self::Slot(v) => v.write(buf),
            Self::Vector(v) => v.write(buf),
        }
    }
}

/// Entity metadata map, ordered by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata(pub BTreeMap<u8, MetadataValue>);

impl Metadata {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value at `index`, returning `self` for chaining.
    pub fn with(mut self, index: u8, value: MetadataValue) -> Self {
        self.0.insert(index, value);
        self
    }

    /// Returns the value at `index`.
    pub fn get(&self, index: u8) -> Option<&MetadataValue> {
        self.0.get(&index)
    }

    /// Default metadata of a player entity that has just logged in.
    pub fn for_new_player(name: &str) -> Self {
        Self::new()
            .with(0, MetadataValue::Byte(0))
            .with(1, MetadataValue::Short(300))
            .with(5, MetadataValue::String(name.to_string()))
            .with(6, MetadataValue::Byte(1))
            .with(8, MetadataValue::Int(0))
    }
}

impl Field for Metadata {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut entries = BTreeMap::new();
        loop {
            let key = r.read_u8().await?;
            if key == METADATA_TERMINATOR {
                break;
            }
            let index = key & MAX_METADATA_INDEX;
            let value = match key >> 5 {
                0 => MetadataValue::Byte(i8::read(r).await?),
                1 => MetadataValue::Short(i16::read(r).await?),
                2 => MetadataValue::Int(i32::read(r).await?),
                3 => MetadataValue::Float(f32::read(r).await?),
                4 => MetadataValue::String(String::read(r).await?),
                5 => MetadataValue::Slot(Option::<ItemStack>::read(r).await?),
                6 => MetadataValue::Vector(<[i32; 3]>::read(r).await?),
                other => return Err(ProtocolError::InvalidMetadataType(other)),
            };
            entries.insert(index, value);
        }
        Ok(Self(entries))
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        for (&index, value) in &self.0 {
            if index > MAX_METADATA_INDEX {
                return Err(ProtocolError::InvalidMessage(format!(
                    "metadata index {index} does not fit in 5 bits"
                )));
            }
            let key = (value.type_tag() << 5) | index;
            if key == METADATA_TERMINATOR {
                // Float at index 31 would be read back as the end marker.
                return Err(ProtocolError::InvalidMessage(
                    "metadata key collides with the terminator".into(),
                ));
            }
            buf.put_u8(key);
            value.write_value(buf)?;
        }
        buf.put_u8(METADATA_TERMINATOR);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_metadata_is_just_terminator() {
        let mut buf = BytesMut::new();
        Metadata::new().write(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x7F]);
    }

    #[tokio::test]
    async fn test_key_byte_packs_type_and_index() {
        let mut buf = BytesMut::new();
        Metadata::new()
            .with(1, MetadataValue::Short(300))
            .write(&mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[0x21, 0x01, 0x2C, 0x7F]);
    }

    #[tokio::test]
    async fn test_new_player_metadata_round_trips() {
        let meta = Metadata::for_new_player("Notch");
        let mut buf = BytesMut::new();
        meta.write(&mut buf).unwrap();

        let mut slice: &[u8] = &buf;
        let decoded = Metadata::read(&mut slice).await.unwrap();
        assert_eq!(decoded, meta);
        assert_eq!(
            decoded.get(5),
            Some(&MetadataValue::String("Notch".to_string()))
        );
    }

    #[tokio::test]
    async fn test_every_value_type_round_trips() {
        let meta = Metadata::new()
            .with(0, MetadataValue::Byte(-1))
            .with(2, MetadataValue::Int(i32::MIN))
            .with(3, MetadataValue::Float(0.5))
            .with(10, MetadataValue::Slot(None))
            .with(11, MetadataValue::Slot(Some(ItemStack::new(5, 2, 1))))
            .with(31, MetadataValue::Vector([1, -2, 3]));
        let mut buf = BytesMut::new();
        meta.write(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        assert_eq!(Metadata::read(&mut slice).await.unwrap(), meta);
    }

    #[tokio::test]
    async fn test_unknown_type_tag_is_rejected() {
        let mut slice: &[u8] = &[0xE0, 0x00];
        let err = Metadata::read(&mut slice).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMetadataType(7)));
    }

    #[test]
    fn test_float_at_index_31_fails_to_encode() {
        let mut buf = BytesMut::new();
        let err = Metadata::new()
            .with(31, MetadataValue::Float(1.0))
            .write(&mut buf)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }
}
