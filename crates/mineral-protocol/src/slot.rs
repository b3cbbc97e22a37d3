//! Inventory slots and the payload codec they embed.
//!
//! A slot on the wire is:
//!
//! ```text
//! item_id: i16          -1 = empty slot, nothing else follows
//! count:   i8
//! damage:  i16
//! tag_len: i16          -1 = no tag
//! tag:     [u8; tag_len] gzip-compressed tree-tag compound
//! ```
//!
//! The tag is kept as opaque bytes. Callers that understand the
//! tree-tag format decode it through a [`PayloadCodec`], usually wrapped
//! in [`Gzipped`].

use std::io::{Read, Write};

use bytes::BytesMut;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ProtocolError;
use crate::wire::{EMPTY_SLOT, Field, LengthPrefix, NO_TAG};

/// The contents of a non-empty inventory slot.
///
/// An empty slot is `None` in an `Option<ItemStack>` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: i16,
    pub count: i8,
    pub damage: i16,
    /// Compressed tag bytes, exactly as they appear on the wire.
    pub tag: Option<Vec<u8>>,
}

impl ItemStack {
    /// Creates a stack without a tag.
    pub fn new(item_id: i16, count: i8, damage: i16) -> Self {
        Self {
            item_id,
            count,
            damage,
            tag: None,
        }
    }

    /// Encodes `value` with `codec` and stores it as this stack's tag.
    pub fn with_tag<C: PayloadCodec>(
        mut self,
        codec: &C,
        value: &C::Value,
    ) -> Result<Self, ProtocolError> {
        self.tag = Some(codec.encode(value)?);
        Ok(self)
    }

    /// Decodes the tag with `codec`, if there is one.
    pub fn decode_tag<C: PayloadCodec>(&self, codec: &C) -> Result<Option<C::Value>, ProtocolError> {
        self.tag.as_deref().map(|bytes| codec.decode(bytes)).transpose()
    }
}

impl Field for Option<ItemStack> {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let item_id = r.read_i16().await?;
        if item_id == EMPTY_SLOT {
            return Ok(None);
        }
        let count = r.read_i8().await?;
        let damage = r.read_i16().await?;
        let tag_len = r.read_i16().await?;
        let tag = if tag_len == NO_TAG {
            None
        } else {
            let mut tag = vec![0u8; tag_len.to_len()?];
            r.read_exact(&mut tag).await?;
            Some(tag)
        };
        Ok(Some(ItemStack {
            item_id,
            count,
            damage,
            tag,
        }))
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let Some(stack) = self else {
            return EMPTY_SLOT.write(buf);
        };
        if stack.item_id == EMPTY_SLOT {
            return Err(ProtocolError::InvalidMessage(
                "item id -1 is reserved for empty slots".into(),
            ));
        }
        stack.item_id.write(buf)?;
        stack.count.write(buf)?;
        stack.damage.write(buf)?;
        match &stack.tag {
            None => NO_TAG.write(buf),
            Some(tag) => {
                i16::from_len(tag.len())?.write(buf)?;
                buf.extend_from_slice(tag);
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Payload codecs
// ---------------------------------------------------------------------------

/// Converts an item payload between a structured value and bytes.
///
/// The tree-tag format itself lives outside this crate; anything that
/// can turn its value type into bytes and back can plug in here.
pub trait PayloadCodec: Send + Sync + 'static {
    /// The decoded form of a payload.
    type Value;

    /// Serializes a value into payload bytes.
    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes payload bytes.
    fn decode(&self, data: &[u8]) -> Result<Self::Value, ProtocolError>;
}

/// Identity codec: the payload is its own bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPayload;

impl PayloadCodec for RawPayload {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
        Ok(value.clone())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        Ok(data.to_vec())
    }
}

/// Gzip compression around another codec.
///
/// Slot tags are always gzip-compressed on the wire, so the usual stack
/// is `Gzipped<YourTreeTagCodec>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gzipped<C>(pub C);

impl<C: PayloadCodec> PayloadCodec for Gzipped<C> {
    type Value = C::Value;

    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, ProtocolError> {
        let raw = self.0.encode(value)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&raw)
            .map_err(|e| ProtocolError::Payload(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| ProtocolError::Payload(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<Self::Value, ProtocolError> {
        let mut raw = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut raw)
            .map_err(|e| ProtocolError::Payload(e.to_string()))?;
        self.0.decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decode(bytes: &[u8]) -> Result<Option<ItemStack>, ProtocolError> {
        let mut slice = bytes;
        Option::<ItemStack>::read(&mut slice).await
    }

    #[tokio::test]
    async fn test_empty_slot_is_two_bytes_and_stops() {
        let mut buf = BytesMut::new();
        None::<ItemStack>.write(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0xFF, 0xFF]);

        // Trailing bytes belong to the next field and must not be eaten.
        let mut slice: &[u8] = &[0xFF, 0xFF, 0x12, 0x34];
        assert_eq!(Option::<ItemStack>::read(&mut slice).await.unwrap(), None);
        assert_eq!(slice, &[0x12, 0x34]);
    }

    #[tokio::test]
    async fn test_slot_without_tag() {
        let stack = ItemStack::new(276, 1, 0);
        let mut buf = BytesMut::new();
        Some(stack.clone()).write(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x14, 0x01, 0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(decode(&buf).await.unwrap(), Some(stack));
    }

    #[tokio::test]
    async fn test_slot_with_gzipped_tag() {
        let codec = Gzipped(RawPayload);
        let stack = ItemStack::new(1, 64, 0)
            .with_tag(&codec, &b"compound".to_vec())
            .unwrap();

        let mut buf = BytesMut::new();
        Some(stack.clone()).write(&mut buf).unwrap();
        let decoded = decode(&buf).await.unwrap().unwrap();
        assert_eq!(decoded, stack);
        assert_eq!(decoded.decode_tag(&codec).unwrap(), Some(b"compound".to_vec()));
    }

    #[tokio::test]
    async fn test_slot_negative_tag_length_is_rejected() {
        let err = decode(&[0x00, 0x01, 0x01, 0x00, 0x00, 0xFF, 0xFE]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NegativeLength(-2)));
    }

    #[test]
    fn test_slot_reserved_item_id_fails_to_encode() {
        let mut buf = BytesMut::new();
        let err = Some(ItemStack::new(-1, 1, 0)).write(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_gzipped_rejects_garbage() {
        let err = Gzipped(RawPayload).decode(b"not gzip").unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)));
    }
}
