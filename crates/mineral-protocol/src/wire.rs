//! Field-level codecs.
//!
//! Every message is an ordered list of fields, and every field type knows
//! how to read itself from an async byte stream and append itself to an
//! output buffer. All multi-byte numbers are big-endian.
//!
//! Decoding is async because messages are not length-framed: the only
//! way to find the end of a message is to read it field by field.
//! Encoding is synchronous into a [`BytesMut`], which the caller sends
//! in one write.

use std::future::Future;
use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// Item id that marks an empty inventory slot. Nothing follows it.
pub const EMPTY_SLOT: i16 = -1;

/// Tag length that marks a slot without an item payload.
pub const NO_TAG: i16 = -1;

/// Byte that ends an entity-metadata map.
pub const METADATA_TERMINATOR: u8 = 0x7F;

/// Strings carry an *unsigned* 16-bit count of UTF-16 code units, unlike
/// arrays whose counts are signed.
pub const MAX_STRING_UNITS: usize = u16::MAX as usize;

/// Upper bound on any array length accepted from the wire.
///
/// A 32-bit prefix could otherwise ask us to allocate 2 GiB before a
/// single data byte arrives.
pub const MAX_ARRAY_LEN: usize = 2 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Field trait
// ---------------------------------------------------------------------------

/// A value with a fixed wire representation.
///
/// `read` returns `impl Future + Send` rather than being an `async fn`
/// so that callers can decode inside spawned tasks with a generic
/// reader. Implementations are still free to write `async fn read`.
pub trait Field: Sized + Send {
    /// Reads one value from the stream.
    fn read<R>(r: &mut R) -> impl Future<Output = Result<Self, ProtocolError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Appends the encoded value to `buf`.
    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError>;
}

// Primitive numbers map one-to-one onto tokio's big-endian readers and
// bytes' big-endian writers, so a small macro covers all of them.
macro_rules! primitive_field {
    ($($ty:ty => $read:ident, $put:ident;)*) => {
        $(
            impl Field for $ty {
                async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
                where
                    R: AsyncRead + Unpin + Send,
                {
                    Ok(r.$read().await?)
                }

                fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                    buf.$put(*self);
                    Ok(())
                }
            }
        )*
    };
}

primitive_field! {
    i8 => read_i8, put_i8;
    u8 => read_u8, put_u8;
    i16 => read_i16, put_i16;
    u16 => read_u16, put_u16;
    i32 => read_i32, put_i32;
    i64 => read_i64, put_i64;
    f32 => read_f32, put_f32;
    f64 => read_f64, put_f64;
}

impl Field for bool {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        Ok(r.read_u8().await? != 0)
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        buf.put_u8(u8::from(*self));
        Ok(())
    }
}

/// Protocol strings: `u16` code-unit count, then big-endian UTF-16.
impl Field for String {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let units = r.read_u16().await? as usize;
        let mut raw = vec![0u8; units * 2];
        r.read_exact(&mut raw).await?;
        let code_units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&code_units).map_err(|_| ProtocolError::InvalidString)
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let units: Vec<u16> = self.encode_utf16().collect();
        let len = u16::try_from(units.len())
            .map_err(|_| ProtocolError::StringTooLong(units.len()))?;
        buf.reserve(2 + units.len() * 2);
        buf.put_u16(len);
        for unit in units {
            buf.put_u16(unit);
        }
        Ok(())
    }
}

/// Fixed-size runs of a field, such as the four lines of a sign.
impl<T: Field, const N: usize> Field for [T; N] {
    async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::read(r).await?);
        }
        items
            .try_into()
            .map_err(|_| ProtocolError::InvalidMessage(format!("expected {} items", N)))
    }

    fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        self.iter().try_for_each(|item| item.write(buf))
    }
}

// ---------------------------------------------------------------------------
// Length prefixes and alternate codecs
// ---------------------------------------------------------------------------

/// A signed integer used as an array length prefix.
pub trait LengthPrefix: Field + Copy {
    /// Converts a decoded prefix into a usable length.
    fn to_len(self) -> Result<usize, ProtocolError>;

    /// Converts a length into the prefix that encodes it.
    fn from_len(len: usize) -> Result<Self, ProtocolError>;
}

macro_rules! length_prefix {
    ($($ty:ty),*) => {
        $(
            impl LengthPrefix for $ty {
                fn to_len(self) -> Result<usize, ProtocolError> {
                    let raw = i64::from(self);
                    let len = usize::try_from(raw)
                        .map_err(|_| ProtocolError::NegativeLength(raw))?;
                    if len > MAX_ARRAY_LEN {
                        return Err(ProtocolError::LengthTooLarge(len));
                    }
                    Ok(len)
                }

                fn from_len(len: usize) -> Result<Self, ProtocolError> {
                    <$ty>::try_from(len).map_err(|_| ProtocolError::LengthTooLarge(len))
                }
            }
        )*
    };
}

length_prefix!(i8, i16, i32);

/// Reads a length prefix of type `P` and validates it.
pub async fn read_len<P, R>(r: &mut R) -> Result<usize, ProtocolError>
where
    P: LengthPrefix,
    R: AsyncRead + Unpin + Send,
{
    P::read(r).await?.to_len()
}

/// Writes `len` as a prefix of type `P`.
pub fn write_len<P: LengthPrefix>(len: usize, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    P::from_len(len)?.write(buf)
}

/// An alternate wire representation for a value of type `T`.
///
/// Most fields use their own [`Field`] impl, but the same Rust type can
/// have several layouts: a `Vec<u8>` is sometimes prefixed by an `i16`
/// and sometimes by an `i32`. Codecs are zero-sized marker types that
/// pick the layout at the message definition.
pub trait FieldCodec<T> {
    /// Reads one value using this layout.
    fn read<R>(r: &mut R) -> impl Future<Output = Result<T, ProtocolError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Appends `value` using this layout.
    fn write(value: &T, buf: &mut BytesMut) -> Result<(), ProtocolError>;
}

/// Byte array with a length prefix of type `P`.
pub struct Bytes<P>(PhantomData<P>);

/// Byte array with an `i16` length.
pub type Bytes16 = Bytes<i16>;

/// Byte array with an `i32` length.
pub type Bytes32 = Bytes<i32>;

impl<P: LengthPrefix> FieldCodec<Vec<u8>> for Bytes<P> {
    async fn read<R>(r: &mut R) -> Result<Vec<u8>, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let len = read_len::<P, _>(r).await?;
        let mut data = vec![0u8; len];
        r.read_exact(&mut data).await?;
        Ok(data)
    }

    fn write(value: &Vec<u8>, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        write_len::<P>(value.len(), buf)?;
        buf.put_slice(value);
        Ok(())
    }
}

/// Typed array with a count prefix of type `P`.
pub struct List<P>(PhantomData<P>);

/// Typed array with an `i8` count.
pub type List8 = List<i8>;

/// Typed array with an `i16` count.
pub type List16 = List<i16>;

/// Typed array with an `i32` count.
pub type List32 = List<i32>;

impl<P: LengthPrefix, T: Field> FieldCodec<Vec<T>> for List<P> {
    async fn read<R>(r: &mut R) -> Result<Vec<T>, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let len = read_len::<P, _>(r).await?;
        // The count is untrusted; grow as real items arrive.
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(T::read(r).await?);
        }
        Ok(items)
    }

    fn write(value: &Vec<T>, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        write_len::<P>(value.len(), buf)?;
        value.iter().try_for_each(|item| item.write(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn round_trip<T: Field>(value: &T) -> T {
        let mut buf = BytesMut::new();
        value.write(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let out = T::read(&mut slice).await.unwrap();
        assert!(slice.is_empty(), "decoder left {} bytes", slice.len());
        out
    }

    #[tokio::test]
    async fn test_numbers_are_big_endian() {
        let mut buf = BytesMut::new();
        0x0102_0304i32.write(&mut buf).unwrap();
        (-2i16).write(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x02, 0x03, 0x04, 0xFF, 0xFE]);
    }

    #[tokio::test]
    async fn test_bool_reads_any_nonzero_as_true() {
        let mut slice: &[u8] = &[0x00, 0x01, 0x7F];
        assert!(!bool::read(&mut slice).await.unwrap());
        assert!(bool::read(&mut slice).await.unwrap());
        assert!(bool::read(&mut slice).await.unwrap());
    }

    #[tokio::test]
    async fn test_string_counts_utf16_code_units() {
        let mut buf = BytesMut::new();
        "hé".to_string().write(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x02, 0x00, b'h', 0x00, 0xE9]);

        // A character outside the BMP takes a surrogate pair.
        let mut buf = BytesMut::new();
        "\u{1F600}".to_string().write(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x02]);
        assert_eq!(round_trip(&"\u{1F600}".to_string()).await, "\u{1F600}");
    }

    #[tokio::test]
    async fn test_string_empty_and_maximum_length() {
        assert_eq!(round_trip(&String::new()).await, "");

        let longest = "a".repeat(MAX_STRING_UNITS);
        assert_eq!(round_trip(&longest).await.len(), MAX_STRING_UNITS);
    }

    #[test]
    fn test_string_too_long_fails_to_encode() {
        let mut buf = BytesMut::new();
        let err = "a".repeat(MAX_STRING_UNITS + 1).write(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::StringTooLong(65536)));
    }

    #[tokio::test]
    async fn test_string_lone_surrogate_is_invalid() {
        let mut slice: &[u8] = &[0x00, 0x01, 0xD8, 0x00];
        let err = String::read(&mut slice).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidString));
    }

    #[tokio::test]
    async fn test_truncated_input_is_an_io_error() {
        let mut slice: &[u8] = &[0x00, 0x05, 0x00, b'a'];
        let err = String::read(&mut slice).await.unwrap_err();
        match err {
            ProtocolError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bytes16_empty_and_negative_length() {
        let mut buf = BytesMut::new();
        Bytes16::write(&Vec::new(), &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x00, 0x00]);

        let mut slice: &[u8] = &[0xFF, 0xFE];
        let err = Bytes16::read(&mut slice).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NegativeLength(-2)));
    }

    #[tokio::test]
    async fn test_bytes32_rejects_oversized_length() {
        let mut slice: &[u8] = &[0x7F, 0xFF, 0xFF, 0xFF];
        let err = Bytes32::read(&mut slice).await.unwrap_err();
        assert!(matches!(err, ProtocolError::LengthTooLarge(_)));
    }

    #[test]
    fn test_list8_overflow_fails_to_encode() {
        let mut buf = BytesMut::new();
        let too_many = vec![0i32; 128];
        let err = List8::write(&too_many, &mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthTooLarge(128)));
    }

    #[tokio::test]
    async fn test_list16_of_strings() {
        let names = vec!["alice".to_string(), String::new(), "bob".to_string()];
        let mut buf = BytesMut::new();
        List16::write(&names, &mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let out: Vec<String> = List16::read(&mut slice).await.unwrap();
        assert_eq!(out, names);
    }

    #[tokio::test]
    async fn test_fixed_array_reads_exactly_n() {
        let mut slice: &[u8] = &[1, 2, 3, 4];
        let out = <[i8; 3]>::read(&mut slice).await.unwrap();
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(slice, &[4]);
    }
}
