//! AES-128 in CFB8 mode, the stream cipher installed after the
//! encryption handshake.
//!
//! The shared secret is used both as the key and as the IV, and the same
//! secret keys both directions. There is no MAC. This is the legacy
//! scheme the protocol mandates; changing anything here breaks every
//! client.
//!
//! CFB8 has a one-byte block, so any number of bytes can be processed at
//! a time and the two sides stay in sync as long as every byte is fed
//! through the cipher exactly once, in order.

use aes::Aes128;
use aes::cipher::inout::InOutBuf;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::TransportError;

/// Encrypting half of the stream cipher.
pub type Encryptor = cfb8::Encryptor<Aes128>;

/// Decrypting half of the stream cipher.
pub type Decryptor = cfb8::Decryptor<Aes128>;

/// Required length of the shared secret, in bytes.
pub const SHARED_SECRET_LEN: usize = 16;

/// Creates an encryptor keyed (and IV'd) by `secret`.
///
/// # Errors
/// [`TransportError::InvalidKey`] if `secret` is not 16 bytes long.
pub fn encryptor(secret: &[u8]) -> Result<Encryptor, TransportError> {
    Encryptor::new_from_slices(secret, secret)
        .map_err(|_| TransportError::InvalidKey(secret.len()))
}

/// Creates a decryptor keyed (and IV'd) by `secret`.
///
/// # Errors
/// [`TransportError::InvalidKey`] if `secret` is not 16 bytes long.
pub fn decryptor(secret: &[u8]) -> Result<Decryptor, TransportError> {
    Decryptor::new_from_slices(secret, secret)
        .map_err(|_| TransportError::InvalidKey(secret.len()))
}

/// Encrypts `data` in place, advancing the cipher state.
pub fn encrypt_in_place(cipher: &mut Encryptor, data: &mut [u8]) {
    let (blocks, rest) = InOutBuf::from(data).into_chunks();
    debug_assert!(rest.is_empty(), "CFB8 blocks are one byte");
    cipher.encrypt_blocks_inout_mut(blocks);
}

/// Decrypts `data` in place, advancing the cipher state.
pub fn decrypt_in_place(cipher: &mut Decryptor, data: &mut [u8]) {
    let (blocks, rest) = InOutBuf::from(data).into_chunks();
    debug_assert!(rest.is_empty(), "CFB8 blocks are one byte");
    cipher.decrypt_blocks_inout_mut(blocks);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 16] = *b"0123456789abcdef";

    #[test]
    fn test_encryptor_rejects_short_secret() {
        let err = encryptor(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidKey(3)));
        assert!(decryptor(&[0; 15]).is_err());
    }

    #[test]
    fn test_encrypt_changes_bytes_and_decrypt_restores_them() {
        let plain = b"hello, stream cipher".to_vec();
        let mut data = plain.clone();

        let mut enc = encryptor(&SECRET).unwrap();
        encrypt_in_place(&mut enc, &mut data);
        assert_ne!(data, plain);

        let mut dec = decryptor(&SECRET).unwrap();
        decrypt_in_place(&mut dec, &mut data);
        assert_eq!(data, plain);
    }

    #[test]
    fn test_cipher_state_carries_across_chunk_boundaries() {
        // Encrypting in one go and in arbitrary pieces must produce the
        // same ciphertext: the reader sees whatever chunks TCP delivers.
        let plain: Vec<u8> = (0u8..64).collect();

        let mut whole = plain.clone();
        let mut enc = encryptor(&SECRET).unwrap();
        encrypt_in_place(&mut enc, &mut whole);

        let mut pieces = plain.clone();
        let mut enc = encryptor(&SECRET).unwrap();
        let (a, rest) = pieces.split_at_mut(5);
        let (b, c) = rest.split_at_mut(31);
        encrypt_in_place(&mut enc, a);
        encrypt_in_place(&mut enc, b);
        encrypt_in_place(&mut enc, c);

        assert_eq!(whole, pieces);
    }
}
