//! The server's RSA identity for the encryption handshake.
//!
//! One 1024-bit keypair and one server id are generated at startup and
//! shared by every connection. The public key travels to clients as DER
//! (SubjectPublicKeyInfo); clients encrypt their shared secret and the
//! echoed verification token under it with PKCS#1 v1.5 padding.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use rand_core::OsRng;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing::debug;

/// Length of the verification token sent in the encryption request.
pub const VERIFY_TOKEN_LEN: usize = 4;

/// Errors from key generation and decryption.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to generate RSA key: {0}")]
    Generate(#[source] rsa::Error),

    #[error("failed to encode public key: {0}")]
    Encode(String),

    #[error("failed to decrypt: {0}")]
    Decrypt(#[source] rsa::Error),
}

/// The keypair, its DER public key, and the server id.
pub struct ServerKeys {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
    server_id: String,
}

impl ServerKeys {
    pub const BITS: usize = 1024;

    /// Generates a fresh keypair and server id.
    ///
    /// This takes tens of milliseconds; call it once.
    pub fn generate() -> Result<Self, KeyError> {
        let private = RsaPrivateKey::new(&mut OsRng, Self::BITS).map_err(KeyError::Generate)?;
        let public_der = RsaPublicKey::from(&private)
            .to_public_key_der()
            .map_err(|e| KeyError::Encode(e.to_string()))?
            .as_bytes()
            .to_vec();
        let server_id = new_server_id();
        debug!(%server_id, der_len = public_der.len(), "server keys generated");
        Ok(Self {
            private,
            public_der,
            server_id,
        })
    }

    /// The public key, DER encoded.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// The id clients hash into their session-server join request.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Decrypts a PKCS#1 v1.5 ciphertext made with the public key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(KeyError::Decrypt)
    }
}

impl std::fmt::Debug for ServerKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeys")
            .field("server_id", &self.server_id)
            .finish_non_exhaustive()
    }
}

/// A fresh random verification token.
pub fn verify_token() -> [u8; VERIFY_TOKEN_LEN] {
    rand::rng().random()
}

/// `minero<8 hex digits>-<year>`, at most 20 characters.
fn new_server_id() -> String {
    let suffix: u32 = rand::rng().random();
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("minero{suffix:08x}-{}", year_of(secs))
}

/// Gregorian year of a Unix timestamp.
fn year_of(unix_secs: u64) -> i64 {
    // Days-to-civil conversion, counting eras of 400 years from 0000-03-01.
    let days = (unix_secs / 86_400) as i64 + 719_468;
    let era = days.div_euclid(146_097);
    let doe = days.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400;
    if month <= 2 { year + 1 } else { year }
}

#[cfg(test)]
mod tests {
    use rsa::pkcs8::DecodePublicKey;

    use super::*;

    #[test]
    fn test_year_of_known_dates() {
        assert_eq!(year_of(0), 1970);
        // 2013-03-21, the 1.5.1 release date.
        assert_eq!(year_of(1_363_824_000), 2013);
        // 2024-12-31 23:59:59 and one second later.
        assert_eq!(year_of(1_735_689_599), 2024);
        assert_eq!(year_of(1_735_689_600), 2025);
    }

    #[test]
    fn test_server_id_shape() {
        let id = new_server_id();
        assert!(id.starts_with("minero"));
        assert!(id.len() <= 20);
        let (hex, year) = id["minero".len()..].split_once('-').unwrap();
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(year.parse::<i64>().unwrap() >= 2024);
    }

    #[test]
    fn test_decrypt_round_trips_with_public_key() {
        let keys = ServerKeys::generate().unwrap();
        let public = RsaPublicKey::from_public_key_der(keys.public_key_der()).unwrap();
        let secret = [7u8; 16];
        let ciphertext = public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &secret)
            .unwrap();
        assert_eq!(keys.decrypt(&ciphertext).unwrap(), secret);
    }

    #[test]
    fn test_decrypt_garbage_fails() {
        let keys = ServerKeys::generate().unwrap();
        assert!(matches!(keys.decrypt(&[1, 2, 3]), Err(KeyError::Decrypt(_))));
    }
}
