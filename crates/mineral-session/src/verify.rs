//! Online-mode identity checks against the session server.
//!
//! When a client logs in to an online-mode server, it tells the session
//! server which server it is joining. The server then asks the session
//! server whether that claim was made. Both sides identify the join by
//! the same hash, computed by [`auth_digest`].
//!
//! The check sits behind the [`SessionVerifier`] trait so tests, and
//! servers behind their own auth proxy, can swap it out.

use std::future::Future;
use std::time::Duration;

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::SessionError;

/// Asks whether `username` really joined this server.
///
/// # Trait bounds
///
/// - `Send + Sync` so one verifier can be shared by every connection task.
/// - `'static` because it lives as long as the server.
///
/// # Example
///
/// ```rust
/// use mineral_session::{SessionError, SessionVerifier};
///
/// /// Trusts exactly one player. Only for local testing.
/// struct OnlyNotch;
///
/// impl SessionVerifier for OnlyNotch {
///     async fn verify(
///         &self,
///         username: &str,
///         _server_id: &str,
///         _shared_secret: &[u8],
///         _public_key: &[u8],
///     ) -> Result<bool, SessionError> {
///         Ok(username == "Notch")
///     }
/// }
/// ```
pub trait SessionVerifier: Send + Sync + 'static {
    /// # Arguments
    /// - `server_id`: the id sent in the encryption request
    /// - `shared_secret`: the decrypted AES secret
    /// - `public_key`: the server's public key, DER encoded
    ///
    /// # Returns
    /// - `Ok(true)`: the session server vouches for the player
    /// - `Ok(false)`: it does not
    /// - `Err(SessionError::VerifyFailed)`: it could not be asked
    fn verify(
        &self,
        username: &str,
        server_id: &str,
        shared_secret: &[u8],
        public_key: &[u8],
    ) -> impl Future<Output = Result<bool, SessionError>> + Send;
}

/// Verifies players against the Mojang-style session server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionVerifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSessionVerifier {
    pub const DEFAULT_URL: &'static str = "http://session.minecraft.net/game/checkserver.jsp";

    /// Upper bound on one round trip to the session server, connect included.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self::with_url(Self::DEFAULT_URL)
    }

    /// A verifier that asks the `checkserver` endpoint at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// A session server that has not answered within `timeout` fails the
    /// login with [`SessionError::VerifyFailed`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpSessionVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionVerifier for HttpSessionVerifier {
    async fn verify(
        &self,
        username: &str,
        server_id: &str,
        shared_secret: &[u8],
        public_key: &[u8],
    ) -> Result<bool, SessionError> {
        let hash = auth_digest(server_id, shared_secret, public_key);
        let response = self
            .client
            .get(&self.url)
            .query(&[("user", username), ("serverId", hash.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SessionError::VerifyFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, username, "session server returned an error");
            return Err(SessionError::VerifyFailed(format!("status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SessionError::VerifyFailed(e.to_string()))?;
        debug!(username, answer = body.as_str(), "session server answered");
        Ok(body.trim() == "YES")
    }
}

/// The join hash: SHA-1 over `server_id`, `shared_secret`, then
/// `public_key`, printed as a signed big-endian number in lowercase hex
/// with no leading zeros.
///
/// ```rust
/// assert_eq!(
///     mineral_session::auth_digest("jeb_", &[], &[]),
///     "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1",
/// );
/// ```
pub fn auth_digest(server_id: &str, shared_secret: &[u8], public_key: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(shared_secret);
    hasher.update(public_key);
    let mut hash: [u8; 20] = hasher.finalize().into();

    let negative = hash[0] & 0x80 != 0;
    if negative {
        negate(&mut hash);
    }

    let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
    let digits = hex.trim_start_matches('0');
    if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    }
}

/// Two's complement negation of a big-endian integer.
fn negate(bytes: &mut [u8]) {
    let mut carry = true;
    for b in bytes.iter_mut().rev() {
        *b = !*b;
        if carry {
            let (sum, overflow) = b.overflowing_add(1);
            *b = sum;
            carry = overflow;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_digest_known_values() {
        let cases = [
            ("Notch", "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48"),
            ("jeb_", "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1"),
            ("simon", "88e16a1019277b15d58faf0541e11910eb756f6"),
        ];
        for (input, expected) in cases {
            assert_eq!(auth_digest(input, &[], &[]), expected, "digest of {input}");
        }
    }

    #[test]
    fn test_auth_digest_hashes_parts_in_order() {
        let split = auth_digest("No", b"tc", b"h");
        assert_eq!(split, "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48");
    }

    #[test]
    fn test_negate_carries_through_zero_bytes() {
        let mut bytes = [0x01, 0x00, 0x00];
        negate(&mut bytes);
        assert_eq!(bytes, [0xFF, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_verify_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accepts and then never answers.
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let verifier = HttpSessionVerifier::with_url(format!("http://{addr}/checkserver.jsp"))
            .with_timeout(Duration::from_millis(200));
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            verifier.verify("Steve", "abc", b"secret", b"key"),
        )
        .await
        .expect("verify should give up on its own");

        assert!(matches!(result, Err(SessionError::VerifyFailed(_))), "got {result:?}");
        silent.abort();
    }
}
