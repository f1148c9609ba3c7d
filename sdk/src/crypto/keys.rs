//! # Key Material
//!
//! A [`PrivateKey`] is 32 raw bytes and nothing more. It does not know which
//! curve it belongs to: the node decides that at login time, and the same
//! bytes are interpreted by whichever [`SignAlgorithm`](super::SignAlgorithm)
//! the session is currently using.
//!
//! Key bytes are never logged and never printed. `Debug` is redacted.

use std::fmt;

use rand::RngCore;

use super::CryptoError;
use crate::config::PRIVATE_KEY_LENGTH;

/// Raw 32-byte private scalar.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey([u8; PRIVATE_KEY_LENGTH]);

impl PrivateKey {
    /// Wrap raw bytes. Fails unless exactly 32 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; PRIVATE_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(PrivateKey(raw))
    }

    /// Parse a hex-encoded key.
    ///
    /// Exported key files sometimes carry the public half after the private
    /// one; anything past the first 64 hex characters is ignored.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() < PRIVATE_KEY_LENGTH * 2 {
            return Err(CryptoError::InvalidKeyLength(s.len() / 2));
        }
        let head = s
            .get(..PRIVATE_KEY_LENGTH * 2)
            .ok_or_else(|| CryptoError::InvalidHex("non-ASCII input".into()))?;
        let bytes = hex::decode(head).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Fresh random key from the OS RNG.
    ///
    /// Any 32 bytes below both curve orders work for P-256 and secp256k1;
    /// the odds of drawing one that does not are around 2^-32, and
    /// [`CryptoSuite::public_key`](super::CryptoSuite::public_key) reports it.
    pub fn generate() -> Self {
        let mut raw = [0u8; PRIVATE_KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        PrivateKey(raw)
    }

    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_LENGTH] {
        &self.0
    }

    /// Hex encoding. Only for writing key files; never log this.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}
