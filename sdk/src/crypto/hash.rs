//! # Hashing Utilities
//!
//! The node negotiates its hash function at login time, so transaction
//! hashes are computed through [`HashAlgorithm`] rather than a hardcoded
//! digest. Two are supported:
//!
//! - **SHA-256** for the default `ECC_P256` deployments.
//! - **Keccak-256** for networks configured with `KECCAK256`.
//!
//! Transaction ids are always the *double* digest of the canonical payload.
//! SHA-512 appears once more in address derivation and is exposed here so the
//! address code does not need to reach for `sha2` itself.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256, Sha512};
use sha3::Keccak256;

use super::CryptoError;

/// Hash functions the node may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Keccak256,
}

impl HashAlgorithm {
    /// Name the node uses for this algorithm in `getuid` responses.
    pub fn server_name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Keccak256 => "KECCAK256",
        }
    }

    /// Single digest of `data`.
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        match self {
            HashAlgorithm::Sha256 => sha256(data),
            HashAlgorithm::Keccak256 => keccak256(data),
        }
    }

    /// `digest(digest(data))`. This is how transaction ids are formed.
    pub fn double_digest(&self, data: &[u8]) -> [u8; 32] {
        self.digest(&self.digest(data))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.server_name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "KECCAK256" => Ok(HashAlgorithm::Keccak256),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`.
///
/// ```
/// use ibax_sdk::crypto::hash::{double_sha256, sha256};
///
/// assert_eq!(double_sha256(b"ibax"), sha256(&sha256(b"ibax")));
/// ```
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Keccak-256 (the pre-standard SHA-3 padding, as used by Ethereum).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-512 of `data`.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hasher.finalize().into()
}
