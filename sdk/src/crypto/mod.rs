//! # Cryptographic Primitives
//!
//! Everything that touches key material or digests goes through here. The
//! rest of the crate only ever sees a [`CryptoSuite`]: the pair of signature
//! scheme and hash function the node told us to use.
//!
//! - **signatures** — ECDSA on P-256 or secp256k1, deterministic nonces.
//! - **hash** — SHA-256 or Keccak-256, plus SHA-512 for addresses.
//! - **keys** — the raw private scalar, redacted in `Debug`.
//! - **address** — key id derivation and the dashed address format.
//!
//! No algorithm here is implemented by hand apart from the CRC used in
//! address checksums. The curves and digests come from RustCrypto.

pub mod address;
pub mod hash;
pub mod keys;
pub mod signatures;

use thiserror::Error;

pub use address::{address_to_string, string_to_address};
pub use hash::HashAlgorithm;
pub use keys::PrivateKey;
pub use signatures::SignAlgorithm;

use crate::config::{DEFAULT_CRYPTOER, DEFAULT_HASHER};

/// Errors from key handling, signing and address parsing.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("private key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("private key is not a valid scalar for this curve")]
    KeyDerivation,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature bytes")]
    InvalidSignature,

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// The signature scheme and hash function of one session.
///
/// Cheap to copy. Swapped wholesale when the node reports different
/// algorithms from the ones we started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CryptoSuite {
    pub sign: SignAlgorithm,
    pub hash: HashAlgorithm,
}

impl CryptoSuite {
    pub fn new(sign: SignAlgorithm, hash: HashAlgorithm) -> Self {
        Self { sign, hash }
    }

    /// Build a suite from the node's algorithm names, e.g. `("ECC_P256", "SHA256")`.
    /// Empty names fall back to the defaults.
    pub fn from_names(cryptoer: &str, hasher: &str) -> Result<Self, CryptoError> {
        let cryptoer = if cryptoer.trim().is_empty() { DEFAULT_CRYPTOER } else { cryptoer };
        let hasher = if hasher.trim().is_empty() { DEFAULT_HASHER } else { hasher };
        Ok(Self {
            sign: cryptoer.parse()?,
            hash: hasher.parse()?,
        })
    }

    pub fn public_key(&self, key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
        self.sign.public_key(key)
    }

    pub fn sign(&self, key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.sign.sign(key, message)
    }

    pub fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        self.sign.verify(public_key, message, signature)
    }

    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        self.hash.digest(data)
    }

    pub fn double_hash(&self, data: &[u8]) -> [u8; 32] {
        self.hash.double_digest(data)
    }

    /// Key id of a public key under this suite's hash.
    pub fn address(&self, public_key: &[u8]) -> i64 {
        address::address(self.hash, public_key)
    }
}
