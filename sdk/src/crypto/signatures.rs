//! # Digital Signatures
//!
//! ECDSA over the two curves IBAX nodes run with: NIST P-256 (`ECC_P256`,
//! the default) and secp256k1 (`ECC_Secp256k1`).
//!
//! Both curves share one wire format so the rest of the crate never cares
//! which is active:
//!
//! - public keys are the uncompressed point **without** the `0x04` tag,
//!   `X || Y`, 64 bytes;
//! - signatures are fixed-width `r || s`, 64 bytes;
//! - the signed message is hashed with SHA-256 before signing, whatever
//!   hash function the session uses for transaction ids.
//!
//! Nonces are derived per RFC 6979, so signing is deterministic. That makes
//! the whole build pipeline reproducible, which the tests lean on.
//!
//! Chinese national algorithms (`SM2`) are not supported and are rejected by
//! name.

use std::fmt;
use std::str::FromStr;

use p256::ecdsa::signature::{Signer, Verifier};

use super::keys::PrivateKey;
use super::CryptoError;
use crate::config::PUBLIC_KEY_LENGTH;

/// SEC1 tag of an uncompressed curve point.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// Signature schemes the node may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignAlgorithm {
    #[default]
    P256,
    Secp256k1,
}

impl SignAlgorithm {
    /// Name the node uses for this scheme in `getuid` responses.
    pub fn server_name(&self) -> &'static str {
        match self {
            SignAlgorithm::P256 => "ECC_P256",
            SignAlgorithm::Secp256k1 => "ECC_Secp256k1",
        }
    }

    /// Derive the 64-byte `X || Y` public key.
    pub fn public_key(&self, key: &PrivateKey) -> Result<Vec<u8>, CryptoError> {
        let point = match self {
            SignAlgorithm::P256 => {
                let sk = p256::ecdsa::SigningKey::from_slice(key.as_bytes())
                    .map_err(|_| CryptoError::KeyDerivation)?;
                sk.verifying_key().to_encoded_point(false).as_bytes().to_vec()
            }
            SignAlgorithm::Secp256k1 => {
                let sk = k256::ecdsa::SigningKey::from_slice(key.as_bytes())
                    .map_err(|_| CryptoError::KeyDerivation)?;
                sk.verifying_key().to_encoded_point(false).as_bytes().to_vec()
            }
        };
        strip_tag(point)
    }

    /// Sign `message`. Returns `r || s`.
    pub fn sign(&self, key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            SignAlgorithm::P256 => {
                let sk = p256::ecdsa::SigningKey::from_slice(key.as_bytes())
                    .map_err(|e| CryptoError::Signing(e.to_string()))?;
                let sig: p256::ecdsa::Signature = sk
                    .try_sign(message)
                    .map_err(|e| CryptoError::Signing(e.to_string()))?;
                Ok(sig.to_bytes().to_vec())
            }
            SignAlgorithm::Secp256k1 => {
                let sk = k256::ecdsa::SigningKey::from_slice(key.as_bytes())
                    .map_err(|e| CryptoError::Signing(e.to_string()))?;
                let sig: k256::ecdsa::Signature = sk
                    .try_sign(message)
                    .map_err(|e| CryptoError::Signing(e.to_string()))?;
                Ok(sig.to_bytes().to_vec())
            }
        }
    }

    /// Check an `r || s` signature against a public key in either the
    /// 64-byte untagged or 65-byte tagged form.
    pub fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let sec1 = tag(public_key)?;
        match self {
            SignAlgorithm::P256 => {
                let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let sig = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            SignAlgorithm::Secp256k1 => {
                let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                    .map_err(|_| CryptoError::InvalidPublicKey)?;
                let sig = k256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
        }
    }
}

impl fmt::Display for SignAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.server_name())
    }
}

impl FromStr for SignAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ECC_P256" => Ok(SignAlgorithm::P256),
            "ECC_SECP256K1" => Ok(SignAlgorithm::Secp256k1),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

fn strip_tag(mut point: Vec<u8>) -> Result<Vec<u8>, CryptoError> {
    if point.len() != PUBLIC_KEY_LENGTH + 1 || point[0] != UNCOMPRESSED_TAG {
        return Err(CryptoError::KeyDerivation);
    }
    point.remove(0);
    Ok(point)
}

fn tag(public_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match public_key.len() {
        PUBLIC_KEY_LENGTH => {
            let mut out = Vec::with_capacity(PUBLIC_KEY_LENGTH + 1);
            out.push(UNCOMPRESSED_TAG);
            out.extend_from_slice(public_key);
            Ok(out)
        }
        n if n == PUBLIC_KEY_LENGTH + 1 && public_key[0] == UNCOMPRESSED_TAG => Ok(public_key.to_vec()),
        _ => Err(CryptoError::InvalidPublicKey),
    }
}
