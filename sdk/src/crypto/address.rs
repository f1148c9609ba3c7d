//! # Key Ids and Addresses
//!
//! An account is identified by a signed 64-bit *key id* derived from its
//! public key. Humans see the same number as twenty decimal digits in groups
//! of four, e.g. `1430-1492-4302-5485-5729`.
//!
//! Derivation:
//!
//! 1. `h = hash(public_key)` with the session's hash function;
//! 2. `crc = CRC-64/XZ(SHA-512(h))` (ECMA-182 polynomial, reflected);
//! 3. render `crc` as 20 zero-padded decimal digits and replace the last
//!    digit with a check digit computed over the first 19.
//!
//! The check digit is a Luhn-style weighted sum: digits at odd positions
//! count three times. It lets [`string_to_address`] catch most typos before
//! a transfer goes to the wrong account.

use super::hash::{sha512, HashAlgorithm};
use super::CryptoError;
use crate::config::ADDRESS_LENGTH;

/// Reflected ECMA-182 polynomial.
const CRC64_ECMA_REFLECTED: u64 = 0xC96C_5795_D787_0F42;

/// CRC-64/XZ: reflected ECMA polynomial, all-ones init and final xor.
pub fn crc64(data: &[u8]) -> u64 {
    let mut crc = !0u64;
    for &byte in data {
        crc ^= u64::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ CRC64_ECMA_REFLECTED
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

/// Key id of `public_key` under `hash`.
pub fn address(hash: HashAlgorithm, public_key: &[u8]) -> i64 {
    let digest = hash.digest(public_key);
    let crc = crc64(&sha512(&digest));
    let digits = padded(crc);
    let check = check_digit(&digits.as_bytes()[..ADDRESS_LENGTH - 1]);
    (crc - crc % 10).wrapping_add(u64::from(check)) as i64
}

/// `XXXX-XXXX-XXXX-XXXX-XXXX` rendering of a key id.
///
/// Key ids are formatted as unsigned: negative ids have their top bit set
/// and print as large numbers.
pub fn address_to_string(key_id: i64) -> String {
    let digits = padded(key_id as u64);
    let mut out = String::with_capacity(ADDRESS_LENGTH + ADDRESS_LENGTH / 4);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            out.push('-');
        }
        out.push(ch);
    }
    out
}

/// Parse a dashed or plain address back into a key id, validating its
/// length and check digit.
pub fn string_to_address(s: &str) -> Result<i64, CryptoError> {
    let digits: String = s.trim().chars().filter(|c| *c != '-').collect();
    if digits.len() != ADDRESS_LENGTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::InvalidAddress(s.to_string()));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| CryptoError::InvalidAddress(s.to_string()))?;
    let bytes = digits.as_bytes();
    if check_digit(&bytes[..ADDRESS_LENGTH - 1]) != bytes[ADDRESS_LENGTH - 1] - b'0' {
        return Err(CryptoError::InvalidAddress(s.to_string()));
    }
    Ok(value as i64)
}

fn padded(value: u64) -> String {
    format!("{value:0width$}", width = ADDRESS_LENGTH)
}

fn check_digit(digits: &[u8]) -> u8 {
    let (mut odd, mut even) = (0u32, 0u32);
    for (i, b) in digits.iter().enumerate() {
        let d = u32::from(b - b'0');
        if i % 2 == 1 {
            odd += d;
        } else {
            even += d;
        }
    }
    let sum = (even + 3 * odd) % 10;
    if sum > 0 {
        (10 - sum) as u8
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BLACK_HOLE_ADDRESS;

    const P256_PUB: &str = "1e18532fd4754c02f3041d9c75ceb33b83ffd81ac7ce4fe882ccb1c98bc5896e\
                            a46c311c4e2ff40dd96a3653e6e45445d32dfe486eced75c7a90c6a18881c0a3";

    #[test]
    fn test_crc64_check_value() {
        assert_eq!(crc64(b"123456789"), 0x995D_C9BB_DF19_39FA);
    }

    #[test]
    fn test_known_address() {
        let pk = hex::decode(P256_PUB).unwrap();
        let id = address(HashAlgorithm::Sha256, &pk);
        assert_eq!(id, -4145251643454695887);
        assert_eq!(address_to_string(id), "1430-1492-4302-5485-5729");
    }

    #[test]
    fn test_string_roundtrip() {
        let pk = hex::decode(P256_PUB).unwrap();
        let id = address(HashAlgorithm::Sha256, &pk);
        assert_eq!(string_to_address(&address_to_string(id)).unwrap(), id);
        assert_eq!(string_to_address("14301492430254855729").unwrap(), id);
    }

    #[test]
    fn test_black_hole_address() {
        assert_eq!(string_to_address(BLACK_HOLE_ADDRESS).unwrap(), 0);
        assert_eq!(address_to_string(0), BLACK_HOLE_ADDRESS);
    }

    #[test]
    fn test_typo_is_caught() {
        assert!(string_to_address("1430-1492-4302-5485-5728").is_err());
        assert!(string_to_address("1430-1492-4302-5485").is_err());
        assert!(string_to_address("1430-1492-4302-5485-57x9").is_err());
    }

    #[test]
    fn test_hash_choice_changes_address() {
        let pk = hex::decode(P256_PUB).unwrap();
        assert_ne!(
            address(HashAlgorithm::Sha256, &pk),
            address(HashAlgorithm::Keccak256, &pk)
        );
    }
}
