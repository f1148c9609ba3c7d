//! Canonical binary encoding.
//!
//! Transaction hashes are computed over bytes, so the bytes must be the same
//! on every machine for the same transaction. The node speaks MessagePack;
//! this module writes the subset of it we need, always choosing the same
//! representation for the same value:
//!
//! - integers are **always** `int64` (`0xd3` + 8 big-endian bytes), never the
//!   compact fixint forms;
//! - strings use the smallest of `fixstr`/`str8`/`str16`/`str32`;
//! - binary uses the smallest of `bin8`/`bin16`/`bin32`;
//! - floats are always `float64`;
//! - records are maps keyed by field name, in declaration order;
//! - parameter maps are written with keys sorted.
//!
//! The signature is not MessagePack at all: it is stored behind the node's
//! own variable-length prefix, see [`encode_length_plus_data`].

use std::collections::BTreeMap;

use thiserror::Error;

use super::types::{Envelope, FileParam, ParamValue, Payload, SmartTransaction};

/// Encoding failures. Only absurdly large inputs can trigger these.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value of {0} bytes is too large to encode")]
    TooLarge(usize),
}

// ---------------------------------------------------------------------------
// CanonicalWriter
// ---------------------------------------------------------------------------

/// Append-only MessagePack writer with fixed representation choices.
#[derive(Debug, Default)]
pub struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_nil(&mut self) {
        self.buf.push(0xc0);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(if v { 0xc3 } else { 0xc2 });
    }

    pub fn write_int(&mut self, v: i64) {
        self.buf.push(0xd3);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_float(&mut self, v: f64) {
        self.buf.push(0xcb);
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), CodecError> {
        let len = s.len();
        match len {
            0..=31 => self.buf.push(0xa0 | len as u8),
            32..=0xff => {
                self.buf.push(0xd9);
                self.buf.push(len as u8);
            }
            0x100..=0xffff => {
                self.buf.push(0xda);
                self.buf.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                self.buf.push(0xdb);
                self.buf.extend_from_slice(&len32(len)?.to_be_bytes());
            }
        }
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_bin(&mut self, b: &[u8]) -> Result<(), CodecError> {
        let len = b.len();
        match len {
            0..=0xff => {
                self.buf.push(0xc4);
                self.buf.push(len as u8);
            }
            0x100..=0xffff => {
                self.buf.push(0xc5);
                self.buf.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                self.buf.push(0xc6);
                self.buf.extend_from_slice(&len32(len)?.to_be_bytes());
            }
        }
        self.buf.extend_from_slice(b);
        Ok(())
    }

    pub fn write_array_len(&mut self, len: usize) -> Result<(), CodecError> {
        match len {
            0..=15 => self.buf.push(0x90 | len as u8),
            16..=0xffff => {
                self.buf.push(0xdc);
                self.buf.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                self.buf.push(0xdd);
                self.buf.extend_from_slice(&len32(len)?.to_be_bytes());
            }
        }
        Ok(())
    }

    pub fn write_map_len(&mut self, len: usize) -> Result<(), CodecError> {
        match len {
            0..=15 => self.buf.push(0x80 | len as u8),
            16..=0xffff => {
                self.buf.push(0xde);
                self.buf.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                self.buf.push(0xdf);
                self.buf.extend_from_slice(&len32(len)?.to_be_bytes());
            }
        }
        Ok(())
    }

    /// Append an already-encoded value.
    pub(crate) fn write_raw(&mut self, encoded: &[u8]) {
        self.buf.extend_from_slice(encoded);
    }

    /// Write a contract parameter value. Map keys come out sorted because
    /// [`ParamValue::Map`] is a `BTreeMap`.
    pub fn write_value(&mut self, value: &ParamValue) -> Result<(), CodecError> {
        match value {
            ParamValue::Null => self.write_nil(),
            ParamValue::Bool(b) => self.write_bool(*b),
            ParamValue::Int(i) => self.write_int(*i),
            ParamValue::Float(f) => self.write_float(*f),
            ParamValue::String(s) => self.write_str(s)?,
            ParamValue::Bytes(b) => self.write_bin(b)?,
            ParamValue::Array(items) => {
                self.write_array_len(items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
            }
            ParamValue::Map(map) => self.write_params(map)?,
            ParamValue::File(file) => self.write_file(file)?,
        }
        Ok(())
    }

    pub fn write_params(&mut self, params: &BTreeMap<String, ParamValue>) -> Result<(), CodecError> {
        self.write_map_len(params.len())?;
        for (key, value) in params {
            self.write_str(key)?;
            self.write_value(value)?;
        }
        Ok(())
    }

    // Keys in sorted order: Body, MimeType, Name.
    fn write_file(&mut self, file: &FileParam) -> Result<(), CodecError> {
        self.write_map_len(3)?;
        self.write_str("Body")?;
        self.write_bin(&file.body)?;
        self.write_str("MimeType")?;
        self.write_str(&file.mime_type)?;
        self.write_str("Name")?;
        self.write_str(&file.name)
    }
}

fn len32(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::TooLarge(len))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Number of fields in the encoded [`SmartTransaction`] map.
const SMART_TX_FIELDS: usize = 14;

/// Canonical bytes of a [`SmartTransaction`]. These are what get hashed.
///
/// The header is flattened into the top-level map. The two sections that do
/// not apply to the payload are written as `nil`, so every transaction has
/// the same shape.
pub fn encode_smart_transaction(tx: &SmartTransaction) -> Result<Vec<u8>, CodecError> {
    let mut w = CanonicalWriter::new();
    w.write_map_len(SMART_TX_FIELDS)?;

    let h = &tx.header;
    w.write_str("ID")?;
    w.write_int(h.contract_id);
    w.write_str("EcosystemID")?;
    w.write_int(h.ecosystem_id);
    w.write_str("KeyID")?;
    w.write_int(h.key_id);
    w.write_str("Time")?;
    w.write_int(h.time);
    w.write_str("NetworkID")?;
    w.write_int(h.network_id);
    w.write_str("PublicKey")?;
    w.write_bin(&h.public_key)?;

    w.write_str("MaxSum")?;
    w.write_str(&tx.max_sum)?;
    w.write_str("PayOver")?;
    w.write_str(&tx.pay_over)?;
    w.write_str("Lang")?;
    w.write_str(&tx.lang)?;
    w.write_str("Expedite")?;
    w.write_str(&tx.expedite)?;
    w.write_str("SignedBy")?;
    w.write_int(tx.signed_by);

    w.write_str("TransferSelf")?;
    match &tx.payload {
        Payload::SelfTransfer { amount, source, target } => {
            w.write_map_len(3)?;
            w.write_str("Value")?;
            w.write_str(amount)?;
            w.write_str("Source")?;
            w.write_str(source.as_str())?;
            w.write_str("Target")?;
            w.write_str(target.as_str())?;
        }
        _ => w.write_nil(),
    }

    w.write_str("UTXO")?;
    match &tx.payload {
        Payload::UtxoTransfer { recipient, amount, comment } => {
            w.write_map_len(3)?;
            w.write_str("ToID")?;
            w.write_int(*recipient);
            w.write_str("Value")?;
            w.write_str(amount)?;
            w.write_str("Comment")?;
            w.write_str(comment)?;
        }
        _ => w.write_nil(),
    }

    w.write_str("Params")?;
    match &tx.payload {
        Payload::ContractCall { params, .. } => w.write_params(params)?,
        _ => w.write_nil(),
    }

    Ok(w.into_bytes())
}

/// Wire form of a signed envelope, without the leading discriminant byte.
///
/// `TxSmart` is the transaction as a nested map; `Payload` carries the same
/// encoding as opaque bytes so the node can re-hash exactly what was signed.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let mut w = CanonicalWriter::new();
    w.write_map_len(5)?;
    w.write_str("TxSmart")?;
    w.write_raw(envelope.payload_bytes());
    w.write_str("Hash")?;
    w.write_bin(envelope.hash())?;
    w.write_str("Payload")?;
    w.write_bin(envelope.payload_bytes())?;
    w.write_str("Timestamp")?;
    w.write_int(envelope.timestamp_ms());
    w.write_str("TxSignature")?;
    w.write_bin(envelope.signature())?;
    Ok(w.into_bytes())
}

// ---------------------------------------------------------------------------
// Length prefix
// ---------------------------------------------------------------------------

/// Prefix `data` with its length.
///
/// Lengths up to 127 take one byte. Longer ones take `0x80 | n` followed by
/// the `n` significant bytes of the length, little-endian.
pub fn encode_length_plus_data(data: &[u8]) -> Vec<u8> {
    let len = data.len();
    let mut out = Vec::with_capacity(len + 9);
    if len <= 127 {
        out.push(len as u8);
    } else {
        let bytes = (len as u64).to_le_bytes();
        let significant = 8 - (len as u64).leading_zeros() as usize / 8;
        out.push(0x80 | significant as u8);
        out.extend_from_slice(&bytes[..significant]);
    }
    out.extend_from_slice(data);
    out
}

/// Inverse of [`encode_length_plus_data`]. Returns the data and the rest of
/// the input, or `None` if the prefix is malformed or truncated.
pub fn decode_length_plus_data(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&first, rest) = input.split_first()?;
    let (len, rest) = if first & 0x80 == 0 {
        (first as usize, rest)
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || n > 8 || rest.len() < n {
            return None;
        }
        let mut bytes = [0u8; 8];
        bytes[..n].copy_from_slice(&rest[..n]);
        (usize::try_from(u64::from_le_bytes(bytes)).ok()?, &rest[n..])
    };
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::{BalanceKind, Header};

    #[test]
    fn ints_are_always_eight_bytes() {
        let mut w = CanonicalWriter::new();
        w.write_int(1);
        assert_eq!(w.into_bytes(), vec![0xd3, 0, 0, 0, 0, 0, 0, 0, 1]);

        let mut w = CanonicalWriter::new();
        w.write_int(-1);
        assert_eq!(w.into_bytes(), vec![0xd3, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn string_headers_grow_with_length() {
        let mut w = CanonicalWriter::new();
        w.write_str("ID").unwrap();
        assert_eq!(w.into_bytes(), vec![0xa2, b'I', b'D']);

        let mut w = CanonicalWriter::new();
        w.write_str(&"x".repeat(40)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..2], &[0xd9, 40]);

        let mut w = CanonicalWriter::new();
        w.write_str(&"x".repeat(300)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..3], &[0xda, 0x01, 0x2c]);
    }

    #[test]
    fn binary_always_uses_bin_family() {
        let mut w = CanonicalWriter::new();
        w.write_bin(&[]).unwrap();
        assert_eq!(w.into_bytes(), vec![0xc4, 0]);
    }

    #[test]
    fn nested_map_keys_are_sorted() {
        let mut inner = BTreeMap::new();
        inner.insert("b".to_string(), ParamValue::Int(2));
        inner.insert("a".to_string(), ParamValue::Int(1));
        let mut w = CanonicalWriter::new();
        w.write_value(&ParamValue::Map(inner)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes[0], 0x82);
        assert_eq!(&bytes[1..3], &[0xa1, b'a']);
        assert_eq!(&bytes[12..14], &[0xa1, b'b']);
    }

    fn sample(payload: Payload) -> SmartTransaction {
        let mut tx = SmartTransaction::new(payload);
        tx.header = Header {
            contract_id: tx.header.contract_id,
            ecosystem_id: 1,
            key_id: -42,
            time: 1_700_000_000,
            network_id: 1,
            public_key: vec![9; 64],
        };
        tx
    }

    #[test]
    fn smart_transaction_shape() {
        let bytes = encode_smart_transaction(&sample(Payload::contract(5))).unwrap();
        assert_eq!(bytes[0], 0x8e);
        assert_eq!(&bytes[1..4], &[0xa2, b'I', b'D']);
        assert_eq!(&bytes[4..13], &[0xd3, 0, 0, 0, 0, 0, 0, 0, 5]);
        // Params is the last key and an empty map here.
        assert_eq!(&bytes[bytes.len() - 8..], &[0xa6, b'P', b'a', b'r', b'a', b'm', b's', 0x80]);
    }

    #[test]
    fn non_contract_payload_has_nil_params() {
        let bytes = encode_smart_transaction(&sample(Payload::SelfTransfer {
            amount: "10".into(),
            source: BalanceKind::Account,
            target: BalanceKind::Utxo,
        }))
        .unwrap();
        assert_eq!(*bytes.last().unwrap(), 0xc0);
        let needle = b"\xa6Source\xa7Account";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut params = BTreeMap::new();
        params.insert("Zeta".to_string(), ParamValue::from("z"));
        params.insert("Alpha".to_string(), ParamValue::Float(1.5));
        let tx = sample(Payload::ContractCall {
            contract_id: 3,
            params,
        });
        assert_eq!(
            encode_smart_transaction(&tx).unwrap(),
            encode_smart_transaction(&tx.clone()).unwrap()
        );
    }

    #[test]
    fn length_prefix_short_and_long() {
        let short = encode_length_plus_data(&[1, 2, 3]);
        assert_eq!(short, vec![3, 1, 2, 3]);

        let data = vec![0xab; 300];
        let long = encode_length_plus_data(&data);
        assert_eq!(&long[..3], &[0x82, 0x2c, 0x01]);
        assert_eq!(long.len(), 303);

        let edge = encode_length_plus_data(&[0u8; 128]);
        assert_eq!(&edge[..2], &[0x81, 0x80]);
    }

    #[test]
    fn length_prefix_decodes() {
        let data = vec![7u8; 200];
        let mut encoded = encode_length_plus_data(&data);
        encoded.push(0xee);
        let (decoded, rest) = decode_length_plus_data(&encoded).unwrap();
        assert_eq!(decoded, data.as_slice());
        assert_eq!(rest, &[0xee]);
        assert!(decode_length_plus_data(&[5, 1, 2]).is_none());
        assert!(decode_length_plus_data(&[0x82, 0x01]).is_none());
    }
}
