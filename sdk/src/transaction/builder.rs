//! Transaction construction via the builder pattern.
//!
//! [`TransactionBuilder`] collects the caller-facing fields, and
//! [`TransactionBuilder::build`] runs the full pipeline in one go:
//!
//! 1. derive the public key and key id from the private key;
//! 2. capture the timestamp once;
//! 3. encode the [`SmartTransaction`] canonically and double-hash it;
//! 4. validate;
//! 5. sign the hash and check the signature against the derived key;
//! 6. encode the wire envelope behind its discriminant byte.
//!
//! The returned hash covers the *unsigned* payload. That is the id the node
//! reports status under, so it is the one to poll with.
//!
//! Nothing escapes a failed build: every step returns early on error.

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use super::codec::{encode_envelope, encode_length_plus_data, encode_smart_transaction, CodecError};
use super::types::{BuiltTransaction, Envelope, Header, Payload, SmartTransaction};
use super::validation::ValidationError;
use crate::crypto::{CryptoError, CryptoSuite, PrivateKey};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a build failed. The variant names the step.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("deriving public key: {0}")]
    KeyDerivation(#[source] CryptoError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("signing: {0}")]
    Signing(#[source] CryptoError),

    #[error("encoding: {0}")]
    Encoding(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for signed transactions.
///
/// ```
/// use ibax_sdk::crypto::{CryptoSuite, PrivateKey};
/// use ibax_sdk::transaction::{Payload, TransactionBuilder};
///
/// let key = PrivateKey::from_bytes(&[7u8; 32]).unwrap();
/// let built = TransactionBuilder::new(Payload::contract(5))
///     .ecosystem(1)
///     .network(1)
///     .timestamp(1_700_000_000)
///     .build(&CryptoSuite::default(), &key)
///     .unwrap();
/// assert_eq!(built.data[0], 3);
/// assert_eq!(built.hash_hex().len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    payload: Payload,
    ecosystem_id: i64,
    network_id: i64,
    expedite: String,
    lang: String,
    max_sum: String,
    pay_over: String,
    timestamp: Option<i64>,
    internal: bool,
}

impl TransactionBuilder {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            ecosystem_id: 1,
            network_id: 0,
            expedite: String::new(),
            lang: String::new(),
            max_sum: String::new(),
            pay_over: String::new(),
            timestamp: None,
            internal: false,
        }
    }

    pub fn ecosystem(mut self, ecosystem_id: i64) -> Self {
        self.ecosystem_id = ecosystem_id;
        self
    }

    pub fn network(mut self, network_id: i64) -> Self {
        self.network_id = network_id;
        self
    }

    /// Priority fee in base units, e.g. `"0.000000001"`. Empty for none.
    pub fn expedite(mut self, expedite: impl Into<String>) -> Self {
        self.expedite = expedite.into();
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn max_sum(mut self, max_sum: impl Into<String>) -> Self {
        self.max_sum = max_sum.into();
        self
    }

    pub fn pay_over(mut self, pay_over: impl Into<String>) -> Self {
        self.pay_over = pay_over.into();
        self
    }

    /// Override the creation time, in Unix seconds. Without this the
    /// current time is used, which makes the hash differ between builds.
    pub fn timestamp(mut self, unix_secs: i64) -> Self {
        self.timestamp = Some(unix_secs);
        self
    }

    /// Mark the transaction as signed by an internal key: `SignedBy` is set
    /// to the signer's key id.
    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    /// Assemble, hash, validate, sign and encode.
    pub fn build(self, suite: &CryptoSuite, key: &PrivateKey) -> Result<BuiltTransaction, BuildError> {
        let public_key = suite.public_key(key).map_err(BuildError::KeyDerivation)?;
        let key_id = suite.address(&public_key);

        let (time, timestamp_ms) = match self.timestamp {
            Some(secs) => (secs, secs.saturating_mul(1000)),
            None => {
                let now = Utc::now();
                (now.timestamp(), now.timestamp_millis())
            }
        };

        let mut smart = SmartTransaction::new(self.payload);
        smart.header = Header {
            contract_id: smart.header.contract_id,
            ecosystem_id: self.ecosystem_id,
            key_id,
            time,
            network_id: self.network_id,
            public_key: public_key.clone(),
        };
        smart.expedite = self.expedite;
        smart.lang = self.lang;
        smart.max_sum = self.max_sum;
        smart.pay_over = self.pay_over;
        if self.internal {
            smart.signed_by = key_id;
        }

        let payload_bytes = encode_smart_transaction(&smart)?;
        let hash = suite.double_hash(&payload_bytes);

        smart.validate()?;

        let raw_signature = suite.sign(key, &hash).map_err(BuildError::Signing)?;
        suite
            .verify(&public_key, &hash, &raw_signature)
            .map_err(BuildError::Signing)?;
        let signature = encode_length_plus_data(&raw_signature);

        let tx_type = smart.tx_type();
        let envelope = Envelope::new(smart, payload_bytes, hash, signature, timestamp_ms);
        let body = encode_envelope(&envelope)?;

        let mut data = Vec::with_capacity(body.len() + 1);
        data.push(tx_type.as_byte());
        data.extend_from_slice(&body);

        debug!(
            tx_type = %tx_type,
            hash = %hex::encode(hash),
            size = data.len(),
            "transaction built"
        );

        Ok(BuiltTransaction {
            tx_type,
            data,
            hash,
            envelope,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
