//! Core type definitions for IBAX transactions.
//!
//! A transaction is a [`SmartTransaction`]: a [`Header`] naming who sends it
//! and where, exactly one [`Payload`] saying what it does, and a handful of
//! fee and localization fields. The builder turns one into an [`Envelope`]
//! and from there into the bytes the node accepts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::validation::ValidationError;
use crate::config::{
    DELAY_TX_TYPE, FIRST_BLOCK_TX_TYPE, SMART_CONTRACT_TX_TYPE, STOP_NETWORK_TX_TYPE,
    TRANSFER_SELF_TX_TYPE, UTXO_TX_TYPE,
};

// ---------------------------------------------------------------------------
// TxType
// ---------------------------------------------------------------------------

/// Discriminant byte placed in front of every serialized transaction.
///
/// Only `SmartContract`, `Utxo` and `TransferSelf` are ever produced by a
/// client. The others exist so that bytes read back from a node can be
/// classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxType {
    FirstBlock = FIRST_BLOCK_TX_TYPE,
    StopNetwork = STOP_NETWORK_TX_TYPE,
    SmartContract = SMART_CONTRACT_TX_TYPE,
    Delay = DELAY_TX_TYPE,
    Utxo = UTXO_TX_TYPE,
    TransferSelf = TRANSFER_SELF_TX_TYPE,
}

impl TxType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TxType {
    type Error = u8;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            FIRST_BLOCK_TX_TYPE => Ok(Self::FirstBlock),
            STOP_NETWORK_TX_TYPE => Ok(Self::StopNetwork),
            SMART_CONTRACT_TX_TYPE => Ok(Self::SmartContract),
            DELAY_TX_TYPE => Ok(Self::Delay),
            UTXO_TX_TYPE => Ok(Self::Utxo),
            TRANSFER_SELF_TX_TYPE => Ok(Self::TransferSelf),
            other => Err(other),
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstBlock => write!(f, "FirstBlock"),
            Self::StopNetwork => write!(f, "StopNetwork"),
            Self::SmartContract => write!(f, "SmartContract"),
            Self::Delay => write!(f, "Delay"),
            Self::Utxo => write!(f, "Utxo"),
            Self::TransferSelf => write!(f, "TransferSelf"),
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Who is sending, to which ecosystem, on which network, and when.
///
/// `key_id` and `public_key` are filled in by the builder from the private
/// key; callers never set them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Contract id for contract calls, `0` otherwise.
    pub contract_id: i64,
    pub ecosystem_id: i64,
    pub key_id: i64,
    /// Unix seconds.
    pub time: i64,
    pub network_id: i64,
    pub public_key: Vec<u8>,
}

// ---------------------------------------------------------------------------
// BalanceKind
// ---------------------------------------------------------------------------

/// The two balance models an account holds funds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceKind {
    Account,
    #[serde(rename = "UTXO")]
    Utxo,
}

impl BalanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::Utxo => "UTXO",
        }
    }
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BalanceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Account" => Ok(Self::Account),
            "UTXO" => Ok(Self::Utxo),
            other => Err(ValidationError::UnknownBalanceKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

/// An uploaded file passed as a contract parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FileParam {
    pub name: String,
    pub mime_type: String,
    pub body: Vec<u8>,
}

/// A single contract parameter value.
///
/// Contract fields are declared with a type (`int`, `money`, `file`...) and
/// [`prepare_params`](crate::params::prepare_params) converts user input into
/// the matching variant. Maps keep their keys sorted so that encoding is
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
    File(FileParam),
}

impl ParamValue {
    /// Plain-text rendering, used when a typed value has to be re-parsed
    /// against a contract field type.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::Bytes(b) => hex::encode(b),
            Self::Array(_) | Self::Map(_) => self.to_json().to_string(),
            Self::File(file) => file.name.clone(),
        }
    }

    /// JSON view of the value. Binary data becomes hex.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::String(hex::encode(b)),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::File(file) => serde_json::json!({
                "Name": file.name,
                "MimeType": file.mime_type,
                "Body": hex::encode(&file.body),
            }),
        }
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<FileParam> for ParamValue {
    fn from(f: FileParam) -> Self {
        Self::File(f)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// What a transaction does. Exactly one of three things.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Invoke a contract by id with named parameters.
    ContractCall {
        contract_id: i64,
        params: BTreeMap<String, ParamValue>,
    },
    /// Move UTXO funds to another key. `amount` is a decimal integer string.
    UtxoTransfer {
        recipient: i64,
        amount: String,
        comment: String,
    },
    /// Move funds between the account and UTXO balances of the sender.
    SelfTransfer {
        amount: String,
        source: BalanceKind,
        target: BalanceKind,
    },
}

impl Payload {
    pub fn tx_type(&self) -> TxType {
        match self {
            Self::ContractCall { .. } => TxType::SmartContract,
            Self::UtxoTransfer { .. } => TxType::Utxo,
            Self::SelfTransfer { .. } => TxType::TransferSelf,
        }
    }

    /// Contract call with no parameters.
    pub fn contract(contract_id: i64) -> Self {
        Self::ContractCall {
            contract_id,
            params: BTreeMap::new(),
        }
    }
}

/// UTXO section of a loosely-typed payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UtxoParts {
    #[serde(default)]
    pub to_id: i64,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub comment: String,
}

/// Self-transfer section of a loosely-typed payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSelfParts {
    #[serde(default)]
    pub value: String,
    pub source: BalanceKind,
    pub target: BalanceKind,
}

/// A payload as it arrives from JSON: every section optional.
///
/// Converting into a [`Payload`] enforces that at most one section is set.
/// A request with no section at all is a parameterless contract call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadParts {
    #[serde(default)]
    pub contract_id: i64,
    #[serde(default)]
    pub params: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub utxo: Option<UtxoParts>,
    #[serde(default)]
    pub transfer_self: Option<TransferSelfParts>,
}

impl TryFrom<PayloadParts> for Payload {
    type Error = ValidationError;

    fn try_from(parts: PayloadParts) -> Result<Self, Self::Error> {
        let present = [
            parts.params.is_some(),
            parts.utxo.is_some(),
            parts.transfer_self.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if present > 1 {
            return Err(ValidationError::AmbiguousPayload);
        }

        if let Some(utxo) = parts.utxo {
            return Ok(Payload::UtxoTransfer {
                recipient: utxo.to_id,
                amount: utxo.value,
                comment: utxo.comment,
            });
        }
        if let Some(ts) = parts.transfer_self {
            return Ok(Payload::SelfTransfer {
                amount: ts.value,
                source: ts.source,
                target: ts.target,
            });
        }
        Ok(Payload::ContractCall {
            contract_id: parts.contract_id,
            params: parts
                .params
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, ParamValue::from(v)))
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// SmartTransaction
// ---------------------------------------------------------------------------

/// The signed content of every client transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartTransaction {
    pub header: Header,
    pub payload: Payload,
    pub max_sum: String,
    pub pay_over: String,
    /// Localization tag, at most two characters.
    pub lang: String,
    /// Priority fee as a decimal string in base units, or empty.
    pub expedite: String,
    /// Key id of an internal signer, `0` otherwise.
    pub signed_by: i64,
}

impl SmartTransaction {
    pub fn new(payload: Payload) -> Self {
        let contract_id = match &payload {
            Payload::ContractCall { contract_id, .. } => *contract_id,
            _ => 0,
        };
        Self {
            header: Header {
                contract_id,
                ..Header::default()
            },
            payload,
            max_sum: String::new(),
            pay_over: String::new(),
            lang: String::new(),
            expedite: String::new(),
            signed_by: 0,
        }
    }

    pub fn tx_type(&self) -> TxType {
        self.payload.tx_type()
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A signed transaction ready for the wire. Immutable once built.
#[derive(Debug, Clone)]
pub struct Envelope {
    smart: SmartTransaction,
    payload_bytes: Vec<u8>,
    hash: [u8; 32],
    signature: Vec<u8>,
    timestamp_ms: i64,
}

impl Envelope {
    pub(crate) fn new(
        smart: SmartTransaction,
        payload_bytes: Vec<u8>,
        hash: [u8; 32],
        signature: Vec<u8>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            smart,
            payload_bytes,
            hash,
            signature,
            timestamp_ms,
        }
    }

    pub fn smart(&self) -> &SmartTransaction {
        &self.smart
    }

    /// Canonical encoding of [`Self::smart`], the bytes that were hashed.
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload_bytes
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Length-prefixed signature over [`Self::hash`].
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

/// Output of [`TransactionBuilder::build`](super::TransactionBuilder::build).
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub tx_type: TxType,
    /// Discriminant byte followed by the encoded envelope.
    pub data: Vec<u8>,
    /// Double hash of the unsigned payload. This is what status queries use.
    pub hash: [u8; 32],
    pub envelope: Envelope,
}

impl BuiltTransaction {
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}
