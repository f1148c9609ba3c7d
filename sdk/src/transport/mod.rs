//! # Transport Module
//!
//! Node-facing I/O: submitting transactions, querying their status, and the
//! metadata calls (uid, login, contract info) the client needs to build them.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs      — Transport trait, TransportError and response shapes
//! rest.rs     — REST API: form posts, multipart submission
//! jsonrpc.rs  — JSON-RPC 2.0 API, methods namespaced `ibax.*`
//! ```
//!
//! Both transports read credentials from a shared
//! [`Session`](crate::session::Session) and attach
//! `Authorization: <jwt_prefix><token>` whenever a token is present. Neither
//! interprets the responses beyond decoding them: applying a uid response to
//! the session is the client's job.

pub mod jsonrpc;
pub mod rest;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::status::{RawTxStatus, StatusSource};

pub use jsonrpc::JsonRpcTransport;
pub use rest::RestTransport;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The node answered with a non-200 status.
    #[error("node returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("no result in JSON-RPC response")]
    EmptyResult,

    #[error("decoding response: {0}")]
    Decode(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// `getuid`: a login challenge, or the remaining lifetime of the current token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UidResponse {
    pub uid: String,
    pub token: String,
    /// Remaining token lifetime, e.g. `"35m12s"`. Only set when logged in.
    pub expire: String,
    pub ecosystem_id: String,
    pub key_id: String,
    pub address: String,
    pub network_id: String,
    pub cryptoer: String,
    pub hasher: String,
}

/// Signed answer to a uid challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub ecosystem_id: i64,
    pub expire: i64,
    /// Hex `X || Y`.
    pub public_key: String,
    pub key_id: String,
    /// Hex signature over `"LOGIN" + network_id + uid`.
    pub signature: String,
    pub role_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_id: i64,
    pub role_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    pub token: String,
    pub ecosystem_id: String,
    pub key_id: String,
    pub account: String,
    pub notify_key: String,
    #[serde(rename = "isnode")]
    pub is_node: bool,
    #[serde(rename = "isowner")]
    pub is_owner: bool,
    #[serde(rename = "clb")]
    pub is_clb: bool,
    pub timestamp: String,
    pub roles: Vec<Role>,
}

/// One declared input of a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractInfo {
    pub id: i64,
    #[serde(rename = "state")]
    pub state_id: i64,
    #[serde(rename = "tableid")]
    pub table_id: String,
    #[serde(rename = "walletid")]
    pub wallet_id: String,
    #[serde(rename = "tokenid")]
    pub token_id: String,
    pub address: String,
    pub fields: Vec<ContractField>,
    pub name: String,
    pub app_id: i64,
    pub ecosystem: i64,
    pub conditions: String,
}

/// Transaction details as recorded in a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxInfo {
    pub block_id: i64,
    pub block_hash: String,
    pub address: String,
    pub ecosystem: i64,
    pub hash: String,
    pub expedite: String,
    pub contract_name: String,
    pub params: Option<serde_json::Map<String, serde_json::Value>>,
    pub created_at: i64,
    pub size: String,
    /// 0 on success, 1 when penalized.
    pub status: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxInfoResult {
    /// Zero while the transaction is not in a block.
    #[serde(rename = "blockid", deserialize_with = "int_or_string")]
    pub block_id: i64,
    pub confirm: i64,
    pub data: Option<TxInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTxInfoResult {
    pub results: BTreeMap<String, TxInfoResult>,
}

/// REST sends block ids as strings, JSON-RPC as numbers. Anything else,
/// including an empty string, reads as 0.
fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
        Other(serde_json::Value),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n,
        Raw::Str(s) => s.trim().parse().unwrap_or(0),
        Raw::Other(_) => 0,
    })
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// A connection to an IBAX node.
///
/// Implementations are stateless apart from the shared session, so one
/// transport may serve concurrent calls.
#[async_trait]
pub trait Transport: StatusSource {
    async fn get_uid(&self) -> Result<UidResponse, TransportError>;

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, TransportError>;

    async fn get_contract(&self, name: &str) -> Result<ContractInfo, TransportError>;

    /// Submit signed transactions keyed by hex hash. Returns the hashes the
    /// node accepted.
    async fn send_tx(
        &self,
        txs: &BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, String>, TransportError>;

    /// One status query, no polling.
    async fn tx_status(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, RawTxStatus>, TransportError> {
        self.query_status(hashes).await
    }

    async fn tx_info(&self, hash: &str, with_contract: bool)
        -> Result<TxInfoResult, TransportError>;

    async fn tx_info_multi(
        &self,
        hashes: &[String],
        with_contract: bool,
    ) -> Result<MultiTxInfoResult, TransportError>;
}
