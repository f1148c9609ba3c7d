//! JSON-RPC 2.0 transport.
//!
//! Every call is a POST of a single request object to `api_address`. Method
//! names are namespaced (`ibax.getUid`, `ibax.txStatus`, ...) and request ids
//! increase per transport instance. Byte payloads travel as base64 strings.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::{
    ContractInfo, LoginRequest, LoginResponse, MultiTxInfoResult, Transport, TransportError,
    TxInfoResult, UidResponse,
};
use crate::config::RPC_NAMESPACE;
use crate::session::Session;
use crate::status::{RawTxStatus, StatusSource};

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, name: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: format!("{RPC_NAMESPACE}.{name}"),
            params,
        }
    }
}

/// Exactly one of `result` or `error` is set by a conforming node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    /// The result value. A missing or `null` result is `EmptyResult`.
    pub fn into_result(self) -> Result<Value, TransportError> {
        self.into_optional()?.ok_or(TransportError::EmptyResult)
    }

    /// Like [`into_result`](Self::into_result), but a missing or `null`
    /// result is `None` rather than an error.
    pub fn into_optional(self) -> Result<Option<Value>, TransportError> {
        if let Some(e) = self.error {
            return Err(TransportError::Rpc {
                code: e.code,
                message: e.message,
                data: e.data,
            });
        }
        match self.result {
            Some(Value::Null) | None => Ok(None),
            Some(v) => Ok(Some(v)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendTxResult {
    #[serde(default)]
    hashes: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    client: Client,
    endpoint: Url,
    session: Session,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcTransport {
    pub fn new(session: Session) -> Result<Self, TransportError> {
        let config = session.config();
        let endpoint = Url::parse(&config.api_address)?;
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self {
            client,
            endpoint,
            session,
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    async fn call<T: DeserializeOwned>(&self, name: &str, params: Value) -> Result<T, TransportError> {
        let response = self.send(name, params).await?;
        Ok(serde_json::from_value(response.into_result()?)?)
    }

    /// For methods where a `null` result is a valid "nothing yet" answer.
    async fn call_optional<T: DeserializeOwned + Default>(
        &self,
        name: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        match self.send(name, params).await?.into_optional()? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(T::default()),
        }
    }

    async fn send(&self, name: &str, params: Value) -> Result<RpcResponse, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let request = RpcRequest::new(id, name, params);
        debug!(id, method = %request.method, "rpc call");

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(value) = self.session.authorization() {
            builder = builder.header(reqwest::header::AUTHORIZATION, value);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            if status == StatusCode::UNAUTHORIZED {
                warn!("node rejected token, clearing session");
                self.session.clear_token();
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl StatusSource for JsonRpcTransport {
    async fn query_status(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, RawTxStatus>, TransportError> {
        self.call_optional("txStatus", json!([hashes.join(",")])).await
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn get_uid(&self) -> Result<UidResponse, TransportError> {
        self.call("getUid", Value::Null).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, TransportError> {
        self.call("login", json!([request])).await
    }

    async fn get_contract(&self, name: &str) -> Result<ContractInfo, TransportError> {
        if name.is_empty() {
            return Err(TransportError::InvalidRequest("empty contract name".into()));
        }
        self.call("getContractInfo", json!([name])).await
    }

    async fn send_tx(
        &self,
        txs: &BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, String>, TransportError> {
        let encoded: BTreeMap<&str, String> = txs
            .iter()
            .map(|(hash, data)| (hash.as_str(), BASE64.encode(data)))
            .collect();
        let result: SendTxResult = self.call("sendTx", json!([encoded])).await?;
        Ok(result.hashes)
    }

    async fn tx_info(&self, hash: &str, with_contract: bool) -> Result<TxInfoResult, TransportError> {
        self.call("txInfo", json!([hash, with_contract])).await
    }

    async fn tx_info_multi(
        &self,
        hashes: &[String],
        with_contract: bool,
    ) -> Result<MultiTxInfoResult, TransportError> {
        if hashes.is_empty() {
            return Err(TransportError::InvalidRequest("no hashes given".into()));
        }
        self.call("txInfoMultiple", json!([hashes, with_contract])).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use std::time::Duration;

    use super::*;
    use crate::session::ClientConfig;
    use crate::status::{StatusPoller, TxOutcome};

    fn transport(url: &str) -> (JsonRpcTransport, Session) {
        let session = Session::new(ClientConfig {
            api_address: url.to_string(),
            enable_rpc: true,
            ..ClientConfig::default()
        })
        .unwrap();
        (JsonRpcTransport::new(session.clone()).unwrap(), session)
    }

    fn rpc_response(result: Value) -> String {
        json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
    }

    #[test]
    fn test_request_shape() {
        let req = RpcRequest::new(7, "getUid", Value::Null);
        let text = serde_json::to_string(&req).unwrap();
        assert_eq!(text, r#"{"jsonrpc":"2.0","id":7,"method":"ibax.getUid"}"#);
    }

    #[test]
    fn test_error_and_empty_result() {
        let err: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"bad params"}}"#,
        )
        .unwrap();
        assert!(matches!(
            err.into_result(),
            Err(TransportError::Rpc { code: -32602, .. })
        ));

        let empty: RpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert!(matches!(empty.into_result(), Err(TransportError::EmptyResult)));

        let null: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(matches!(null.into_optional(), Ok(None)));
    }

    #[tokio::test]
    async fn test_get_uid_and_incrementing_ids() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Regex(r#""id":1,"method":"ibax.getUid""#.into()))
            .with_status(200)
            .with_body(rpc_response(json!({ "uid": "u1", "network_id": "1" })))
            .create_async()
            .await;
        let second = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#""id":2,"method":"ibax.getUid""#.into()))
            .with_status(200)
            .with_body(rpc_response(json!({ "uid": "u2" })))
            .create_async()
            .await;

        let (rpc, _) = transport(&server.url());
        assert_eq!(rpc.get_uid().await.unwrap().uid, "u1");
        assert_eq!(rpc.get_uid().await.unwrap().uid, "u2");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_tx_base64() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(
                r#""method":"ibax.sendTx","params":\[\{"aa11":"AwEC"\}\]"#.into(),
            ))
            .with_status(200)
            .with_body(rpc_response(json!({ "hashes": { "aa11": "aa11" } })))
            .create_async()
            .await;

        let (rpc, _) = transport(&server.url());
        let mut txs = BTreeMap::new();
        txs.insert("aa11".to_string(), vec![3, 1, 2]);
        let accepted = rpc.send_tx(&txs).await.unwrap();
        assert_eq!(accepted.len(), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_tx_status_comma_joined() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(
                r#""method":"ibax.txStatus","params":\["h1,h2"\]"#.into(),
            ))
            .with_status(200)
            .with_body(rpc_response(json!({
                "h2": { "blockid": "", "errmsg": { "type": "error", "error": "boom" } }
            })))
            .create_async()
            .await;

        let (rpc, _) = transport(&server.url());
        let results = rpc
            .tx_status(&["h1".to_string(), "h2".to_string()])
            .await
            .unwrap();
        assert_eq!(results["h2"].errmsg.as_ref().unwrap().error, "boom");
    }

    #[tokio::test]
    async fn test_tx_status_null_result_keeps_polling() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#""method":"ibax.txStatus""#.into()))
            .with_status(200)
            .with_body(rpc_response(Value::Null))
            .expect(2)
            .create_async()
            .await;

        let (rpc, _) = transport(&server.url());
        assert!(rpc.tx_status(&["aa".to_string()]).await.unwrap().is_empty());

        let record = StatusPoller::new(&rpc)
            .poll_one("aa", 1, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(record.outcome, TxOutcome::Exhausted);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_tx_info_numeric_block_id() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#""params":\["h1",true\]"#.into()))
            .with_status(200)
            .with_body(rpc_response(json!({ "blockid": 12, "confirm": 2 })))
            .create_async()
            .await;

        let (rpc, _) = transport(&server.url());
        let info = rpc.tx_info("h1", true).await.unwrap();
        assert_eq!(info.block_id, 12);
        assert_eq!(info.confirm, 2);
    }

    #[tokio::test]
    async fn test_rpc_error_and_token_header() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer jwt")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"contract not found"}}"#)
            .create_async()
            .await;

        let (rpc, session) = transport(&server.url());
        session.update(|s| s.token = "jwt".into());
        match rpc.get_contract("Nope").await {
            Err(TransportError::Rpc { message, .. }) => assert_eq!(message, "contract not found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let (rpc, _) = transport(&server.url());
        assert!(matches!(
            rpc.get_uid().await,
            Err(TransportError::Status { status: 500, .. })
        ));
    }
}
