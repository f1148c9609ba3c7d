//! REST transport.
//!
//! Requests go to `{api_address}{api_path}{endpoint}`. Plain calls send
//! URL-encoded forms, `sendTx` sends one multipart file part per transaction
//! named by its hash. A 401 from any endpoint clears the session token so the
//! next `auto_login` starts over.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{
    ContractInfo, LoginRequest, LoginResponse, MultiTxInfoResult, Transport, TransportError,
    TxInfoResult, UidResponse,
};
use crate::session::Session;
use crate::status::{RawTxStatus, StatusSource};

#[derive(Debug, Deserialize)]
struct SendTxResponse {
    #[serde(default)]
    hashes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    results: HashMap<String, RawTxStatus>,
}

#[derive(Debug, Clone)]
pub struct RestTransport {
    client: Client,
    base: Url,
    session: Session,
}

impl RestTransport {
    pub fn new(session: Session) -> Result<Self, TransportError> {
        let config = session.config();
        let mut path = config.api_path.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        let base = Url::parse(config.api_address.trim_end_matches('/'))?.join(&path)?;
        let client = Client::builder().timeout(config.http_timeout()).build()?;
        Ok(Self {
            client,
            base,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.authorization() {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let response = self.authorize(request).send().await?;
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

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        self.send(self.client.post(url).form(form)).await
    }
}

#[async_trait]
impl StatusSource for RestTransport {
    async fn query_status(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, RawTxStatus>, TransportError> {
        let data = serde_json::json!({ "hashes": hashes }).to_string();
        let response: StatusResponse = self.post_form("txstatus", &[("data", data)]).await?;
        Ok(response.results)
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn get_uid(&self) -> Result<UidResponse, TransportError> {
        self.get("getuid").await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, TransportError> {
        let mut form = vec![
            ("pubkey", request.public_key.clone()),
            ("signature", request.signature.clone()),
            ("ecosystem", request.ecosystem_id.to_string()),
        ];
        if request.role_id != 0 {
            form.push(("role_id", request.role_id.to_string()));
        }
        self.post_form("login", &form).await
    }

    async fn get_contract(&self, name: &str) -> Result<ContractInfo, TransportError> {
        if name.is_empty() {
            return Err(TransportError::InvalidRequest("empty contract name".into()));
        }
        self.get(&format!("contract/{name}")).await
    }

    async fn send_tx(
        &self,
        txs: &BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, String>, TransportError> {
        let mut form = Form::new();
        for (hash, data) in txs {
            form = form.part(hash.clone(), Part::bytes(data.clone()).file_name(hash.clone()));
        }
        let url = self.endpoint("sendTx")?;
        debug!(%url, count = txs.len(), "POST multipart");
        let response: SendTxResponse = self.send(self.client.post(url).multipart(form)).await?;
        Ok(response.hashes)
    }

    async fn tx_info(&self, hash: &str, with_contract: bool) -> Result<TxInfoResult, TransportError> {
        let mut path = format!("txinfo/{hash}");
        if with_contract {
            path.push_str("?contractinfo=1");
        }
        self.get(&path).await
    }

    async fn tx_info_multi(
        &self,
        hashes: &[String],
        with_contract: bool,
    ) -> Result<MultiTxInfoResult, TransportError> {
        if hashes.is_empty() {
            return Err(TransportError::InvalidRequest("no hashes given".into()));
        }
        let mut path = format!("txinfomultiple?data={}", hashes.join(","));
        if with_contract {
            path.push_str("&contractinfo=1");
        }
        self.get(&path).await
    }
}
