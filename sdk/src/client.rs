//! # IBAX Client
//!
//! [`Client`] ties the pieces together: it owns the [`Session`], talks to the
//! node through a [`Transport`], builds transactions with the
//! [`TransactionBuilder`] and waits for them with the [`StatusPoller`].
//!
//! ```no_run
//! # async fn run() -> ibax_sdk::error::Result<()> {
//! use ibax_sdk::client::Client;
//! use ibax_sdk::params::ParamSource;
//! use ibax_sdk::session::ClientConfig;
//!
//! let client = Client::new(ClientConfig::load(std::path::Path::new("ibax.toml"))?)?;
//! client.auto_login().await?;
//! let source = ParamSource::from_query("Recipient=0666-0819-6016-3838-0001&Amount=1000");
//! if let Some(record) = client.call_contract("@1TokensSend", &source, "").await? {
//!     println!("{}: {}", record.hash, record.outcome);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::BLACK_HOLE_ADDRESS;
use crate::crypto::string_to_address;
use crate::error::{Result, SdkError};
use crate::params::{prepare_params, ParamSource};
use crate::session::{parse_lifetime, ClientConfig, ConfigError, Session};
use crate::status::{PollOptions, StatusPoller, TxStatusRecord};
use crate::transaction::{
    expedite_from_units, validate_amount, BalanceKind, BuiltTransaction, ParamValue, Payload,
    TransactionBuilder,
};
use crate::transport::{
    ContractInfo, JsonRpcTransport, LoginRequest, LoginResponse, MultiTxInfoResult,
    RestTransport, Transport, TxInfoResult, UidResponse,
};

/// The three kinds of value transfer outside contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtxoKind {
    /// Send UTXO value to another key. Reads `recipient`, `amount`, `comment`.
    Transfer,
    /// Move own value from the account balance into UTXO. Reads `amount`.
    AccountToUtxo,
    /// Move own value from UTXO back into the account balance. Reads `amount`.
    UtxoToAccount,
}

pub struct Client {
    session: Session,
    transport: Arc<dyn Transport>,
    poll: PollOptions,
    cancel: CancellationToken,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("poll", &self.poll)
            .finish()
    }
}

impl Client {
    /// Connect with REST or JSON-RPC depending on `config.enable_rpc`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let poll = config.poll_options();
        let rpc = config.enable_rpc;
        let session = Session::new(config)?;
        let transport: Arc<dyn Transport> = if rpc {
            Arc::new(JsonRpcTransport::new(session.clone())?)
        } else {
            Arc::new(RestTransport::new(session.clone())?)
        };
        Ok(Self::with_transport(session, transport, poll))
    }

    /// Use a custom transport, e.g. an in-process node.
    pub fn with_transport(session: Session, transport: Arc<dyn Transport>, poll: PollOptions) -> Self {
        Self {
            session,
            transport,
            poll,
            cancel: CancellationToken::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn poll_options(&self) -> PollOptions {
        self.poll
    }

    /// Token that aborts every poll this client runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort in-flight polls. Later polls fail immediately.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Ask the node for a login challenge, or refresh the token expiry when
    /// already logged in. Switches algorithms if the node uses other ones.
    pub async fn get_uid(&self) -> Result<UidResponse> {
        let resp = self.transport.get_uid().await?;
        let logged_in = !self.session.snapshot().token.is_empty();

        if logged_in && !resp.expire.is_empty() {
            let lifetime = parse_lifetime(&resp.expire).ok_or_else(|| {
                SdkError::UnexpectedResponse(format!("token lifetime {:?}", resp.expire))
            })?;
            let lifetime = chrono::Duration::from_std(lifetime)
                .map_err(|e| SdkError::UnexpectedResponse(e.to_string()))?;
            let expires = Utc::now() + lifetime;
            self.session.update(|s| s.token_expires_at = Some(expires));
            debug!(%expires, "token expiry refreshed");
            return Ok(resp);
        }

        let network_id: i64 = resp.network_id.trim().parse().map_err(|_| {
            SdkError::UnexpectedResponse(format!("network id {:?}", resp.network_id))
        })?;
        self.session.update(|s| {
            s.token = resp.token.clone();
            s.uid = resp.uid.clone();
            s.network_id = network_id;
        });

        if !resp.cryptoer.is_empty() && !resp.hasher.is_empty() {
            self.session.reinit(&resp.cryptoer, &resp.hasher)?;
        }
        Ok(resp)
    }

    /// Sign the current uid challenge and exchange it for a token.
    /// `role_id` 0 logs in without a role.
    pub async fn login(&self, role_id: i64) -> Result<LoginResponse> {
        let state = self.session.snapshot();
        let key = state.private_key.as_ref().ok_or(ConfigError::MissingKey)?;
        let challenge = format!("LOGIN{}{}", state.network_id, state.uid);
        let signature = state.suite.sign(key, challenge.as_bytes())?;

        let request = LoginRequest {
            ecosystem_id: state.config.ecosystem,
            expire: 0,
            public_key: hex::encode(&state.public_key),
            key_id: state.key_id.to_string(),
            signature: hex::encode(signature),
            role_id,
        };
        let resp = self.transport.login(&request).await?;
        self.session.update(|s| s.token = resp.token.clone());
        info!(
            key_id = state.key_id,
            ecosystem = state.config.ecosystem,
            role_id,
            "logged in"
        );
        Ok(resp)
    }

    /// Make sure a token with at least ten minutes left is available.
    pub async fn auto_login(&self) -> Result<()> {
        if self.session.snapshot().token_is_fresh(Utc::now()) {
            return Ok(());
        }
        self.session.clear_token();
        self.get_uid().await?;
        self.login(0).await?;
        self.get_uid().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Contracts
    // -----------------------------------------------------------------------

    pub async fn get_contract(&self, name: &str) -> Result<ContractInfo> {
        Ok(self.transport.get_contract(name).await?)
    }

    /// Look up the contract and resolve its parameters from `source`.
    /// Returns the contract id and the typed parameters.
    pub async fn prepare_contract_tx(
        &self,
        name: &str,
        source: &ParamSource,
    ) -> Result<(i64, BTreeMap<String, ParamValue>)> {
        let info = self.transport.get_contract(name).await?;
        let params = prepare_params(&info, source)?;
        Ok((info.id, params))
    }

    /// Build a signed contract call. `expedite_units` counts smallest fee
    /// units; empty means no priority fee.
    pub fn new_contract_transaction(
        &self,
        contract_id: i64,
        params: BTreeMap<String, ParamValue>,
        expedite_units: &str,
    ) -> Result<BuiltTransaction> {
        let expedite = normalize_expedite(expedite_units)?;
        self.build(Payload::ContractCall { contract_id, params }, expedite)
    }

    /// Prepare, build, submit and, unless `source` has `nowait`, wait for
    /// the outcome.
    pub async fn call_contract(
        &self,
        name: &str,
        source: &ParamSource,
        expedite_units: &str,
    ) -> Result<Option<TxStatusRecord>> {
        let expedite = normalize_expedite(expedite_units)?;
        let (contract_id, params) = self.prepare_contract_tx(name, source).await?;
        let built = self.build(Payload::ContractCall { contract_id, params }, expedite)?;
        self.submit_and_wait(built, source).await
    }

    // -----------------------------------------------------------------------
    // UTXO
    // -----------------------------------------------------------------------

    pub fn new_utxo_transaction(
        &self,
        kind: UtxoKind,
        source: &ParamSource,
        expedite_units: &str,
    ) -> Result<BuiltTransaction> {
        let expedite = normalize_expedite(expedite_units)?;
        let amount = source
            .get("amount")
            .filter(|a| !a.is_empty())
            .ok_or_else(|| SdkError::invalid("amount", "empty"))?;
        validate_amount(&amount)?;

        let payload = match kind {
            UtxoKind::Transfer => {
                let recipient = source
                    .get("recipient")
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| SdkError::invalid("recipient", "empty"))?;
                Payload::UtxoTransfer {
                    recipient: parse_recipient(&recipient)?,
                    amount,
                    comment: source.get("comment").unwrap_or_default(),
                }
            }
            UtxoKind::AccountToUtxo => Payload::SelfTransfer {
                amount,
                source: BalanceKind::Account,
                target: BalanceKind::Utxo,
            },
            UtxoKind::UtxoToAccount => Payload::SelfTransfer {
                amount,
                source: BalanceKind::Utxo,
                target: BalanceKind::Account,
            },
        };
        self.build(payload, expedite)
    }

    pub async fn call_utxo(
        &self,
        kind: UtxoKind,
        source: &ParamSource,
        expedite_units: &str,
    ) -> Result<Option<TxStatusRecord>> {
        let built = self.new_utxo_transaction(kind, source, expedite_units)?;
        self.submit_and_wait(built, source).await
    }

    // -----------------------------------------------------------------------
    // Submission and status
    // -----------------------------------------------------------------------

    /// Submit built transactions. Returns the hashes the node accepted.
    pub async fn send_tx(&self, txs: &[BuiltTransaction]) -> Result<BTreeMap<String, String>> {
        let batch: BTreeMap<String, Vec<u8>> = txs
            .iter()
            .map(|tx| (tx.hash_hex(), tx.data.clone()))
            .collect();
        let accepted = self.transport.send_tx(&batch).await?;
        info!(submitted = batch.len(), accepted = accepted.len(), "transactions sent");
        Ok(accepted)
    }

    /// Poll one hash. Exhausting `attempts` is not an error.
    pub async fn tx_status(
        &self,
        hash: &str,
        attempts: u32,
        interval: Duration,
    ) -> Result<TxStatusRecord> {
        Ok(StatusPoller::new(self.transport.as_ref())
            .with_cancellation(self.cancel.clone())
            .with_batch_retries(self.poll.batch_retries)
            .poll_one(hash, attempts, interval)
            .await?)
    }

    /// Poll several hashes until at least one resolves.
    pub async fn txs_status(
        &self,
        hashes: &[String],
        interval: Duration,
    ) -> Result<HashMap<String, TxStatusRecord>> {
        Ok(StatusPoller::new(self.transport.as_ref())
            .with_cancellation(self.cancel.clone())
            .with_batch_retries(self.poll.batch_retries)
            .poll_many(hashes, interval)
            .await?)
    }

    pub async fn tx_info(&self, hash: &str, with_contract: bool) -> Result<TxInfoResult> {
        Ok(self.transport.tx_info(hash, with_contract).await?)
    }

    pub async fn tx_info_multi(
        &self,
        hashes: &[String],
        with_contract: bool,
    ) -> Result<MultiTxInfoResult> {
        Ok(self.transport.tx_info_multi(hashes, with_contract).await?)
    }

    fn build(&self, payload: Payload, expedite: String) -> Result<BuiltTransaction> {
        let state = self.session.snapshot();
        let key = state.private_key.as_ref().ok_or(ConfigError::MissingKey)?;
        Ok(TransactionBuilder::new(payload)
            .ecosystem(state.config.ecosystem)
            .network(state.network_id)
            .expedite(expedite)
            .build(&state.suite, key)?)
    }

    async fn submit_and_wait(
        &self,
        built: BuiltTransaction,
        source: &ParamSource,
    ) -> Result<Option<TxStatusRecord>> {
        let hash = built.hash_hex();
        self.send_tx(std::slice::from_ref(&built)).await?;
        if source.has("nowait") {
            debug!(%hash, "not waiting for status");
            return Ok(None);
        }
        let record = self
            .tx_status(&hash, self.poll.attempts, self.poll.interval)
            .await?;
        Ok(Some(record))
    }
}

fn normalize_expedite(units: &str) -> Result<String> {
    if units.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(expedite_from_units(units.trim())?)
}

/// Accepts `XXXX-XXXX-XXXX-XXXX-XXXX` or a numeric key id. Zero is only
/// accepted spelled as the black hole address.
fn parse_recipient(recipient: &str) -> Result<i64> {
    let recipient = recipient.trim();
    let id = string_to_address(recipient)
        .ok()
        .or_else(|| recipient.parse::<i64>().ok())
        .ok_or_else(|| SdkError::invalid("recipient", format!("{recipient} is not valid")))?;
    if id == 0 && recipient != BLACK_HOLE_ADDRESS {
        return Err(SdkError::invalid("recipient", format!("{recipient} is not valid")));
    }
    Ok(id)
}
