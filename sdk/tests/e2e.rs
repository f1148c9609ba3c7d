//! End-to-end tests for the IBAX SDK.
//!
//! These run the whole path a caller takes: derive keys, build and sign a
//! contract call, submit it, and poll until the node reports a block. The
//! node is an in-process stub, so the tests need no network and the clock
//! can be paused.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ibax_sdk::client::Client;
use ibax_sdk::crypto::{address_to_string, CryptoSuite, PrivateKey};
use ibax_sdk::params::ParamSource;
use ibax_sdk::session::{ClientConfig, Session};
use ibax_sdk::status::{PollOptions, RawTxStatus, StatusPoller, StatusSource, TxOutcome};
use ibax_sdk::transaction::{ParamValue, Payload, TransactionBuilder, TxType};
use ibax_sdk::transport::{
    ContractField, ContractInfo, LoginRequest, LoginResponse, MultiTxInfoResult, Transport,
    TransportError, TxInfoResult, UidResponse,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const GOLDEN_HASH: &str = "8765e01f870b3788cf6f66eb13fddaa8067c6fd04953aec5d7adf0c94367b346";
const GOLDEN_AMOUNT_ONLY_HASH: &str =
    "d5debabf09ad5cef06c08aada813155aa277221a1d35f2153e40cc3462f008d8";
const GOLDEN_PUBLIC_KEY: &str = "515c3d6eb9e396b904d3feca7f54fdcd0cc1e997bf375dca515ad0a6c3b4035f\
                                 4536be3a50f318fbf9a5475902a221502bef0d57e08c53b2cc0a56f17d9f9354";
const GOLDEN_ADDRESS: &str = "0962-4975-0996-8070-9143";

fn fixed_key() -> PrivateKey {
    let bytes: Vec<u8> = (1..=32).collect();
    PrivateKey::from_bytes(&bytes).unwrap()
}

fn transfer_params() -> BTreeMap<String, ParamValue> {
    let mut params = BTreeMap::new();
    params.insert("Amount".to_string(), ParamValue::from("100"));
    params.insert(
        "Recipient".to_string(),
        ParamValue::from("1430-1492-4302-5485-5729"),
    );
    params
}

/// Accepts everything it is sent and reports every known hash in block 42
/// once `pending_rounds` status queries have passed.
#[derive(Default)]
struct StubNode {
    submitted: Mutex<BTreeMap<String, Vec<u8>>>,
    status_queries: AtomicUsize,
    pending_rounds: usize,
}

#[async_trait]
impl StatusSource for StubNode {
    async fn query_status(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, RawTxStatus>, TransportError> {
        let round = self.status_queries.fetch_add(1, Ordering::SeqCst);
        if round < self.pending_rounds {
            return Ok(HashMap::new());
        }
        let submitted = self.submitted.lock();
        Ok(hashes
            .iter()
            .filter(|h| submitted.contains_key(*h))
            .map(|h| {
                (
                    h.clone(),
                    RawTxStatus {
                        blockid: "42".into(),
                        penalty: 0,
                        ..RawTxStatus::default()
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl Transport for StubNode {
    async fn get_uid(&self) -> Result<UidResponse, TransportError> {
        Ok(UidResponse {
            uid: "100".into(),
            expire: "1h0m0s".into(),
            network_id: "1".into(),
            ..UidResponse::default()
        })
    }

    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, TransportError> {
        Ok(LoginResponse {
            token: "jwt".into(),
            ..LoginResponse::default()
        })
    }

    async fn get_contract(&self, name: &str) -> Result<ContractInfo, TransportError> {
        let field = |name: &str, kind: &str| ContractField {
            name: name.into(),
            kind: kind.into(),
            optional: false,
        };
        Ok(ContractInfo {
            id: 5,
            name: name.into(),
            fields: vec![field("Recipient", "string"), field("Amount", "money")],
            ..ContractInfo::default()
        })
    }

    async fn send_tx(
        &self,
        txs: &BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, String>, TransportError> {
        let mut submitted = self.submitted.lock();
        for (hash, data) in txs {
            submitted.insert(hash.clone(), data.clone());
        }
        Ok(txs.keys().map(|h| (h.clone(), h.clone())).collect())
    }

    async fn tx_info(&self, _hash: &str, _with_contract: bool) -> Result<TxInfoResult, TransportError> {
        Ok(TxInfoResult {
            block_id: 42,
            ..TxInfoResult::default()
        })
    }

    async fn tx_info_multi(
        &self,
        _hashes: &[String],
        _with_contract: bool,
    ) -> Result<MultiTxInfoResult, TransportError> {
        Ok(MultiTxInfoResult::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn golden_contract_call() {
    let suite = CryptoSuite::default();
    let key = fixed_key();

    let public_key = suite.public_key(&key).unwrap();
    assert_eq!(hex::encode(&public_key), GOLDEN_PUBLIC_KEY);
    assert_eq!(address_to_string(suite.address(&public_key)), GOLDEN_ADDRESS);

    let built = TransactionBuilder::new(Payload::ContractCall {
        contract_id: 5,
        params: transfer_params(),
    })
    .ecosystem(1)
    .network(1)
    .timestamp(1_700_000_000)
    .build(&suite, &key)
    .unwrap();

    assert_eq!(built.hash_hex(), GOLDEN_HASH);
    assert_eq!(built.envelope.payload_bytes().len(), 283);
    assert_eq!(built.data[0], TxType::SmartContract.as_byte());
}

#[test]
fn golden_amount_only_call() {
    let params = BTreeMap::from([("Amount".to_string(), ParamValue::from("100"))]);
    let built = TransactionBuilder::new(Payload::ContractCall {
        contract_id: 5,
        params,
    })
    .ecosystem(1)
    .network(1)
    .timestamp(1_700_000_000)
    .build(&CryptoSuite::default(), &fixed_key())
    .unwrap();

    assert_eq!(built.hash_hex(), GOLDEN_AMOUNT_ONLY_HASH);
    assert_eq!(built.envelope.payload_bytes().len(), 248);
    assert_eq!(built.data[0], TxType::SmartContract.as_byte());
}

#[tokio::test(start_paused = true)]
async fn build_submit_and_confirm() {
    let node = StubNode {
        pending_rounds: 2,
        ..StubNode::default()
    };
    let built = TransactionBuilder::new(Payload::ContractCall {
        contract_id: 5,
        params: transfer_params(),
    })
    .network(1)
    .timestamp(1_700_000_000)
    .build(&CryptoSuite::default(), &fixed_key())
    .unwrap();

    let mut batch = BTreeMap::new();
    batch.insert(built.hash_hex(), built.data.clone());
    let accepted = node.send_tx(&batch).await.unwrap();
    assert!(accepted.contains_key(GOLDEN_HASH));

    let start = tokio::time::Instant::now();
    let record = StatusPoller::new(&node)
        .poll_one(GOLDEN_HASH, 10, Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(record.outcome, TxOutcome::Committed);
    assert_eq!(record.block_id, Some(42));
    assert!(!record.penalty);
    assert_eq!(node.status_queries.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn client_login_call_and_batch_status() {
    let node = Arc::new(StubNode::default());
    let bytes: Vec<u8> = (1..=32).collect();
    let session = Session::new(ClientConfig {
        private_key: hex::encode(bytes),
        ..ClientConfig::default()
    })
    .unwrap();
    let client = Client::with_transport(session, node.clone(), PollOptions::rest());

    client.auto_login().await.unwrap();
    assert_eq!(client.session().snapshot().token, "jwt");
    assert_eq!(client.session().snapshot().network_id, 1);

    let source = ParamSource::from_query("Recipient=1430-1492-4302-5485-5729&Amount=100");
    let record = client
        .call_contract("@1TokensSend", &source, "10")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.outcome, TxOutcome::Committed);

    let (hash, data) = {
        let submitted = node.submitted.lock();
        let (h, d) = submitted.iter().next().unwrap();
        (h.clone(), d.clone())
    };
    assert_eq!(hash, record.hash);
    assert_eq!(data[0], TxType::SmartContract.as_byte());

    let unknown = "00".repeat(32);
    let statuses = client
        .txs_status(&[hash.clone(), unknown.clone()], Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[&hash].block_id, Some(42));
    assert!(!statuses.contains_key(&unknown));
}
