//! # Confirmation Polling
//!
//! After a transaction is submitted the node needs a few seconds to put it in
//! a block. [`StatusPoller`] asks the node, through any [`StatusSource`],
//! until the transaction resolves or the attempt budget runs out.
//!
//! A status resolves in one of three ways:
//!
//! - **Committed**: the node reports a block id and no penalty.
//! - **Penalized**: included in a block but flagged as faulty. The node's
//!   error payload is kept verbatim.
//! - **Rejected**: no block id but an error message.
//!
//! Anything else is still pending. Running out of attempts is not an error:
//! the caller gets a record with outcome [`TxOutcome::Exhausted`] and can
//! decide to poll again.
//!
//! ## Timing
//!
//! The poller sleeps *before* every query, including the first one, and
//! never for less than [`MIN_POLL_INTERVAL`]. `N` queries therefore take at
//! least `N × 500ms` however small an interval the caller asks for.
//!
//! Every sleep and query races a [`CancellationToken`]; cancelling it makes
//! the poll return [`PollError::Cancelled`] straight away.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{
    BATCH_POLL_RETRIES, MIN_POLL_INTERVAL, REST_POLL_ATTEMPTS, REST_POLL_INTERVAL,
    RPC_POLL_ATTEMPTS, RPC_POLL_INTERVAL,
};
use crate::transport::TransportError;

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// Error object the node attaches to failed transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatusError {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// One entry of the node's `txstatus` response, as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTxStatus {
    #[serde(default)]
    pub blockid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errmsg: Option<TxStatusError>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub penalty: i64,
}

/// Anything that can answer "what is the status of these hashes".
///
/// Hashes are lowercase hex. Hashes the node knows nothing about may simply
/// be missing from the returned map; they count as pending.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn query_status(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, RawTxStatus>, TransportError>;
}

// ---------------------------------------------------------------------------
// Status records
// ---------------------------------------------------------------------------

/// Where a transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxOutcome {
    Pending,
    Committed,
    Penalized,
    Rejected,
    Exhausted,
}

impl TxOutcome {
    /// True once the node has given a definitive answer.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Committed | Self::Penalized | Self::Rejected)
    }
}

impl fmt::Display for TxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Committed => write!(f, "committed"),
            Self::Penalized => write!(f, "penalized"),
            Self::Rejected => write!(f, "rejected"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// The client's view of one transaction's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxStatusRecord {
    pub hash: String,
    pub block_id: Option<i64>,
    pub penalty: bool,
    /// Contract return value, when the node sends one.
    pub result: Option<String>,
    /// The node's error object, untouched.
    pub error: Option<serde_json::Value>,
    pub outcome: TxOutcome,
}

impl TxStatusRecord {
    /// Classify a raw status. `None` means still pending.
    pub fn resolve(hash: &str, raw: &RawTxStatus) -> Option<Self> {
        let error = raw
            .errmsg
            .as_ref()
            .and_then(|e| serde_json::to_value(e).ok());

        if !raw.blockid.is_empty() {
            let penalty = raw.penalty == 1;
            return Some(Self {
                hash: hash.to_string(),
                block_id: Some(raw.blockid.trim().parse().unwrap_or_default()),
                penalty,
                result: (!raw.result.is_empty()).then(|| raw.result.clone()),
                error: if penalty { error } else { None },
                outcome: if penalty {
                    TxOutcome::Penalized
                } else {
                    TxOutcome::Committed
                },
            });
        }

        error.map(|error| Self {
            hash: hash.to_string(),
            block_id: None,
            penalty: false,
            result: (!raw.result.is_empty()).then(|| raw.result.clone()),
            error: Some(error),
            outcome: TxOutcome::Rejected,
        })
    }

    pub fn pending(hash: &str) -> Self {
        Self {
            hash: hash.to_string(),
            block_id: None,
            penalty: false,
            result: None,
            error: None,
            outcome: TxOutcome::Pending,
        }
    }

    fn exhausted(hash: &str) -> Self {
        Self {
            outcome: TxOutcome::Exhausted,
            ..Self::pending(hash)
        }
    }

    /// The `error` field of the node's error object, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref()?.get("error")?.as_str()
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("polling cancelled")]
    Cancelled,
}

/// Attempt budget and pacing for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Queries made by single-hash polling.
    pub attempts: u32,
    /// Sleep before each query. Raised to [`MIN_POLL_INTERVAL`] if lower.
    pub interval: Duration,
    /// Extra queries multi-hash polling makes while nothing has resolved.
    pub batch_retries: u32,
}

impl PollOptions {
    /// Defaults for the REST transport: 10 attempts, one second apart.
    pub fn rest() -> Self {
        Self {
            attempts: REST_POLL_ATTEMPTS,
            interval: REST_POLL_INTERVAL,
            batch_retries: BATCH_POLL_RETRIES,
        }
    }

    /// Defaults for the JSON-RPC transport: 5 attempts, four seconds apart.
    pub fn rpc() -> Self {
        Self {
            attempts: RPC_POLL_ATTEMPTS,
            interval: RPC_POLL_INTERVAL,
            batch_retries: BATCH_POLL_RETRIES,
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::rest()
    }
}

fn floor_interval(interval: Duration) -> Duration {
    interval.max(MIN_POLL_INTERVAL)
}

/// Polls a [`StatusSource`] until transactions resolve.
pub struct StatusPoller<'a, S: StatusSource + ?Sized> {
    source: &'a S,
    cancel: CancellationToken,
    batch_retries: u32,
}

impl<'a, S: StatusSource + ?Sized> StatusPoller<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            cancel: CancellationToken::new(),
            batch_retries: BATCH_POLL_RETRIES,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_batch_retries(mut self, retries: u32) -> Self {
        self.batch_retries = retries;
        self
    }

    /// Poll a single hash with up to `attempts` queries.
    pub async fn poll_one(
        &self,
        hash: &str,
        attempts: u32,
        interval: Duration,
    ) -> Result<TxStatusRecord, PollError> {
        let interval = floor_interval(interval);
        let hashes = [hash.to_string()];

        for attempt in 1..=attempts {
            self.pause(interval).await?;
            let statuses = self.query(&hashes).await?;
            if let Some(record) = statuses.get(hash).and_then(|raw| TxStatusRecord::resolve(hash, raw)) {
                info!(
                    hash,
                    attempt,
                    outcome = %record.outcome,
                    block_id = ?record.block_id,
                    "transaction resolved"
                );
                return Ok(record);
            }
            debug!(hash, attempt, attempts, "transaction still pending");
        }

        info!(hash, attempts, "poll budget exhausted");
        Ok(TxStatusRecord::exhausted(hash))
    }

    /// Poll several hashes with one batched query per attempt.
    ///
    /// Stops as soon as any hash resolves and returns every hash resolved by
    /// that query. Unresolved hashes are absent from the map; poll them again
    /// if you need them. An empty map means nothing resolved within
    /// `1 + batch_retries` queries.
    pub async fn poll_many(
        &self,
        hashes: &[String],
        interval: Duration,
    ) -> Result<HashMap<String, TxStatusRecord>, PollError> {
        let interval = floor_interval(interval);
        let mut resolved = HashMap::new();
        if hashes.is_empty() {
            return Ok(resolved);
        }

        for attempt in 0..=self.batch_retries {
            self.pause(interval).await?;
            let statuses = self.query(hashes).await?;
            for (hash, raw) in statuses.iter().filter(|(h, _)| hashes.contains(*h)) {
                if let Some(record) = TxStatusRecord::resolve(hash, raw) {
                    resolved.insert(hash.clone(), record);
                }
            }
            if !resolved.is_empty() {
                info!(
                    resolved = resolved.len(),
                    requested = hashes.len(),
                    attempt,
                    "batch status resolved"
                );
                break;
            }
            debug!(requested = hashes.len(), attempt, "no transaction in batch resolved yet");
        }

        Ok(resolved)
    }

    async fn pause(&self, interval: Duration) -> Result<(), PollError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PollError::Cancelled),
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }

    async fn query(&self, hashes: &[String]) -> Result<HashMap<String, RawTxStatus>, PollError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PollError::Cancelled),
            result = self.source.query_status(hashes) => result.map_err(PollError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;

    /// Reports `blockid` for the listed hashes once `resolve_on` queries have
    /// been made.
    struct ScriptedSource {
        calls: AtomicUsize,
        resolve_on: usize,
        resolving: Vec<String>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedSource {
        fn new(resolve_on: usize, resolving: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                resolve_on,
                resolving: resolving.iter().map(|s| s.to_string()).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn query_status(
            &self,
            hashes: &[String],
        ) -> Result<HashMap<String, RawTxStatus>, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().push(hashes.to_vec());
            let mut out = HashMap::new();
            for hash in hashes {
                let raw = if call >= self.resolve_on && self.resolving.contains(hash) {
                    RawTxStatus {
                        blockid: "42".into(),
                        ..RawTxStatus::default()
                    }
                } else {
                    RawTxStatus::default()
                };
                out.insert(hash.clone(), raw);
            }
            Ok(out)
        }
    }

    /// Answers every query with a committed status for a hash nobody asked
    /// about, and nothing else.
    struct StraySource;

    #[async_trait]
    impl StatusSource for StraySource {
        async fn query_status(
            &self,
            _hashes: &[String],
        ) -> Result<HashMap<String, RawTxStatus>, TransportError> {
            let raw = RawTxStatus {
                blockid: "7".into(),
                ..RawTxStatus::default()
            };
            Ok(HashMap::from([("zz".to_string(), raw)]))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl StatusSource for FailingSource {
        async fn query_status(
            &self,
            _hashes: &[String],
        ) -> Result<HashMap<String, RawTxStatus>, TransportError> {
            Err(TransportError::Status {
                status: 502,
                body: "bad gateway".into(),
            })
        }
    }

    #[test]
    fn resolve_classifies_statuses() {
        let pending = RawTxStatus::default();
        assert!(TxStatusRecord::resolve("h", &pending).is_none());

        let committed = RawTxStatus {
            blockid: "42".into(),
            result: "ok".into(),
            ..RawTxStatus::default()
        };
        let rec = TxStatusRecord::resolve("h", &committed).unwrap();
        assert_eq!(rec.outcome, TxOutcome::Committed);
        assert_eq!(rec.block_id, Some(42));
        assert_eq!(rec.result.as_deref(), Some("ok"));
        assert!(rec.error.is_none());

        let penalized = RawTxStatus {
            blockid: "43".into(),
            penalty: 1,
            errmsg: Some(TxStatusError {
                kind: "panic".into(),
                error: "division by zero".into(),
            }),
            ..RawTxStatus::default()
        };
        let rec = TxStatusRecord::resolve("h", &penalized).unwrap();
        assert_eq!(rec.outcome, TxOutcome::Penalized);
        assert!(rec.penalty);
        assert_eq!(
            rec.error,
            Some(serde_json::json!({"type": "panic", "error": "division by zero"}))
        );
        assert_eq!(rec.error_message(), Some("division by zero"));

        let rejected = RawTxStatus {
            errmsg: Some(TxStatusError {
                kind: "error".into(),
                error: "not enough tokens".into(),
            }),
            ..RawTxStatus::default()
        };
        let rec = TxStatusRecord::resolve("h", &rejected).unwrap();
        assert_eq!(rec.outcome, TxOutcome::Rejected);
        assert_eq!(rec.block_id, None);
    }

    #[test]
    fn raw_status_parses_node_json() {
        let raw: RawTxStatus = serde_json::from_str(
            r#"{"blockid":"","errmsg":{"type":"txError","error":"bad"},"result":"","penalty":0}"#,
        )
        .unwrap();
        assert_eq!(raw.errmsg.unwrap().kind, "txError");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_one_returns_on_second_query() {
        let source = ScriptedSource::new(2, &["aa"]);
        let rec = StatusPoller::new(&source)
            .poll_one("aa", 10, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(source.calls(), 2);
        assert_eq!(rec.block_id, Some(42));
        assert_eq!(rec.outcome, TxOutcome::Committed);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_one_enforces_interval_floor() {
        let source = ScriptedSource::new(usize::MAX, &[]);
        let start = Instant::now();
        let rec = StatusPoller::new(&source)
            .poll_one("aa", 5, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(source.calls(), 5);
        assert!(start.elapsed() >= 5 * MIN_POLL_INTERVAL);
        assert_eq!(rec.outcome, TxOutcome::Exhausted);
        assert_eq!(rec.block_id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_one_sleeps_before_first_query() {
        let source = ScriptedSource::new(1, &["aa"]);
        let start = Instant::now();
        StatusPoller::new(&source)
            .poll_one("aa", 3, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_many_returns_partial_resolution() {
        let source = ScriptedSource::new(1, &["a", "b"]);
        let hashes: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let out = StatusPoller::new(&source)
            .poll_many(&hashes, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(out.len(), 2);
        assert!(out.contains_key("a") && out.contains_key("b"));
        assert!(!out.contains_key("c"));
        assert_eq!(source.seen.lock()[0], hashes);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_many_gives_up_after_retries() {
        let source = ScriptedSource::new(usize::MAX, &[]);
        let hashes = vec!["a".to_string()];
        let start = Instant::now();
        let out = StatusPoller::new(&source)
            .with_batch_retries(3)
            .poll_many(&hashes, Duration::ZERO)
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(source.calls(), 4);
        assert!(start.elapsed() >= 4 * MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_many_default_budget_is_eleven_queries() {
        let source = ScriptedSource::new(usize::MAX, &[]);
        let out = StatusPoller::new(&source)
            .poll_many(&["a".to_string()], Duration::ZERO)
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(source.calls(), 1 + BATCH_POLL_RETRIES as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_propagate() {
        let err = StatusPoller::new(&FailingSource)
            .poll_one("aa", 5, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Transport(TransportError::Status { status: 502, .. })));

        let err = StatusPoller::new(&FailingSource)
            .poll_many(&["aa".to_string()], Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let source = ScriptedSource::new(usize::MAX, &[]);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });

        let err = StatusPoller::new(&source)
            .with_cancellation(token)
            .poll_one("aa", 100, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn already_cancelled_token_never_queries() {
        let source = ScriptedSource::new(1, &["aa"]);
        let token = CancellationToken::new();
        token.cancel();
        let err = StatusPoller::new(&source)
            .with_cancellation(token)
            .poll_many(&["aa".to_string()], Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn transport_defaults_differ() {
        assert_eq!(PollOptions::rest().attempts, 10);
        assert_eq!(PollOptions::rest().interval, Duration::from_secs(1));
        assert_eq!(PollOptions::rpc().attempts, 5);
        assert_eq!(PollOptions::rpc().interval, Duration::from_secs(4));
        assert_eq!(PollOptions::default(), PollOptions::rest());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_many_ignores_unrequested_hashes() {
        let resolved = StatusPoller::new(&StraySource)
            .with_batch_retries(1)
            .poll_many(&["aa".to_string()], Duration::from_secs(1))
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }
}
