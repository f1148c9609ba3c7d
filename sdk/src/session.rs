//! # Client Configuration and Session State
//!
//! [`ClientConfig`] is what the user writes down: node address, key, and
//! which algorithms to start with. It loads from TOML.
//!
//! [`Session`] is what the client learns while talking to the node: the JWT,
//! its expiry, the login uid, the network id, and possibly a different
//! signature scheme than the one we started with. Transports and the client
//! share one `Session`; every read takes a snapshot under the lock and every
//! write goes through [`Session::update`], so nothing observes a half-applied
//! change.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{
    DEFAULT_API_PATH, DEFAULT_CRYPTOER, DEFAULT_HASHER, DEFAULT_JWT_PREFIX, HTTP_TIMEOUT,
    TOKEN_REFRESH_MARGIN,
};
use crate::crypto::{CryptoError, CryptoSuite, PrivateKey};
use crate::status::PollOptions;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("no private key configured")]
    MissingKey,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// User-supplied client settings.
///
/// ```toml
/// private_key = "c4f8..."
/// ecosystem = 1
/// api_address = "http://127.0.0.1:7079"
/// enable_rpc = false
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Hex-encoded private key. Empty for read-only use.
    pub private_key: String,
    pub ecosystem: i64,
    /// Node base URL. For JSON-RPC this is the full endpoint.
    pub api_address: String,
    /// Appended to `api_address` by the REST transport.
    pub api_path: String,
    pub jwt_prefix: String,
    /// Signature scheme to start with; the node may override it.
    pub cryptoer: String,
    /// Hash function to start with; the node may override it.
    pub hasher: String,
    /// Talk JSON-RPC instead of REST.
    pub enable_rpc: bool,
    /// Overrides the transport's default single-hash attempt count.
    pub poll_attempts: Option<u32>,
    /// Overrides the transport's default poll interval.
    pub poll_interval_ms: Option<u64>,
    pub http_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            ecosystem: 1,
            api_address: "http://127.0.0.1:7079".into(),
            api_path: DEFAULT_API_PATH.into(),
            jwt_prefix: DEFAULT_JWT_PREFIX.into(),
            cryptoer: DEFAULT_CRYPTOER.into(),
            hasher: DEFAULT_HASHER.into(),
            enable_rpc: false,
            poll_attempts: None,
            poll_interval_ms: None,
            http_timeout_secs: HTTP_TIMEOUT.as_secs(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("private_key", &if self.private_key.is_empty() { "" } else { "<redacted>" })
            .field("ecosystem", &self.ecosystem)
            .field("api_address", &self.api_address)
            .field("api_path", &self.api_path)
            .field("jwt_prefix", &self.jwt_prefix)
            .field("cryptoer", &self.cryptoer)
            .field("hasher", &self.hasher)
            .field("enable_rpc", &self.enable_rpc)
            .field("poll_attempts", &self.poll_attempts)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_address.trim().is_empty() {
            return Err(ConfigError::Invalid("api_address is empty".into()));
        }
        url::Url::parse(&self.api_address)
            .map_err(|e| ConfigError::Invalid(format!("api_address: {e}")))?;
        if self.ecosystem < 1 {
            return Err(ConfigError::Invalid(format!(
                "ecosystem must be positive, got {}",
                self.ecosystem
            )));
        }
        CryptoSuite::from_names(&self.cryptoer, &self.hasher)?;
        if !self.private_key.is_empty() {
            PrivateKey::from_hex(&self.private_key)?;
        }
        Ok(())
    }

    /// Poll settings: the transport's defaults with any configured overrides.
    pub fn poll_options(&self) -> PollOptions {
        let mut options = if self.enable_rpc {
            PollOptions::rpc()
        } else {
            PollOptions::rest()
        };
        if let Some(attempts) = self.poll_attempts {
            options.attempts = attempts;
        }
        if let Some(ms) = self.poll_interval_ms {
            options.interval = Duration::from_millis(ms);
        }
        options
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything known about the current connection.
#[derive(Clone)]
pub struct SessionState {
    pub config: ClientConfig,
    pub token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub uid: String,
    pub network_id: i64,
    pub suite: CryptoSuite,
    pub private_key: Option<PrivateKey>,
    /// `X || Y`, empty without a private key.
    pub public_key: Vec<u8>,
    pub key_id: i64,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("config", &self.config)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("token_expires_at", &self.token_expires_at)
            .field("uid", &self.uid)
            .field("network_id", &self.network_id)
            .field("suite", &self.suite)
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl SessionState {
    fn derive_keys(&mut self) -> Result<(), ConfigError> {
        if self.config.private_key.is_empty() {
            self.private_key = None;
            self.public_key.clear();
            self.key_id = 0;
            return Ok(());
        }
        let key = PrivateKey::from_hex(&self.config.private_key)?;
        self.public_key = self.suite.public_key(&key)?;
        self.key_id = self.suite.address(&self.public_key);
        self.private_key = Some(key);
        Ok(())
    }

    /// A token exists and will outlive the refresh margin.
    pub fn token_is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() {
            return false;
        }
        let margin = chrono::Duration::from_std(TOKEN_REFRESH_MARGIN).unwrap_or_default();
        match self.token_expires_at {
            Some(expires) => expires - now >= margin,
            None => false,
        }
    }
}

/// Shared, lock-guarded session. Cloning shares the same state.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let suite = CryptoSuite::from_names(&config.cryptoer, &config.hasher)?;
        let mut state = SessionState {
            config,
            token: String::new(),
            token_expires_at: None,
            uid: String::new(),
            network_id: 0,
            suite,
            private_key: None,
            public_key: Vec::new(),
            key_id: 0,
        };
        state.derive_keys()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(state)),
        })
    }

    /// Consistent copy of the whole state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().clone()
    }

    /// Apply a change under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn config(&self) -> ClientConfig {
        self.inner.read().config.clone()
    }

    pub fn suite(&self) -> CryptoSuite {
        self.inner.read().suite
    }

    pub fn key_id(&self) -> i64 {
        self.inner.read().key_id
    }

    pub fn private_key(&self) -> Result<PrivateKey, ConfigError> {
        self.inner.read().private_key.clone().ok_or(ConfigError::MissingKey)
    }

    /// `Authorization` header value, if logged in.
    pub fn authorization(&self) -> Option<String> {
        let state = self.inner.read();
        (!state.token.is_empty()).then(|| format!("{}{}", state.config.jwt_prefix, state.token))
    }

    pub fn clear_token(&self) {
        let mut state = self.inner.write();
        state.token.clear();
        state.token_expires_at = None;
    }

    /// Switch algorithms if the node uses different ones, re-deriving the
    /// public key and key id. Returns whether anything changed.
    pub fn reinit(&self, cryptoer: &str, hasher: &str) -> Result<bool, ConfigError> {
        let suite = CryptoSuite::from_names(cryptoer, hasher)?;
        let mut state = self.inner.write();
        if state.suite == suite {
            return Ok(false);
        }
        let previous = state.suite;
        state.suite = suite;
        state.config.cryptoer = suite.sign.server_name().to_string();
        state.config.hasher = suite.hash.server_name().to_string();
        if let Err(e) = state.derive_keys() {
            state.suite = previous;
            state.config.cryptoer = previous.sign.server_name().to_string();
            state.config.hasher = previous.hash.server_name().to_string();
            return Err(e);
        }
        info!(
            cryptoer = %suite.sign,
            hasher = %suite.hash,
            key_id = state.key_id,
            "switched to node algorithms"
        );
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Token lifetime
// ---------------------------------------------------------------------------

/// Parse the node's token lifetime, written like `"1h0m0s"`, `"35m"` or
/// `"1.5h"`.
pub fn parse_lifetime(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s == "0" {
        return Some(Duration::ZERO);
    }
    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total += value * seconds;
        rest = &rest[unit_len..];
    }
    Some(Duration::from_secs_f64(total))
}
