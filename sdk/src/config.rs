//! # Protocol Constants
//!
//! Every magic number the client shares with the node lives here. These
//! values are dictated by the network, not by us: change one and the node
//! starts rejecting transactions or, worse, accepting them with a different
//! hash than the one you are polling for.

use std::time::Duration;

// ---------------------------------------------------------------------------
// SDK Version
// ---------------------------------------------------------------------------

/// Version string reported by the client.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Transaction Discriminants
// ---------------------------------------------------------------------------

/// Leading byte of a genesis-block transaction. Never produced by a client.
pub const FIRST_BLOCK_TX_TYPE: u8 = 1;

/// Leading byte of a network-halt transaction. Never produced by a client.
pub const STOP_NETWORK_TX_TYPE: u8 = 2;

/// Leading byte of a smart-contract call.
pub const SMART_CONTRACT_TX_TYPE: u8 = 3;

/// Leading byte of a delayed transaction. Never produced by a client.
pub const DELAY_TX_TYPE: u8 = 4;

/// Leading byte of a UTXO transfer to another key.
pub const UTXO_TX_TYPE: u8 = 5;

/// Leading byte of a transfer between the account and UTXO balances of the
/// same key.
pub const TRANSFER_SELF_TX_TYPE: u8 = 6;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Server name of the default signature scheme.
pub const DEFAULT_CRYPTOER: &str = "ECC_P256";

/// Server name of the default hash function.
pub const DEFAULT_HASHER: &str = "SHA256";

/// Private key length in bytes.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Public key length in bytes: `X || Y`, no SEC1 tag byte.
pub const PUBLIC_KEY_LENGTH: usize = 64;

/// Number of decimal digits in a rendered key id.
pub const ADDRESS_LENGTH: usize = 20;

/// Address that burns whatever is sent to it. Valid, and maps to key id 0.
pub const BLACK_HOLE_ADDRESS: &str = "0000-0000-0000-0000-0000";

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Scale of the smallest fee unit: fees are multiples of `10^-12`.
pub const FEE_UNIT_SCALE: u32 = 12;

/// Localization tags longer than this are rejected by the node.
pub const MAX_LANG_LENGTH: usize = 2;

// ---------------------------------------------------------------------------
// Status Polling
// ---------------------------------------------------------------------------

/// The poller never queries faster than this, whatever the caller asks for.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default single-hash attempts over the REST transport.
pub const REST_POLL_ATTEMPTS: u32 = 10;

/// Default single-hash interval over the REST transport.
pub const REST_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default single-hash attempts over the JSON-RPC transport.
pub const RPC_POLL_ATTEMPTS: u32 = 5;

/// Default single-hash interval over the JSON-RPC transport.
pub const RPC_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Extra batched queries issued by multi-hash polling while nothing has
/// resolved yet.
pub const BATCH_POLL_RETRIES: u32 = 10;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Tokens with less lifetime than this left are discarded by auto-login.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(10 * 60);

/// Default JWT prefix placed before the token in the `Authorization` header.
pub const DEFAULT_JWT_PREFIX: &str = "Bearer ";

/// Default REST API path appended to the node address.
pub const DEFAULT_API_PATH: &str = "/api/v2/";

/// Default HTTP request timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Namespace prefix of the node's JSON-RPC methods.
pub const RPC_NAMESPACE: &str = "ibax";
