//! # Transaction Module
//!
//! Construction, validation and encoding of IBAX transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs      — Envelope data model (TxType, Header, Payload, ParamValue)
//! codec.rs      — Canonical MessagePack writer and the signature length prefix
//! validation.rs — Structural checks and fee/amount input validation
//! builder.rs    — TransactionBuilder: hash, sign, encode
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Describe** — pick a [`Payload`]: contract call, UTXO transfer, or
//!    self-transfer between balance models.
//! 2. **Build** — [`TransactionBuilder::build`] signs it and returns the wire
//!    bytes plus the hash.
//! 3. **Submit** — hand `(hash, data)` to a [`Transport`](crate::transport::Transport).
//! 4. **Poll** — wait for a block id with the [`StatusPoller`](crate::status::StatusPoller).
//!
//! ## Design Decisions
//!
//! - Transaction ids are the double digest of the canonical payload and do
//!   not cover the signature. The node indexes status by this id.
//! - Amounts are decimal integer strings, never floats.
//! - The signature sits behind a variable-length prefix inside the envelope.

pub mod builder;
pub mod codec;
pub mod types;
pub mod validation;

pub use builder::{BuildError, TransactionBuilder};
pub use codec::{encode_length_plus_data, CodecError};
pub use types::{
    BalanceKind, BuiltTransaction, Envelope, FileParam, Header, ParamValue, Payload, PayloadParts,
    SmartTransaction, TxType,
};
pub use validation::{expedite_from_units, validate_amount, validate_expedite, ValidationError};
