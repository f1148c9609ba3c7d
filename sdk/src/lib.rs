// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # IBAX SDK
//!
//! Client library for IBAX nodes: build signed transactions, submit them,
//! and follow them until they land in a block (or don't).
//!
//! ## Architecture
//!
//! - **crypto** — Key handling, ECDSA over P-256 or secp256k1, SHA-256 or
//!   Keccak-256, and the node's numeric address scheme.
//! - **transaction** — The envelope data model, its canonical encoding,
//!   input validation and the builder that signs it all.
//! - **status** — Turning the node's status replies into outcomes, and the
//!   poller that waits for them.
//! - **transport** — REST and JSON-RPC connections to a node.
//! - **params** — Typed contract parameters from forms or maps.
//! - **session** — Configuration and the credentials learned at runtime.
//! - **client** — The high-level API on top of all of the above.
//! - **config** — Protocol constants.
//!
//! ## Design Philosophy
//!
//! 1. A transaction is built in one call or not at all.
//! 2. Amounts and fees are decimal strings, never floats.
//! 3. Transports are swappable behind one trait; nothing above them cares
//!    which wire format is in use.
//! 4. Waiting is cancellable.

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod params;
pub mod session;
pub mod status;
pub mod transaction;
pub mod transport;

pub use client::{Client, UtxoKind};
pub use error::SdkError;
pub use session::ClientConfig;
