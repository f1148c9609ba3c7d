//! # CLI Interface
//!
//! Defines the command-line argument structure for `ibax` using `clap`
//! derive. Offline commands (`keygen`, `address`, `version`) never touch the
//! network; the rest connect with the settings from `--config` and the
//! `IBAX_*` environment overrides.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::logging::LogFormat;

/// IBAX network client.
///
/// Builds, signs and submits transactions, and follows them until they are
/// in a block.
#[derive(Parser, Debug)]
#[command(name = "ibax", about = "IBAX network client", version, propagate_version = true)]
pub struct IbaxCli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log output format.
    #[arg(long, global = true, value_enum, env = "IBAX_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn,ibax=info,ibax_sdk=info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where and how to reach the node.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Client configuration file (TOML).
    #[arg(long, short = 'c', global = true, env = "IBAX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Node address, overriding the config file.
    #[arg(long, global = true, env = "IBAX_API_ADDRESS")]
    pub api_address: Option<String>,

    /// Hex private key, overriding the config file.
    #[arg(long, global = true, env = "IBAX_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Ecosystem to act in, overriding the config file.
    #[arg(long, global = true)]
    pub ecosystem: Option<i64>,

    /// Use the JSON-RPC API instead of REST.
    #[arg(long, global = true)]
    pub rpc: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new private key and print it with its public key and address.
    Keygen(KeygenArgs),
    /// Compute the account address of a public key.
    Address(AddressArgs),
    /// Call a contract by name.
    Call(CallArgs),
    /// Send UTXO value to another account.
    Transfer(TransferArgs),
    /// Move own value between the account and UTXO balances.
    SelfTransfer(SelfTransferArgs),
    /// Wait for one or more transactions to land in a block.
    Status(StatusArgs),
    /// Show what a block recorded for a transaction.
    Info(InfoArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Signature scheme.
    #[arg(long, default_value = "ECC_P256")]
    pub cryptoer: String,

    /// Hash function used for the address.
    #[arg(long, default_value = "SHA256")]
    pub hasher: String,
}

#[derive(Args, Debug)]
pub struct AddressArgs {
    /// Hex `X || Y` public key (a leading `04` is accepted).
    #[arg(long)]
    pub public_key: String,

    #[arg(long, default_value = "SHA256")]
    pub hasher: String,
}

/// Options shared by every command that submits a transaction.
#[derive(Args, Debug, Clone, Default)]
pub struct SubmitArgs {
    /// Priority fee, counted in smallest fee units.
    #[arg(long, default_value = "")]
    pub expedite: String,

    /// Return after submission instead of waiting for a block.
    #[arg(long)]
    pub nowait: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Contract name, e.g. `@1TokensSend`.
    pub contract: String,

    /// Contract parameter as `Name=Value`. Repeatable.
    #[arg(long = "param", short = 'p', value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    #[command(flatten)]
    pub submit: SubmitArgs,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Recipient address (`XXXX-XXXX-XXXX-XXXX-XXXX`) or key id.
    #[arg(long)]
    pub recipient: String,

    /// Whole number of base units.
    #[arg(long)]
    pub amount: String,

    #[arg(long, default_value = "")]
    pub comment: String,

    #[command(flatten)]
    pub submit: SubmitArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// Account balance into UTXO.
    ToUtxo,
    /// UTXO back into the account balance.
    ToAccount,
}

#[derive(Args, Debug)]
pub struct SelfTransferArgs {
    #[arg(long, value_enum)]
    pub direction: Direction,

    #[arg(long)]
    pub amount: String,

    #[command(flatten)]
    pub submit: SubmitArgs,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Transaction hashes (hex).
    #[arg(required = true)]
    pub hashes: Vec<String>,

    /// Queries for a single hash. Defaults to the transport's setting.
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Milliseconds between queries (at least 500).
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Transaction hashes (hex).
    #[arg(required = true)]
    pub hashes: Vec<String>,

    /// Include the contract's details.
    #[arg(long)]
    pub contract: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected Name=Value, got {s:?}"))
}
