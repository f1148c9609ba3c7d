// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # IBAX Command-Line Client
//!
//! Entry point for the `ibax` binary. Parses CLI arguments, initializes
//! logging, connects to the node and runs one command.
//!
//! - `keygen`        — generate a key pair
//! - `address`       — address of a public key
//! - `call`          — call a contract
//! - `transfer`      — UTXO transfer to another account
//! - `self-transfer` — move value between own balances
//! - `status`        — wait for transactions to land in a block
//! - `info`          — block details of a transaction
//! - `version`       — print build version information

mod cli;
mod logging;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use ibax_sdk::client::{Client, UtxoKind};
use ibax_sdk::crypto::{address_to_string, CryptoSuite, PrivateKey};
use ibax_sdk::params::ParamSource;
use ibax_sdk::session::ClientConfig;
use ibax_sdk::status::TxStatusRecord;

use cli::{Commands, ConnectionArgs, Direction, IbaxCli, SubmitArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let IbaxCli {
        connection,
        log_format,
        log_level,
        command,
    } = IbaxCli::parse();
    logging::init_logging(&log_level, log_format);

    match command {
        Commands::Keygen(args) => keygen(args),
        Commands::Address(args) => address(args),
        Commands::Call(args) => call(&connection, args).await,
        Commands::Transfer(args) => transfer(&connection, args).await,
        Commands::SelfTransfer(args) => self_transfer(&connection, args).await,
        Commands::Status(args) => status(&connection, args).await,
        Commands::Info(args) => info(&connection, args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let suite = CryptoSuite::from_names(&args.cryptoer, &args.hasher)?;
    let key = PrivateKey::generate();
    let public_key = suite
        .public_key(&key)
        .context("failed to derive public key")?;
    let key_id = suite.address(&public_key);

    println!("Private key : {}", key.to_hex());
    println!("Public key  : {}", hex::encode(&public_key));
    println!("Address     : {}", address_to_string(key_id));
    println!("Key id      : {key_id}");
    Ok(())
}

fn address(args: cli::AddressArgs) -> Result<()> {
    let suite = CryptoSuite::from_names("", &args.hasher)?;
    let mut public_key = hex::decode(args.public_key.trim().trim_start_matches("0x"))
        .context("public key is not valid hex")?;
    if public_key.len() == 65 && public_key[0] == 0x04 {
        public_key.remove(0);
    }
    if public_key.len() != 64 {
        bail!("public key must be 64 bytes, got {}", public_key.len());
    }
    let key_id = suite.address(&public_key);
    println!("{} ({key_id})", address_to_string(key_id));
    Ok(())
}

// ---------------------------------------------------------------------------
// Networked commands
// ---------------------------------------------------------------------------

/// Config file (if any) with command-line overrides applied.
fn load_config(args: &ConnectionArgs) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(address) = &args.api_address {
        config.api_address = address.clone();
    }
    if let Some(key) = &args.private_key {
        config.private_key = key.clone();
    }
    if let Some(ecosystem) = args.ecosystem {
        config.ecosystem = ecosystem;
    }
    if args.rpc {
        config.enable_rpc = true;
    }
    config.validate().context("invalid client configuration")?;
    Ok(config)
}

/// Connect, log in when a key is configured, and cancel polling on Ctrl+C.
async fn connect(args: &ConnectionArgs) -> Result<Client> {
    let config = load_config(args)?;
    let has_key = !config.private_key.is_empty();
    tracing::info!(
        api_address = %config.api_address,
        rpc = config.enable_rpc,
        ecosystem = config.ecosystem,
        "connecting"
    );
    let client = Client::new(config).context("failed to create client")?;
    if has_key {
        client.auto_login().await.context("login failed")?;
    }

    let cancel = client.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            cancel.cancel();
        }
    });
    Ok(client)
}

fn submit_source(mut form: BTreeMap<String, String>, submit: &SubmitArgs) -> ParamSource {
    if submit.nowait {
        form.insert("nowait".into(), "1".into());
    }
    ParamSource::Form(form)
}

fn report(record: Option<TxStatusRecord>) -> Result<()> {
    match record {
        None => println!("submitted"),
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            if !record.outcome.is_final() {
                tracing::warn!(hash = %record.hash, outcome = %record.outcome, "no final status yet");
            }
        }
    }
    Ok(())
}

async fn call(connection: &ConnectionArgs, args: cli::CallArgs) -> Result<()> {
    let client = connect(connection).await?;
    let source = submit_source(args.params.into_iter().collect(), &args.submit);
    let record = client
        .call_contract(&args.contract, &source, &args.submit.expedite)
        .await
        .with_context(|| format!("calling {}", args.contract))?;
    report(record)
}

async fn transfer(connection: &ConnectionArgs, args: cli::TransferArgs) -> Result<()> {
    let client = connect(connection).await?;
    let form = BTreeMap::from([
        ("recipient".to_string(), args.recipient),
        ("amount".to_string(), args.amount),
        ("comment".to_string(), args.comment),
    ]);
    let source = submit_source(form, &args.submit);
    let record = client
        .call_utxo(UtxoKind::Transfer, &source, &args.submit.expedite)
        .await
        .context("transfer failed")?;
    report(record)
}

async fn self_transfer(connection: &ConnectionArgs, args: cli::SelfTransferArgs) -> Result<()> {
    let client = connect(connection).await?;
    let kind = match args.direction {
        Direction::ToUtxo => UtxoKind::AccountToUtxo,
        Direction::ToAccount => UtxoKind::UtxoToAccount,
    };
    let form = BTreeMap::from([("amount".to_string(), args.amount)]);
    let source = submit_source(form, &args.submit);
    let record = client
        .call_utxo(kind, &source, &args.submit.expedite)
        .await
        .context("self transfer failed")?;
    report(record)
}

async fn status(connection: &ConnectionArgs, args: cli::StatusArgs) -> Result<()> {
    let client = connect(connection).await?;
    let defaults = client.poll_options();
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or(defaults.interval);

    if let [hash] = args.hashes.as_slice() {
        let record = client
            .tx_status(hash, args.attempts.unwrap_or(defaults.attempts), interval)
            .await
            .context("status query failed")?;
        return report(Some(record));
    }

    let records = client
        .txs_status(&args.hashes, interval)
        .await
        .context("status query failed")?;
    let sorted: BTreeMap<_, _> = records.into_iter().collect();
    println!("{}", serde_json::to_string_pretty(&sorted)?);
    for hash in args.hashes.iter().filter(|h| !sorted.contains_key(*h)) {
        tracing::warn!(%hash, "unresolved");
    }
    Ok(())
}

async fn info(connection: &ConnectionArgs, args: cli::InfoArgs) -> Result<()> {
    let client = connect(connection).await?;
    let value = if let [hash] = args.hashes.as_slice() {
        serde_json::to_value(client.tx_info(hash, args.contract).await?)?
    } else {
        serde_json::to_value(client.tx_info_multi(&args.hashes, args.contract).await?)?
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("ibax     {}", env!("CARGO_PKG_VERSION"));
    println!("sdk      {}", ibax_sdk::config::SDK_VERSION);
    println!("rustc    {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ibax.toml");
        std::fs::write(&path, "ecosystem = 2\napi_address = \"http://node:7079\"\n").unwrap();

        let args = ConnectionArgs {
            config: Some(path),
            api_address: Some("http://other:7079".into()),
            rpc: true,
            ..ConnectionArgs::default()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.ecosystem, 2);
        assert_eq!(config.api_address, "http://other:7079");
        assert!(config.enable_rpc);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = ConnectionArgs {
            private_key: Some("not-hex".into()),
            ..ConnectionArgs::default()
        };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn nowait_flag_reaches_source() {
        let submit = SubmitArgs {
            nowait: true,
            ..SubmitArgs::default()
        };
        assert!(submit_source(BTreeMap::new(), &submit).has("nowait"));
        assert!(!submit_source(BTreeMap::new(), &SubmitArgs::default()).has("nowait"));
    }
}
