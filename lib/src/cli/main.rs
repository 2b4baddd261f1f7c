// Copyright (c) 2022-2023 The Klaytn Authors

//! Command line utility for interacting with the Ledger Klaytn app

use std::{path::Path, str::FromStr};

use clap::Parser;
use ledger_transport::Exchange;
use log::{debug, error, info, LevelFilter};
use serde::{de::DeserializeOwned, Serialize};

use ledger_klaytn::{
    apdu::{path::Bip32Path, sign::Protocol, tx::TxKind},
    transport::{GenericTransport, TcpOptions},
    tx::{Signature, TxInfo, UnsignedTx},
    verify::{recover_address, Address},
    Connect, DeviceHandle, Filter, LedgerProvider,
};

mod helpers;
use helpers::*;

/// Default Klaytn derivation path (account 0)
const DEFAULT_PATH: &str = "44'/8217'/0'/0/0";

/// Ledger Klaytn command line utility
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Supported transports for ledger discovery
    #[clap(long, value_enum, default_value = "any")]
    target: Filter,

    /// Device index (where more than one device is available)
    #[clap(long, default_value = "0")]
    device_index: usize,

    /// Speculos connection options
    #[clap(flatten)]
    tcp: TcpOptions,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// List available devices
    List,

    /// Fetch Klaytn app version
    Version,

    /// Fetch address and public key for a derivation path
    Address {
        /// BIP32 derivation path
        #[clap(long, value_parser = parse_path, default_value = DEFAULT_PATH)]
        path: Bip32Path,

        /// Show and confirm the address on the device
        #[clap(long)]
        display: bool,

        /// Account index
        #[clap(long, default_value = "0")]
        account: u8,
    },

    /// Sign a transaction pre-image
    Sign {
        /// Transaction kind (eg. `fee-delegated-value-transfer` or
        /// `TxTypeFeeDelegatedValueTransfer`), required with `--preimage`
        #[clap(long, value_parser = parse_kind)]
        kind: Option<TxKind>,

        /// BIP32 derivation path
        #[clap(long, value_parser = parse_path, default_value = DEFAULT_PATH)]
        path: Bip32Path,

        /// Hex encoded RLP pre-image
        #[clap(long, conflicts_with = "input")]
        preimage: Option<HexBytes>,

        /// Unsigned transaction file (`.json`, `{ "kind": .., "preimage": .. }`)
        #[clap(long)]
        input: Option<String>,

        /// Signing protocol revision supported by the app
        #[clap(long, value_parser = parse_protocol, default_value = "v2")]
        protocol: Protocol,

        /// Check the recovered signer against the device address
        #[clap(long)]
        verify: bool,

        /// Account index used for verification
        #[clap(long, default_value = "0")]
        account: u8,

        /// Output file for the signed transaction (`.json`)
        #[clap(long)]
        output: Option<String>,
    },
}

/// Signing output, the unsigned transaction with its signature
#[derive(Clone, Debug, Serialize)]
struct SignedTx {
    #[serde(flatten)]
    tx: UnsignedTx,
    signature: Signature,
    #[serde(skip_serializing_if = "Option::is_none")]
    signer: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())?;

    // Connect to ledger device
    let p = LedgerProvider::new()?;

    #[cfg(feature = "transport_tcp")]
    let p = p.with_tcp_options(args.tcp.clone());

    debug!("Using transport: {:?}", args.target);

    // List available devices
    let devices = p.list_devices(args.target).await;
    if devices.is_empty() {
        return Err(anyhow::anyhow!("No devices found"));
    }

    // Handle list command
    if args.cmd == Actions::List {
        info!("Devices:");
        for (i, d) in devices.iter().enumerate() {
            info!("  {}: {}", i, d);
        }

        return Ok(());
    }

    // Select device by index
    if args.device_index >= devices.len() {
        return Err(anyhow::anyhow!(
            "Invalid device index: {} (max: {})",
            args.device_index,
            devices.len() - 1
        ));
    }

    debug!(
        "Using device {}: {}",
        args.device_index, devices[args.device_index]
    );

    // Connect to device
    let t = match Connect::<GenericTransport>::connect(&p, &devices[args.device_index]).await {
        Ok(v) => v,
        Err(e) => {
            error!(
                "Failed to connect to device: {}",
                devices[args.device_index]
            );
            return Err(e.into());
        }
    };

    // Execute command
    execute(t, args.cmd).await?;

    Ok(())
}

/// Execute a command with the provided transport
async fn execute<T>(t: DeviceHandle<T>, cmd: Actions) -> anyhow::Result<()>
where
    T: Exchange + Sync + Send,
    T::Error: Into<ledger_klaytn::Error>,
{
    debug!("Executing command: {:?}", cmd);

    match cmd {
        Actions::Version => {
            let v = t.app_version().await?;

            info!("app version: {}", v.version);
            info!("blind signing: {}", v.blind_signing);
        }
        Actions::Address {
            path,
            display,
            account,
        } => {
            info!("requesting address for path: {} (account: {})", path, account);

            let a = t.address(&path, display, account).await?;

            info!("address: {}", a.address);
            info!("public key: {}", a.public_key);
            if let Some(c) = &a.chain_code {
                info!("chain code: {}", c);
            }
        }
        Actions::Sign {
            kind,
            path,
            preimage,
            input,
            protocol,
            verify,
            account,
            output,
        } => {
            // Load unsigned transaction
            let tx = match (preimage, input) {
                (Some(p), _) => {
                    let kind = kind.ok_or_else(|| {
                        anyhow::anyhow!("--kind is required when signing a --preimage")
                    })?;
                    UnsignedTx::new(kind, p.0)
                }
                (None, Some(i)) => {
                    let mut tx: UnsignedTx = read_input(&i).await?;
                    if let Some(k) = kind {
                        tx.kind = k;
                    }
                    tx
                }
                (None, None) => return Err(anyhow::anyhow!("--preimage or --input is required")),
            };

            info!(
                "signing {} transaction with path: {} (protocol {})",
                tx.kind, path, protocol
            );

            let signature = t.sign_transaction(&path, &tx, protocol).await?;

            info!("v: 0x{}", signature.v_hex());
            info!("r: 0x{}", signature.r_hex());
            info!("s: 0x{}", signature.s_hex());

            // Check the signer matches the device account
            let signer = match verify {
                true => {
                    let info = TxInfo::decode(&tx.preimage, tx.kind)?;
                    let recovered = recover_address(&tx.preimage, &signature, &info.chain_id)?;

                    let expected = t.address(&path, false, account).await?;
                    let expected = Address::from_str(&expected.address)?;

                    if recovered != expected {
                        return Err(anyhow::anyhow!(
                            "Recovered signer {} does not match device address {}",
                            recovered,
                            expected
                        ));
                    }

                    info!("verified signer: {}", recovered);

                    Some(recovered.to_string())
                }
                false => None,
            };

            // Write output file
            if let Some(o) = output {
                let signed = SignedTx {
                    tx,
                    signature,
                    signer,
                };
                write_output(&o, &signed).await?;
            }
        }
        // Handled prior to connecting
        Actions::List => (),
    }

    Ok(())
}

/// Helper to read input files where required
async fn read_input<T: DeserializeOwned>(file_name: &str) -> anyhow::Result<T> {
    debug!("Reading input from '{}'", file_name);

    let s = tokio::fs::read_to_string(file_name).await?;

    // Determine format from file name
    let p = Path::new(file_name);

    // Decode based on input extension
    let v = match p.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&s)?,
        _ => return Err(anyhow::anyhow!("unsupported input file format")),
    };

    Ok(v)
}

/// Helper to write output files if `--output` argument is provided
async fn write_output(file_name: &str, value: &impl Serialize) -> anyhow::Result<()> {
    debug!("Writing output to '{}'", file_name);

    // Determine format from file name
    let p = Path::new(file_name);
    match p.extension().and_then(|e| e.to_str()) {
        // Encode to JSON for `.json` files
        Some("json") => {
            let s = serde_json::to_string_pretty(value)?;
            tokio::fs::write(p, s).await?;
        }
        _ => return Err(anyhow::anyhow!("unsupported output file format")),
    }

    Ok(())
}
