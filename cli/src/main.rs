use std::process::ExitCode;

use clap::{Parser, Subcommand};
use num_bigint::BigInt;

use btc_core::config::Network;
use btc_core::fetch::HttpTxFetcher;
use btc_core::keys::{p2pkh_address, PrivateKey};
use btc_core::tx::Tx;
use btc_net::Peer;

#[derive(Parser)]
#[command(name = "btc")]
#[command(about = "Bitcoin protocol toolkit: keys, transactions, and header sync", version)]
struct Cli {
    /// Operate against testnet3 instead of mainnet.
    #[arg(long, global = true)]
    testnet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the P2PKH address for a WIF-encoded or raw decimal secret.
    Address {
        /// WIF-encoded private key, or a decimal secret exponent.
        key: String,
    },
    /// Sign one input of a transaction with a secret, fetching the spent
    /// output over the network to build the sighash.
    SignInput {
        /// Raw transaction hex.
        tx_hex: String,
        /// Index of the input to sign.
        index: usize,
        /// Decimal secret exponent.
        secret: String,
    },
    /// Dial a peer, complete the handshake, and fetch+validate a header
    /// chain starting after a given block hash.
    SyncHeaders {
        /// `host:port` of the peer to connect to.
        addr: String,
        /// Hex-encoded, display-order hash of the last known block.
        start_block: String,
    },
}

fn network(testnet: bool) -> Network {
    if testnet {
        Network::Testnet3
    } else {
        Network::Mainnet
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let net = network(cli.testnet);

    match cli.command {
        Commands::Address { key } => {
            let (secret, key_testnet, _compressed) = match PrivateKey::from_wif(&key) {
                Ok(parts) => parts,
                Err(_) => {
                    let secret = key.parse::<BigInt>().map_err(|e| format!("not a WIF key or decimal secret: {e}"))?;
                    (secret, cli.testnet, true)
                }
            };
            let private_key = PrivateKey::new(secret);
            let address = p2pkh_address(&private_key.sec_compressed(), key_testnet);
            println!("{address}");
            Ok(())
        }

        Commands::SignInput { tx_hex, index, secret } => {
            let raw = hex::decode(tx_hex.trim()).map_err(|e| format!("bad transaction hex: {e}"))?;
            let mut tx = Tx::parse(&mut std::io::Cursor::new(raw), net.is_testnet())
                .map_err(|e| format!("failed to parse transaction: {e}"))?;

            let secret = secret.parse::<BigInt>().map_err(|e| format!("bad secret: {e}"))?;
            let key = PrivateKey::new(secret);

            let fetcher = HttpTxFetcher::new();
            tx.sign_input(index, &key, &fetcher)
                .map_err(|e| format!("failed to sign input {index}: {e}"))?;

            println!("{}", hex::encode(tx.serialize()));
            Ok(())
        }

        Commands::SyncHeaders { addr, start_block } => {
            let hash_bytes = hex::decode(start_block.trim()).map_err(|e| format!("bad block hash: {e}"))?;
            if hash_bytes.len() != 32 {
                return Err("block hash must be 32 bytes".to_string());
            }
            let mut start = [0u8; 32];
            start.copy_from_slice(&hash_bytes);

            let mut peer = Peer::dial(addr.as_str(), net).map_err(|e| format!("dial failed: {e}"))?;
            peer.handshake(rand::random()).map_err(|e| format!("handshake failed: {e}"))?;
            tracing::info!(peer = %addr, "handshake complete");

            let headers = peer.get_headers(start).map_err(|e| format!("get_headers failed: {e}"))?;
            for header in &headers {
                println!("{}", hex::encode(header.hash()));
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
