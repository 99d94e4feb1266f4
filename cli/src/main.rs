use std::path::PathBuf;

use clap::{Parser, Subcommand};

use agora_consensus::{make_genesis_block, Ledger};
use agora_core::address::{AccountId, SeedAddress};
use agora_core::config::Config;
use agora_core::crypto::Seed;
use agora_core::{CanonicalSerialize, KeyPair};
use agora_wallet::WalletKeyStore;

#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "Agora blockchain node CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full node, loading or constructing a genesis block and then
    /// idling until a shutdown signal arrives. Wiring a live
    /// `AgreementEngine` and `PeerClient` set is a deployment concern left
    /// to the operator; this command only builds the in-process ledger.
    RunNode {
        /// Path to a hex-encoded canonical genesis block. When absent, a
        /// fresh genesis is built from `--validator-seed`.
        #[arg(long)]
        genesis: Option<PathBuf>,
        /// Strkey seed phrase for each validator funded at genesis.
        /// Repeatable; ignored when `--genesis` is given.
        #[arg(long = "validator-seed")]
        validator_seeds: Vec<String>,
        /// Enrollment pre-image chain length for a freshly built genesis.
        #[arg(long, default_value_t = 20)]
        cycle_length: u32,
    },
    /// Prints a freshly generated seed phrase and its matching address.
    Keygen,
    /// Emits a hex-encoded canonical genesis block to stdout.
    Genesis {
        /// Strkey seed phrase for each validator funded at genesis.
        #[arg(long = "validator-seed", required = true)]
        validator_seeds: Vec<String>,
        #[arg(long, default_value_t = 20)]
        cycle_length: u32,
    },
}

fn load_validator_keys(seeds: &[String]) -> Vec<KeyPair> {
    seeds
        .iter()
        .map(|phrase| {
            WalletKeyStore::from_seed_phrase(phrase)
                .expect("invalid validator seed phrase")
                .key_pair
        })
        .collect()
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    match cli.command {
        Commands::RunNode { genesis, validator_seeds, cycle_length } => run_node(genesis, validator_seeds, cycle_length),
        Commands::Keygen => keygen(),
        Commands::Genesis { validator_seeds, cycle_length } => genesis(validator_seeds, cycle_length),
    }
}

fn run_node(genesis_path: Option<PathBuf>, validator_seeds: Vec<String>, cycle_length: u32) {
    let config = Config::default();

    let genesis_block = match genesis_path {
        Some(path) => {
            let bytes = std::fs::read(&path).expect("failed to read genesis file");
            let hex_str = String::from_utf8(bytes).expect("genesis file is not valid UTF-8");
            let decoded = hex::decode(hex_str.trim()).expect("genesis file is not valid hex");
            agora_core::Block::canonical_decode(&decoded).expect("malformed genesis block")
        }
        None => {
            let keys = load_validator_keys(&validator_seeds);
            make_genesis_block(&config, &keys, cycle_length)
        }
    };

    let ledger = Ledger::new(config, genesis_block).expect("genesis block rejected by its own validator");
    println!("agora node started at height {}", ledger.get_block_height());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to start async runtime");
    runtime.block_on(async {
        tokio::signal::ctrl_c().await.expect("failed to listen for shutdown signal");
        println!("shutting down");
    });
}

fn keygen() {
    let wallet = WalletKeyStore::generate();
    let seed_bytes: [u8; 32] = wallet.key_pair.secret.0[..32].try_into().expect("32 bytes");
    let seed_phrase = SeedAddress(Seed(seed_bytes)).to_string();
    let address = AccountId(wallet.key_pair.public).to_string();
    println!("seed:    {seed_phrase}");
    println!("address: {address}");
}

fn genesis(validator_seeds: Vec<String>, cycle_length: u32) {
    let config = Config::default();
    let keys = load_validator_keys(&validator_seeds);
    let block = make_genesis_block(&config, &keys, cycle_length);
    println!("{}", hex::encode(block.canonical_encode()));
}
