//! MTK Token Chain Node
//!
//! Command-line front end: every command loads the chain from the data
//! directory, runs, and saves the chain back when it changed.

use clap::{Parser, Subcommand};
use log::{info, warn};
use mtk_core::config::{Config, StorageBackend};
use mtk_core::consensus::Block;
use mtk_core::node::{GenesisInfo, Node, NodeError};
use mtk_core::storage::{JsonFileStore, SledStore, SnapshotStore};
use mtk_core::wallet::KeyPair;
use std::fs;
use std::path::{Path, PathBuf};

const CREATOR_KEY: &str = "creator";

#[derive(Parser)]
#[command(name = "mtk-node", version, about = "MTK token chain node")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "mtk.toml")]
    config: PathBuf,

    /// Overrides `storage.data_dir`
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the chain (or load it) and print the genesis block
    Init,
    /// Generate a named key pair
    Keygen { name: String },
    /// Print the address of a named key
    Address { name: String },
    /// Append a data block
    AddBlock {
        /// JSON value to store
        data: String,
        /// Sign the block with this key
        #[arg(long)]
        key: Option<String>,
    },
    /// Print every block
    Chain,
    /// Print one block
    Block { index: u64 },
    Balance { address: String },
    Allowance { owner: String, spender: String },
    Balances,
    TokenInfo,
    Transfer {
        to: String,
        amount: u64,
        #[arg(long, default_value = CREATOR_KEY)]
        key: String,
    },
    Approve {
        spender: String,
        amount: u64,
        #[arg(long, default_value = CREATOR_KEY)]
        key: String,
    },
    TransferFrom {
        owner: String,
        to: String,
        amount: u64,
        #[arg(long)]
        key: String,
    },
    Mint {
        to: String,
        amount: u64,
        #[arg(long, default_value = CREATOR_KEY)]
        key: String,
    },
    /// Re-validate the whole chain
    Validate,
    /// Adopt the longest valid chain among JSON chain files
    Resolve { files: Vec<PathBuf> },
    Stats,
}

fn key_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join("keys").join(format!("{}.key", name))
}

fn open_store(config: &Config) -> Result<Box<dyn SnapshotStore>, Box<dyn std::error::Error>> {
    let data_dir = &config.storage.data_dir;
    Ok(match config.storage.backend {
        StorageBackend::Sled => Box::new(SledStore::open(data_dir.join("chain.db"))?),
        StorageBackend::Json => Box::new(JsonFileStore::new(data_dir.join("blockchain.json"))),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a mutation, cancelling the in-flight search on Ctrl+C
async fn mine_or_interrupt<F>(node: &Node, mutation: F) -> Result<Block, NodeError>
where
    F: std::future::Future<Output = Result<Block, NodeError>>,
{
    tokio::select! {
        result = mutation => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping miner");
            node.cancel_mining();
            Err(NodeError::MiningCancelled)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    let data_dir = config.storage.data_dir.clone();

    match &cli.command {
        Command::Keygen { name } => {
            let path = key_path(&data_dir, name);
            if path.exists() {
                return Err(format!("key {} already exists at {}", name, path.display()).into());
            }
            let keypair = KeyPair::generate();
            keypair.save(&path)?;
            println!("{}", keypair.address);
            return Ok(());
        }
        Command::Address { name } => {
            println!("{}", KeyPair::load(key_path(&data_dir, name))?.address);
            return Ok(());
        }
        _ => {}
    }

    let creator = KeyPair::load_or_generate(key_path(&data_dir, CREATOR_KEY))?;
    let store = open_store(&config)?;
    let node = tokio::task::block_in_place(|| Node::load_or_genesis(config, &creator, store.as_ref()))?;
    let load_key = |name: &str| KeyPair::load(key_path(&data_dir, name));

    let mutated = match cli.command {
        Command::Keygen { .. } | Command::Address { .. } => false,
        Command::Init => {
            if let Some(genesis) = GenesisInfo::from_block(&node.block(0)?) {
                println!("Genesis Block Information:");
                println!("  Hash:        {}", genesis.hash);
                println!("  Timestamp:   {}", genesis.timestamp);
                println!("  Difficulty:  {}", genesis.difficulty);
                println!("  Creator:     {}", genesis.creator_address);
                println!(
                    "  Token:       {} ({}), {} decimals, supply {}",
                    genesis.token.name, genesis.token.symbol, genesis.token.decimals, genesis.token.total_supply
                );
            }
            true
        }
        Command::AddBlock { data, key } => {
            let data: serde_json::Value = serde_json::from_str(&data)?;
            let signer = key.as_deref().map(load_key).transpose()?;
            let block = mine_or_interrupt(&node, node.create_block(data, signer.as_ref())).await?;
            info!("Added block #{} {}", block.index, block.hash);
            true
        }
        Command::Chain => {
            print_json(&node.chain())?;
            false
        }
        Command::Block { index } => {
            print_json(&node.block(index)?)?;
            false
        }
        Command::Balance { address } => {
            println!("{}", node.balance(&address));
            false
        }
        Command::Allowance { owner, spender } => {
            println!("{}", node.allowance(&owner, &spender));
            false
        }
        Command::Balances => {
            print_json(&node.balances())?;
            false
        }
        Command::TokenInfo => {
            print_json(&node.token_info())?;
            false
        }
        Command::Transfer { to, amount, key } => {
            let sender = load_key(&key)?;
            let block = mine_or_interrupt(&node, node.transfer(&sender, &to, amount)).await?;
            info!("Transferred {} to {} in block #{}", amount, to, block.index);
            true
        }
        Command::Approve { spender, amount, key } => {
            let owner = load_key(&key)?;
            let block = mine_or_interrupt(&node, node.approve(&owner, &spender, amount)).await?;
            info!("Approved {} for {} in block #{}", amount, spender, block.index);
            true
        }
        Command::TransferFrom { owner, to, amount, key } => {
            let spender = load_key(&key)?;
            let block = mine_or_interrupt(&node, node.transfer_from(&spender, &owner, &to, amount)).await?;
            info!("Moved {} from {} to {} in block #{}", amount, owner, to, block.index);
            true
        }
        Command::Mint { to, amount, key } => {
            let authority = load_key(&key)?;
            let block = mine_or_interrupt(&node, node.mint(&authority, &to, amount)).await?;
            info!("Minted {} to {} in block #{}", amount, to, block.index);
            true
        }
        Command::Validate => {
            match node.validate() {
                Ok(()) => println!("Chain is valid ({} blocks)", node.len()),
                Err(e) => println!("Chain is invalid: {}", e),
            }
            false
        }
        Command::Resolve { files } => {
            let mut candidates = Vec::with_capacity(files.len());
            for file in &files {
                let blocks: Vec<Block> = serde_json::from_slice(&fs::read(file)?)?;
                candidates.push(blocks);
            }
            let replaced = node.resolve(candidates);
            println!(
                "{}",
                if replaced {
                    "Local chain replaced"
                } else {
                    "Local chain kept"
                }
            );
            replaced
        }
        Command::Stats => {
            print_json(&node.stats())?;
            false
        }
    };

    if mutated {
        node.save(store.as_ref())?;
    }
    Ok(())
}
