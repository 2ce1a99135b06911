//! The node: an owned chain instance and the commands it serves
//!
//! Mutations follow prepare -> mine -> commit. The block template is built
//! under a read lock, mined on a blocking worker with no lock held, and
//! committed under the write lock through `ChainState::append`, which
//! re-validates against whatever the tip is by then.

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::create_genesis_block;
use crate::config::Config;
use crate::consensus::{Block, ForkChoice, LongestChainForkChoice, Payload, ValidationError};
use crate::ledger::{Address, TokenError, TokenOperation};
use crate::mining::{Miner, MiningResult};
use crate::p2p::Message;
use crate::storage::{ChainState, ChainStats, Snapshot, SnapshotStore, StoreError};
use crate::wallet::{validate_address, KeyPair};

/// Node errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Block {index} not found")]
    NotFound { index: u64 },
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Mining timed out")]
    MiningTimedOut,
    #[error("Difficulty {0} can never be met")]
    Unsatisfiable(u32),
    #[error("Chain tip moved during each of {0} mining attempts")]
    StaleTip(u32),
    #[error("Mining task failed: {0}")]
    MiningTask(String),
}

/// Token metadata plus the current supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSummary {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: u64,
    pub creator: Address,
}

/// A running chain instance
pub struct Node {
    config: Config,
    state: RwLock<ChainState>,
    /// Stop signals of searches currently running
    in_flight: Mutex<Vec<Arc<AtomicBool>>>,
    fork_choice: LongestChainForkChoice,
}

/// Registration of one running search in `Node::in_flight`.
///
/// Dropping it raises the stop signal and deregisters it, so a search whose
/// caller went away stops at its next poll.
struct InFlight<'a> {
    registry: &'a Mutex<Vec<Arc<AtomicBool>>>,
    signal: Arc<AtomicBool>,
}

impl<'a> InFlight<'a> {
    fn register(registry: &'a Mutex<Vec<Arc<AtomicBool>>>, signal: Arc<AtomicBool>) -> Self {
        registry.lock().push(Arc::clone(&signal));
        Self { registry, signal }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.signal.store(true, Ordering::SeqCst);
        self.registry.lock().retain(|s| !Arc::ptr_eq(s, &self.signal));
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Node {
    /// Start a fresh chain whose genesis credits `creator`.
    ///
    /// Mines the genesis block on the calling thread. From async code, call
    /// it through `tokio::task::block_in_place` or `spawn_blocking`.
    pub fn new(config: Config, creator: &KeyPair) -> Result<Self, NodeError> {
        let difficulty = config.chain.difficulty;
        let genesis = create_genesis_block(creator, &config.token.to_info(), difficulty, now_millis());

        let genesis = match Miner::new(config.mining.timeout()).mine_block(genesis) {
            MiningResult::Success(block) => block,
            MiningResult::Interrupted => return Err(NodeError::MiningCancelled),
            MiningResult::TimedOut => return Err(NodeError::MiningTimedOut),
            MiningResult::Unsatisfiable => return Err(NodeError::Unsatisfiable(difficulty)),
        };

        let state = ChainState::new(genesis, difficulty)?;
        info!(
            "Created genesis block {} with {} {} for {}",
            state.tip().hash,
            config.token.initial_supply,
            config.token.symbol,
            creator.address
        );
        Ok(Self::from_state(config, state))
    }

    /// Wrap an existing chain
    pub fn from_state(config: Config, state: ChainState) -> Self {
        Self {
            config,
            state: RwLock::new(state),
            in_flight: Mutex::new(Vec::new()),
            fork_choice: LongestChainForkChoice,
        }
    }

    /// Load the chain from `store`, falling back to a fresh genesis when
    /// the snapshot is absent or unusable. Blocks like [`Node::new`].
    pub fn load_or_genesis(config: Config, creator: &KeyPair, store: &dyn SnapshotStore) -> Result<Self, NodeError> {
        let restored = match store.load() {
            Ok(Some(snapshot)) => match snapshot.into_state() {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!("Discarding stored snapshot: {}", e);
                    None
                }
            },
            Ok(None) => {
                info!("No stored snapshot, creating a new chain");
                None
            }
            Err(e) => {
                warn!("Failed to load snapshot: {}", e);
                None
            }
        };

        match restored {
            Some(state) => {
                info!("Loaded {} blocks, tip {}", state.len(), state.tip().hash);
                Ok(Self::from_state(config, state))
            }
            None => Self::new(config, creator),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ---- reads ----

    /// Copy of every block
    pub fn chain(&self) -> Vec<Block> {
        self.state.read().blocks().to_vec()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// A node always holds its genesis block
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn tip(&self) -> Block {
        self.state.read().tip().clone()
    }

    pub fn block(&self, index: u64) -> Result<Block, NodeError> {
        self.state
            .read()
            .block(index)
            .cloned()
            .ok_or(NodeError::NotFound { index })
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.state.read().ledger().balance_of(address)
    }

    pub fn allowance(&self, owner: &str, spender: &str) -> u64 {
        self.state.read().ledger().allowance(owner, spender)
    }

    pub fn balances(&self) -> BTreeMap<Address, u64> {
        self.state.read().ledger().balances().clone()
    }

    pub fn token_info(&self) -> TokenSummary {
        let state = self.state.read();
        let ledger = state.ledger();
        TokenSummary {
            name: ledger.name.clone(),
            symbol: ledger.symbol.clone(),
            decimals: ledger.decimals,
            total_supply: ledger.total_supply(),
            creator: ledger.creator().to_string(),
        }
    }

    pub fn stats(&self) -> ChainStats {
        self.state.read().get_stats()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_state(&self.state.read())
    }

    pub fn save(&self, store: &dyn SnapshotStore) -> Result<(), NodeError> {
        store.save(&self.snapshot())?;
        Ok(())
    }

    /// Re-validate the whole chain; failures are logged and returned
    pub fn validate(&self) -> Result<(), ValidationError> {
        let result = self.state.read().validate();
        if let Err(e) = &result {
            warn!("Chain validation failed at block {:?}: {}", e.index(), e);
        }
        result
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    // ---- mutations ----

    /// Append a data block, signed when `signer` is given
    pub async fn create_block(&self, data: serde_json::Value, signer: Option<&KeyPair>) -> Result<Block, NodeError> {
        let payload = Payload::Data {
            data,
            signer: signer.map(|k| k.public_key.clone()),
        };
        self.submit(payload, signer).await
    }

    pub async fn transfer(&self, sender: &KeyPair, to: &str, amount: u64) -> Result<Block, NodeError> {
        check_address(to)?;
        let operation = TokenOperation::Transfer {
            from: sender.address.clone(),
            to: to.to_string(),
            amount,
        };
        self.submit_operation(sender, operation).await
    }

    pub async fn approve(&self, owner: &KeyPair, spender: &str, amount: u64) -> Result<Block, NodeError> {
        check_address(spender)?;
        let operation = TokenOperation::Approve {
            owner: owner.address.clone(),
            spender: spender.to_string(),
            amount,
        };
        self.submit_operation(owner, operation).await
    }

    pub async fn transfer_from(
        &self,
        spender: &KeyPair,
        owner: &str,
        to: &str,
        amount: u64,
    ) -> Result<Block, NodeError> {
        check_address(owner)?;
        check_address(to)?;
        let operation = TokenOperation::TransferFrom {
            spender: spender.address.clone(),
            owner: owner.to_string(),
            to: to.to_string(),
            amount,
        };
        self.submit_operation(spender, operation).await
    }

    pub async fn mint(&self, authority: &KeyPair, to: &str, amount: u64) -> Result<Block, NodeError> {
        check_address(to)?;
        let operation = TokenOperation::Mint {
            authority: authority.address.clone(),
            to: to.to_string(),
            amount,
        };
        self.submit_operation(authority, operation).await
    }

    async fn submit_operation(&self, signer: &KeyPair, operation: TokenOperation) -> Result<Block, NodeError> {
        let payload = Payload::Token {
            operation,
            public_key: signer.public_key.clone(),
        };
        self.submit(payload, Some(signer)).await
    }

    async fn submit(&self, payload: Payload, signer: Option<&KeyPair>) -> Result<Block, NodeError> {
        let attempts = self.config.mining.max_retries + 1;

        for attempt in 1..=attempts {
            let template = {
                let state = self.state.read();
                state.check_payload(&payload)?;
                let difficulty = self.config.chain.difficulty.max(state.min_difficulty());
                state.next_block(payload.clone(), signer, now_millis(), difficulty)
            };

            let block = self.mine(template).await?;

            let mut state = self.state.write();
            match state.append(block.clone()) {
                Ok(()) => return Ok(block),
                Err(ValidationError::InvalidLinkage { index }) => {
                    warn!(
                        "Tip moved while mining block #{} (attempt {}/{}), discarding",
                        index, attempt, attempts
                    );
                }
                Err(ValidationError::Ledger { source, .. }) => return Err(source.into()),
                Err(e) => return Err(e.into()),
            }
        }

        Err(NodeError::StaleTip(attempts))
    }

    async fn mine(&self, block: Block) -> Result<Block, NodeError> {
        let miner = Miner::new(self.config.mining.timeout());
        let registration = InFlight::register(&self.in_flight, miner.stop_signal());

        let index = block.index;
        let difficulty = block.difficulty;
        let interval = self.config.mining.progress_interval;
        let outcome = tokio::task::spawn_blocking(move || {
            miner.mine_with_progress(block, interval, |attempts| {
                debug!("Mining block #{}: {} attempts so far", index, attempts)
            })
        })
        .await;

        drop(registration);

        match outcome.map_err(|e| NodeError::MiningTask(e.to_string()))? {
            MiningResult::Success(block) => Ok(block),
            MiningResult::Interrupted => {
                info!("Mining of block #{} cancelled", index);
                Err(NodeError::MiningCancelled)
            }
            MiningResult::TimedOut => Err(NodeError::MiningTimedOut),
            MiningResult::Unsatisfiable => Err(NodeError::Unsatisfiable(difficulty)),
        }
    }

    /// Number of nonce searches currently running
    pub fn active_miners(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Raise the stop signal of every running search; returns how many
    pub fn cancel_mining(&self) -> usize {
        let in_flight = self.in_flight.lock();
        for signal in in_flight.iter() {
            signal.store(true, Ordering::SeqCst);
        }
        in_flight.len()
    }

    /// Longest-valid-chain resolution against candidate chains.
    ///
    /// Returns true when the local chain (and its ledger) was replaced.
    /// Writers are excluded for the whole call; readers are not.
    pub fn resolve(&self, candidates: Vec<Vec<Block>>) -> bool {
        let state = self.state.upgradable_read();
        let report = self.fork_choice.select(&state, candidates);

        for (position, e) in &report.rejected {
            debug!("Candidate {} rejected at block {:?}", position, e.index());
        }

        let Some(winner) = report.winner else {
            return false;
        };

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        let (old_len, new_len) = (state.len(), winner.len());
        *state = winner;
        // while still holding the lock: only searches on the old tip stop
        let cancelled = self.cancel_mining();
        drop(state);

        info!(
            "Replaced local chain ({} blocks) with longer chain ({} blocks); cancelled {} mining task(s)",
            old_len, new_len, cancelled
        );
        true
    }

    /// Answer a peer message. `GetChain` is answered with the local chain,
    /// `Candidates` are resolved and answered with the resulting chain when
    /// it changed. Unsolicited `Chain` messages are treated as a single
    /// candidate.
    pub fn handle_message(&self, message: Message) -> Option<Message> {
        debug!("Handling {} message", message.command());
        match message {
            Message::GetChain => Some(Message::Chain(self.chain())),
            Message::Chain(blocks) => {
                self.resolve(vec![blocks]);
                None
            }
            Message::Candidates(chains) => self
                .resolve(chains)
                .then(|| Message::Chain(self.chain())),
        }
    }
}

fn check_address(address: &str) -> Result<(), NodeError> {
    validate_address(address).map_err(|reason| NodeError::InvalidAddress {
        address: address.to_string(),
        reason,
    })
}
