//! Chain state management
//!
//! Owns the ordered blocks and the token ledger they imply. The ledger is
//! only ever changed together with an appended block, and can always be
//! rebuilt by replaying the blocks from genesis.

use log::info;
use serde::Serialize;

use crate::consensus::{
    apply_payload, validate_block, validate_chain, validate_genesis, Block, Payload, ValidationError,
};
use crate::crypto::Hash;
use crate::ledger::{TokenError, TokenLedger};
use crate::wallet::KeyPair;

/// Complete chain state
#[derive(Debug, Clone)]
pub struct ChainState {
    /// Blocks from genesis to tip, never empty
    blocks: Vec<Block>,
    /// Ledger after applying every block
    ledger: TokenLedger,
    /// Lowest difficulty any block may claim
    min_difficulty: u32,
}

impl ChainState {
    /// Create a chain from a mined genesis block
    pub fn new(genesis: Block, min_difficulty: u32) -> Result<Self, ValidationError> {
        let ledger = validate_genesis(&genesis, min_difficulty)?;
        Ok(Self {
            blocks: vec![genesis],
            ledger,
            min_difficulty,
        })
    }

    /// Rebuild a chain from raw blocks, validating everything and
    /// replaying the ledger
    pub fn from_blocks(blocks: Vec<Block>, min_difficulty: u32) -> Result<Self, ValidationError> {
        let result = validate_chain(&blocks, min_difficulty)?;
        Ok(Self {
            blocks,
            ledger: result.ledger,
            min_difficulty,
        })
    }

    /// The last block
    pub fn tip(&self) -> &Block {
        // blocks is never empty: every constructor starts from a genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    /// Number of blocks, including genesis
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// A chain always holds its genesis block
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block at `index`, if in range
    pub fn block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn min_difficulty(&self) -> u32 {
        self.min_difficulty
    }

    /// Dry-run the ledger effect of `payload` against the current tip
    pub fn check_payload(&self, payload: &Payload) -> Result<(), TokenError> {
        match payload.operation() {
            Some(operation) => self.ledger.check(operation),
            None => Ok(()),
        }
    }

    /// Build an unmined block on top of the tip.
    ///
    /// With a signer, the block signature covers the tip hash and payload.
    pub fn next_block(&self, payload: Payload, signer: Option<&KeyPair>, timestamp: i64, difficulty: u32) -> Block {
        let tip = self.tip();
        let signature = signer.map(|keypair| {
            keypair
                .sign(&Block::signing_hash(&tip.hash, &payload))
                .to_hex()
        });
        Block::new(tip.index + 1, timestamp, payload, tip.hash, signature, difficulty)
    }

    /// Append a mined block.
    ///
    /// Checks linkage, index, proof of work and signature, then applies the
    /// ledger effect. On any failure neither blocks nor ledger change.
    pub fn append(&mut self, block: Block) -> Result<(), ValidationError> {
        validate_block(&block, self.tip(), self.min_difficulty)?;
        apply_payload(&mut self.ledger, &block)?;

        info!(
            "Appended block #{} ({}) hash {}",
            block.index,
            describe(&block.payload),
            block.hash
        );
        self.blocks.push(block);
        Ok(())
    }

    /// Re-check every block from genesis, reporting the first failure
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_chain(&self.blocks, self.min_difficulty).map(|_| ())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get statistics about the chain state
    pub fn get_stats(&self) -> ChainStats {
        ChainStats {
            length: self.blocks.len() as u64,
            tip_hash: self.tip().hash,
            total_supply: self.ledger.total_supply(),
            holders: self.ledger.balances().len(),
            difficulty: self.min_difficulty,
        }
    }
}

fn describe(payload: &Payload) -> &'static str {
    match payload {
        Payload::Genesis { .. } => "genesis",
        Payload::Data { .. } => "data",
        Payload::Token { operation, .. } => operation.kind(),
    }
}

/// Statistics about the chain state
#[derive(Debug, Clone, Serialize)]
pub struct ChainStats {
    pub length: u64,
    pub tip_hash: Hash,
    pub total_supply: u64,
    pub holders: usize,
    pub difficulty: u32,
}
