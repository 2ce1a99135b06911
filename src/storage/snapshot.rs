//! Chain + ledger snapshots
//!
//! The persisted form of a node: every block plus the token section. The
//! token section is redundant with the blocks and is checked against a
//! full replay when loaded.

use serde::{Deserialize, Serialize};

use super::{ChainState, StoreError};
use crate::consensus::Block;
use crate::ledger::TokenLedger;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chain: Vec<Block>,
    pub token: TokenLedger,
}

impl Snapshot {
    pub fn from_state(state: &ChainState) -> Self {
        Self {
            chain: state.blocks().to_vec(),
            token: state.ledger().clone(),
        }
    }

    /// Rebuild the chain, rejecting snapshots whose blocks are invalid or
    /// whose token section disagrees with the replayed ledger.
    ///
    /// Blocks are held to the difficulty recorded by the stored genesis, not
    /// to whatever difficulty is configured today.
    pub fn into_state(self) -> Result<ChainState, StoreError> {
        let min_difficulty = self
            .chain
            .first()
            .map(|genesis| genesis.difficulty)
            .ok_or_else(|| StoreError::CorruptSnapshot("snapshot has no blocks".into()))?;

        let state = ChainState::from_blocks(self.chain, min_difficulty)
            .map_err(|e| StoreError::CorruptSnapshot(format!("invalid chain: {}", e)))?;

        if state.ledger() != &self.token {
            return Err(StoreError::CorruptSnapshot(
                "token ledger does not match chain replay".into(),
            ));
        }
        Ok(state)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(self).map_err(|e| StoreError::CorruptSnapshot(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::CorruptSnapshot(e.to_string()))
    }
}
