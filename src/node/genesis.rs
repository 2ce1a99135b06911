//! Genesis block generation
//!
//! The genesis block fixes the token metadata and the creator address,
//! which receives the whole initial supply and is the only minter.

use crate::consensus::{Block, Payload};
use crate::constants::GENESIS_MESSAGE;
use crate::crypto::Hash;
use crate::ledger::TokenInfo;
use crate::wallet::KeyPair;

/// Create the (unmined) genesis block, signed by `creator`
pub fn create_genesis_block(creator: &KeyPair, token: &TokenInfo, difficulty: u32, timestamp: i64) -> Block {
    let payload = Payload::Genesis {
        message: GENESIS_MESSAGE.to_string(),
        creator_public_key: creator.public_key.clone(),
        creator_address: creator.address.clone(),
        token: token.clone(),
    };

    let signature = creator.sign(&Block::signing_hash(&Hash::zero(), &payload));

    Block::new(0, timestamp, payload, Hash::zero(), Some(signature.to_hex()), difficulty)
}

/// Genesis block statistics
#[derive(Debug, Clone)]
pub struct GenesisInfo {
    pub hash: Hash,
    pub timestamp: i64,
    pub difficulty: u32,
    pub creator_address: String,
    pub token: TokenInfo,
}

impl GenesisInfo {
    /// Extract the genesis record, `None` if `block` is not a genesis block
    pub fn from_block(block: &Block) -> Option<Self> {
        match &block.payload {
            Payload::Genesis {
                creator_address,
                token,
                ..
            } if block.is_genesis() => Some(Self {
                hash: block.hash,
                timestamp: block.timestamp,
                difficulty: block.difficulty,
                creator_address: creator_address.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }
}
