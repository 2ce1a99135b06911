//! Block and chain validation
//!
//! Pure functions for validating blocks and whole chains. Chain
//! validation also replays every token operation, so a chain that passes
//! comes with the ledger it implies.

use std::fmt;
use thiserror::Error;

use crate::constants::MAX_DIFFICULTY;
use crate::consensus::{Block, Payload};
use crate::crypto::{Hash, SchnorrSignature};
use crate::ledger::{TokenError, TokenLedger};

/// Why a block's hash was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFault {
    /// Stored hash differs from the recomputed one
    Mismatch,
    /// Hash lacks the block's required leading zeros
    InsufficientWork,
    /// Block claims less work than the chain requires
    BelowMinimumDifficulty,
}

impl fmt::Display for HashFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashFault::Mismatch => write!(f, "does not match block contents"),
            HashFault::InsufficientWork => write!(f, "does not meet difficulty"),
            HashFault::BelowMinimumDifficulty => write!(f, "difficulty below chain minimum"),
        }
    }
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Invalid genesis block: {0}")]
    InvalidGenesis(&'static str),
    #[error("Block {index}: previous hash does not match preceding block")]
    InvalidLinkage { index: u64 },
    #[error("Block {index}: expected index {expected}")]
    InvalidIndex { index: u64, expected: u64 },
    #[error("Block {index}: hash {fault}")]
    InvalidHash { index: u64, fault: HashFault },
    #[error("Block {index}: invalid signature")]
    InvalidSignature { index: u64 },
    #[error("Block {index}: {source}")]
    Ledger { index: u64, source: TokenError },
    #[error("Chain does not share our genesis block")]
    GenesisMismatch,
}

impl ValidationError {
    /// Index of the offending block, where one exists
    pub fn index(&self) -> Option<u64> {
        match self {
            ValidationError::InvalidLinkage { index }
            | ValidationError::InvalidIndex { index, .. }
            | ValidationError::InvalidHash { index, .. }
            | ValidationError::InvalidSignature { index }
            | ValidationError::Ledger { index, .. } => Some(*index),
            ValidationError::InvalidGenesis(_) => Some(0),
            ValidationError::EmptyChain | ValidationError::GenesisMismatch => None,
        }
    }
}

/// Validate proof of work
///
/// The stored hash must be reproducible, meet the block's own difficulty,
/// and that difficulty must not be below the chain minimum.
pub fn validate_pow(block: &Block, min_difficulty: u32) -> Result<(), ValidationError> {
    let fault = if !block.has_valid_hash() {
        Some(HashFault::Mismatch)
    } else if block.difficulty < min_difficulty || block.difficulty > MAX_DIFFICULTY {
        Some(HashFault::BelowMinimumDifficulty)
    } else if !block.meets_difficulty() {
        Some(HashFault::InsufficientWork)
    } else {
        None
    };

    match fault {
        Some(fault) => Err(ValidationError::InvalidHash {
            index: block.index,
            fault,
        }),
        None => Ok(()),
    }
}

/// Validate the block signature against the payload's signer.
///
/// Unsigned data blocks carry opaque random bits and are not checked.
/// For token operations and genesis the signer must also own the acting
/// address.
pub fn validate_signature(block: &Block) -> Result<(), ValidationError> {
    let invalid = ValidationError::InvalidSignature { index: block.index };

    let Some(signer) = block.payload.signer() else {
        return Ok(());
    };

    let address_ok = match &block.payload {
        Payload::Token { operation, .. } => operation.actor() == signer.to_address(),
        Payload::Genesis {
            creator_address, ..
        } => *creator_address == signer.to_address(),
        Payload::Data { .. } => true,
    };
    if !address_ok {
        return Err(invalid);
    }

    let signature = SchnorrSignature::from_hex(&block.signature).map_err(|_| invalid.clone())?;
    let message = Block::signing_hash(&block.previous_hash, &block.payload);
    if !signer.verify(&message, &signature) {
        return Err(invalid);
    }
    Ok(())
}

/// Validate a block against the block it claims to follow
pub fn validate_block(block: &Block, prev: &Block, min_difficulty: u32) -> Result<(), ValidationError> {
    if block.previous_hash != prev.hash {
        return Err(ValidationError::InvalidLinkage { index: block.index });
    }

    let expected = prev.index + 1;
    if block.index != expected {
        return Err(ValidationError::InvalidIndex {
            index: block.index,
            expected,
        });
    }

    if matches!(block.payload, Payload::Genesis { .. }) {
        return Err(ValidationError::InvalidGenesis("genesis payload after index 0"));
    }

    validate_pow(block, min_difficulty)?;
    validate_signature(block)
}

/// Validate the genesis block and derive the initial ledger from it
pub fn validate_genesis(block: &Block, min_difficulty: u32) -> Result<TokenLedger, ValidationError> {
    if block.index != 0 {
        return Err(ValidationError::InvalidGenesis("index is not 0"));
    }
    if block.previous_hash != Hash::zero() {
        return Err(ValidationError::InvalidGenesis("previous hash is not the zero sentinel"));
    }

    let Payload::Genesis {
        creator_address,
        token,
        ..
    } = &block.payload
    else {
        return Err(ValidationError::InvalidGenesis("payload is not a genesis record"));
    };

    validate_pow(block, min_difficulty)?;
    validate_signature(block)?;

    Ok(TokenLedger::new(token, creator_address))
}

/// Apply the ledger effect recorded by `block`, if any
pub fn apply_payload(ledger: &mut TokenLedger, block: &Block) -> Result<(), ValidationError> {
    match block.payload.operation() {
        Some(operation) => ledger.apply(operation).map_err(|source| ValidationError::Ledger {
            index: block.index,
            source,
        }),
        None => Ok(()),
    }
}

/// Chain validation result
#[derive(Debug, Clone)]
pub struct ChainValidationResult {
    /// Ledger obtained by replaying every block
    pub ledger: TokenLedger,
    /// Number of blocks
    pub length: u64,
    /// Tip hash
    pub tip_hash: Hash,
}

/// Validate a chain of blocks from genesis, replaying the ledger.
///
/// Fails fast on the first offending block.
pub fn validate_chain(blocks: &[Block], min_difficulty: u32) -> Result<ChainValidationResult, ValidationError> {
    let genesis = blocks.first().ok_or(ValidationError::EmptyChain)?;
    let mut ledger = validate_genesis(genesis, min_difficulty)?;

    for pair in blocks.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);
        validate_block(block, prev, min_difficulty)?;
        apply_payload(&mut ledger, block)?;
    }

    let tip = &blocks[blocks.len() - 1];
    Ok(ChainValidationResult {
        ledger,
        length: blocks.len() as u64,
        tip_hash: tip.hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_bytes;
    use serde_json::json;

    fn data_block(index: u64, prev: Hash, difficulty: u32) -> Block {
        let mut block = Block::new(
            index,
            0,
            Payload::Data {
                data: json!({"n": index}),
                signer: None,
            },
            prev,
            None,
            difficulty,
        );
        while !block.meets_difficulty() {
            block.nonce += 1;
            block.hash = block.calculate_hash();
        }
        block
    }

    #[test]
    fn test_validate_pow() {
        let block = data_block(1, Hash::zero(), 1);
        assert!(validate_pow(&block, 1).is_ok());
        assert!(validate_pow(&block, 0).is_ok());
    }

    #[test]
    fn test_pow_below_minimum() {
        let block = data_block(1, Hash::zero(), 0);
        let err = validate_pow(&block, 1).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidHash {
                index: 1,
                fault: HashFault::BelowMinimumDifficulty
            }
        );
    }

    #[test]
    fn test_pow_tampered_hash() {
        let mut block = data_block(3, Hash::zero(), 1);
        block.nonce += 1;
        assert_eq!(
            validate_pow(&block, 1),
            Err(ValidationError::InvalidHash {
                index: 3,
                fault: HashFault::Mismatch
            })
        );
    }

    #[test]
    fn test_pow_insufficient_work() {
        let mut block = data_block(1, Hash::zero(), 0);
        while block.hash.meets_difficulty(1) {
            block.nonce += 1;
            block.hash = block.calculate_hash();
        }
        block.difficulty = 1;
        assert_eq!(
            validate_pow(&block, 0),
            Err(ValidationError::InvalidHash {
                index: 1,
                fault: HashFault::InsufficientWork
            })
        );
    }

    #[test]
    fn test_linkage_and_index() {
        let prev = data_block(1, hash_bytes(b"x"), 0);

        let unlinked = data_block(2, hash_bytes(b"other"), 0);
        assert_eq!(
            validate_block(&unlinked, &prev, 0),
            Err(ValidationError::InvalidLinkage { index: 2 })
        );

        let skipped = data_block(3, prev.hash, 0);
        assert_eq!(
            validate_block(&skipped, &prev, 0),
            Err(ValidationError::InvalidIndex { index: 3, expected: 2 })
        );

        let good = data_block(2, prev.hash, 0);
        assert!(validate_block(&good, &prev, 0).is_ok());
    }

    #[test]
    fn test_empty_chain() {
        assert!(matches!(validate_chain(&[], 0), Err(ValidationError::EmptyChain)));
    }

    #[test]
    fn test_non_genesis_first_block() {
        let block = data_block(0, Hash::zero(), 0);
        assert!(matches!(
            validate_chain(&[block], 0),
            Err(ValidationError::InvalidGenesis(_))
        ));
    }

    #[test]
    fn test_error_index() {
        assert_eq!(ValidationError::InvalidLinkage { index: 4 }.index(), Some(4));
        assert_eq!(ValidationError::GenesisMismatch.index(), None);
    }
}
