//! Block structure for the MTK chain
//!
//! A block owns its payload and caches the hash of its canonical form.
//! Once a block is appended to a chain it is never modified.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::SIGNATURE_BITS;
use crate::crypto::{hash_bytes, random_hex, Hash, PublicKey};
use crate::ledger::{TokenInfo, TokenOperation};

/// What a block records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// First block: fixes the token and its creator
    Genesis {
        message: String,
        creator_public_key: PublicKey,
        creator_address: String,
        token: TokenInfo,
    },
    /// Arbitrary data, optionally signed
    Data {
        data: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signer: Option<PublicKey>,
    },
    /// A signed ledger mutation
    Token {
        operation: TokenOperation,
        public_key: PublicKey,
    },
}

impl Payload {
    /// Key whose signature the block must carry, if any
    pub fn signer(&self) -> Option<&PublicKey> {
        match self {
            Payload::Genesis {
                creator_public_key, ..
            } => Some(creator_public_key),
            Payload::Data { signer, .. } => signer.as_ref(),
            Payload::Token { public_key, .. } => Some(public_key),
        }
    }

    pub fn operation(&self) -> Option<&TokenOperation> {
        match self {
            Payload::Token { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, genesis is 0
    pub index: u64,
    /// Creation time, Unix milliseconds (UTC)
    pub timestamp: i64,
    pub payload: Payload,
    /// Hash of the preceding block, zero for genesis
    pub previous_hash: Hash,
    /// Hex signature bound to the payload (random bits when unsigned)
    pub signature: String,
    /// Required leading zero hex digits
    pub difficulty: u32,
    /// Nonce found by mining
    pub nonce: u64,
    /// Cached hash of the canonical form
    pub hash: Hash,
}

impl Block {
    /// Create an unmined block (nonce 0) and compute its hash.
    ///
    /// Without a signature the block carries `SIGNATURE_BITS` random bits.
    pub fn new(
        index: u64,
        timestamp: i64,
        payload: Payload,
        previous_hash: Hash,
        signature: Option<String>,
        difficulty: u32,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            payload,
            previous_hash,
            signature: signature.unwrap_or_else(|| random_hex(SIGNATURE_BITS)),
            difficulty,
            nonce: 0,
            hash: Hash::zero(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Canonical JSON of the hashed fields.
    ///
    /// `serde_json::Value` objects are ordered maps, so keys come out sorted
    /// at every depth. `difficulty` and `hash` are not part of the preimage.
    pub fn to_canonical_form(&self) -> String {
        json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "payload": &self.payload,
            "previous_hash": self.previous_hash,
            "signature": &self.signature,
            "nonce": self.nonce,
        })
        .to_string()
    }

    /// Recompute the hash from the block's fields. Never reads `self.hash`.
    pub fn calculate_hash(&self) -> Hash {
        hash_bytes(self.to_canonical_form().as_bytes())
    }

    /// Stored hash matches the recomputation
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Stored hash satisfies this block's difficulty
    pub fn meets_difficulty(&self) -> bool {
        self.hash.meets_difficulty(self.difficulty)
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == Hash::zero()
    }

    /// Digest a signer signs: the parent hash plus the canonical payload.
    ///
    /// Including the parent ties a signed operation to one chain position.
    pub fn signing_hash(previous_hash: &Hash, payload: &Payload) -> Hash {
        let canonical = json!(payload).to_string();
        let message = format!("{}:{}", previous_hash.to_hex(), canonical);
        hash_bytes(message.as_bytes())
    }
}
