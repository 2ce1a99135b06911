//! Token operations carried in block payloads

use serde::{Deserialize, Serialize};

/// Ledger addresses are the base58 strings produced by `PublicKey::to_address`
pub type Address = String;

/// Token metadata fixed at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Supply credited to the creator at genesis
    pub total_supply: u64,
}

/// A ledger mutation. Every variant names the address that must have
/// signed it (see [`TokenOperation::actor`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenOperation {
    Transfer {
        from: Address,
        to: Address,
        amount: u64,
    },
    Approve {
        owner: Address,
        spender: Address,
        amount: u64,
    },
    TransferFrom {
        spender: Address,
        owner: Address,
        to: Address,
        amount: u64,
    },
    Mint {
        authority: Address,
        to: Address,
        amount: u64,
    },
}

impl TokenOperation {
    /// Address whose key must sign this operation
    pub fn actor(&self) -> &str {
        match self {
            TokenOperation::Transfer { from, .. } => from,
            TokenOperation::Approve { owner, .. } => owner,
            TokenOperation::TransferFrom { spender, .. } => spender,
            TokenOperation::Mint { authority, .. } => authority,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TokenOperation::Transfer { amount, .. }
            | TokenOperation::Approve { amount, .. }
            | TokenOperation::TransferFrom { amount, .. }
            | TokenOperation::Mint { amount, .. } => *amount,
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            TokenOperation::Transfer { .. } => "transfer",
            TokenOperation::Approve { .. } => "approve",
            TokenOperation::TransferFrom { .. } => "transfer_from",
            TokenOperation::Mint { .. } => "mint",
        }
    }
}
