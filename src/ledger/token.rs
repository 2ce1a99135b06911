//! Token ledger
//!
//! Balance and allowance bookkeeping for the chain's single token.
//! Every operation validates completely before touching state, so a
//! failure never leaves a partial effect behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::{Address, TokenInfo, TokenOperation};

/// Ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },
    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: u64, need: u64 },
    #[error("Amount must be a positive integer")]
    InvalidAmount,
    #[error("Only the genesis creator may mint")]
    Unauthorized,
    #[error("Total supply would overflow")]
    SupplyOverflow,
}

/// Balances and allowances for one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    total_supply: u64,
    /// Genesis creator, the only address allowed to mint
    creator: Address,
    balances: BTreeMap<Address, u64>,
    /// owner -> spender -> amount
    allowances: BTreeMap<Address, BTreeMap<Address, u64>>,
}

impl TokenLedger {
    /// Create a ledger with the whole initial supply credited to `creator`
    pub fn new(info: &TokenInfo, creator: &str) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(creator.to_string(), info.total_supply);

        Self {
            name: info.name.clone(),
            symbol: info.symbol.clone(),
            decimals: info.decimals,
            total_supply: info.total_supply,
            creator: creator.to_string(),
            balances,
            allowances: BTreeMap::new(),
        }
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    /// Balance of `owner`; unknown addresses hold zero
    pub fn balance_of(&self, owner: &str) -> u64 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Amount `spender` may still move out of `owner`'s balance
    pub fn allowance(&self, owner: &str, spender: &str) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// All recorded balances
    pub fn balances(&self) -> &BTreeMap<Address, u64> {
        &self.balances
    }

    /// Sum of balances equals total supply
    pub fn verify_supply_invariant(&self) -> bool {
        let sum: u128 = self.balances.values().map(|b| *b as u128).sum();
        sum == self.total_supply as u128
    }

    pub fn transfer(&mut self, sender: &str, recipient: &str, amount: u64) -> Result<(), TokenError> {
        self.apply(&TokenOperation::Transfer {
            from: sender.to_string(),
            to: recipient.to_string(),
            amount,
        })
    }

    /// Set (not add to) the allowance of `spender` over `owner`'s balance
    pub fn approve(&mut self, owner: &str, spender: &str, amount: u64) -> Result<(), TokenError> {
        self.apply(&TokenOperation::Approve {
            owner: owner.to_string(),
            spender: spender.to_string(),
            amount,
        })
    }

    pub fn transfer_from(
        &mut self,
        spender: &str,
        owner: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<(), TokenError> {
        self.apply(&TokenOperation::TransferFrom {
            spender: spender.to_string(),
            owner: owner.to_string(),
            to: recipient.to_string(),
            amount,
        })
    }

    pub fn mint(&mut self, authority: &str, recipient: &str, amount: u64) -> Result<(), TokenError> {
        self.apply(&TokenOperation::Mint {
            authority: authority.to_string(),
            to: recipient.to_string(),
            amount,
        })
    }

    /// Dry run: would `op` succeed against the current state?
    pub fn check(&self, op: &TokenOperation) -> Result<(), TokenError> {
        match op {
            TokenOperation::Transfer { from, amount, .. } => {
                require_positive(*amount)?;
                self.require_balance(from, *amount)
            }
            TokenOperation::Approve { .. } => Ok(()),
            TokenOperation::TransferFrom {
                spender,
                owner,
                amount,
                ..
            } => {
                require_positive(*amount)?;
                let allowed = self.allowance(owner, spender);
                if allowed < *amount {
                    return Err(TokenError::InsufficientAllowance {
                        have: allowed,
                        need: *amount,
                    });
                }
                self.require_balance(owner, *amount)
            }
            TokenOperation::Mint {
                authority, amount, ..
            } => {
                if authority != &self.creator {
                    return Err(TokenError::Unauthorized);
                }
                require_positive(*amount)?;
                self.total_supply
                    .checked_add(*amount)
                    .map(|_| ())
                    .ok_or(TokenError::SupplyOverflow)
            }
        }
    }

    /// Apply `op` atomically: either every effect lands or none does
    pub fn apply(&mut self, op: &TokenOperation) -> Result<(), TokenError> {
        self.check(op)?;

        match op {
            TokenOperation::Transfer { from, to, amount } => {
                self.move_balance(from, to, *amount);
            }
            TokenOperation::Approve {
                owner,
                spender,
                amount,
            } => {
                self.allowances
                    .entry(owner.clone())
                    .or_default()
                    .insert(spender.clone(), *amount);
            }
            TokenOperation::TransferFrom {
                spender,
                owner,
                to,
                amount,
            } => {
                self.move_balance(owner, to, *amount);
                if let Some(allowed) = self
                    .allowances
                    .get_mut(owner)
                    .and_then(|spenders| spenders.get_mut(spender))
                {
                    *allowed -= *amount;
                }
            }
            TokenOperation::Mint { to, amount, .. } => {
                self.total_supply += *amount;
                *self.balances.entry(to.clone()).or_insert(0) += *amount;
            }
        }
        Ok(())
    }

    fn require_balance(&self, owner: &str, amount: u64) -> Result<(), TokenError> {
        let have = self.balance_of(owner);
        if have < amount {
            return Err(TokenError::InsufficientBalance { have, need: amount });
        }
        Ok(())
    }

    // Caller has checked the balance. The credit cannot overflow because
    // every balance is bounded by total_supply.
    fn move_balance(&mut self, from: &str, to: &str, amount: u64) {
        *self.balances.entry(from.to_string()).or_insert(0) -= amount;
        *self.balances.entry(to.to_string()).or_insert(0) += amount;
    }
}

fn require_positive(amount: u64) -> Result<(), TokenError> {
    if amount == 0 {
        return Err(TokenError::InvalidAmount);
    }
    Ok(())
}
