//! Property-based and adversarial tests for the MTK chain
//!
//! These tests verify invariants hold under random inputs and attack scenarios.

use mtk_core::consensus::{validate_chain, Block, Payload, ValidationError};
use mtk_core::crypto::{hash_bytes, Hash};
use mtk_core::ledger::{TokenError, TokenInfo, TokenLedger, TokenOperation};
use mtk_core::mining::{Miner, MiningResult};
use mtk_core::node::create_genesis_block;
use mtk_core::storage::ChainState;
use mtk_core::wallet::KeyPair;
use proptest::prelude::*;
use serde_json::json;
use std::sync::OnceLock;

const ACCOUNTS: [&str; 4] = ["creator", "alice", "bob", "carol"];

fn token(supply: u64) -> TokenInfo {
    TokenInfo {
        name: "MyToken".into(),
        symbol: "MTK".into(),
        decimals: 18,
        total_supply: supply,
    }
}

fn mine(block: Block) -> Block {
    match Miner::default().mine_block(block) {
        MiningResult::Success(block) => block,
        other => panic!("mining failed: {:?}", other),
    }
}

fn operation(kind: u8, actor: usize, other: usize, third: usize, amount: u64) -> TokenOperation {
    let (actor, other, third) = (
        ACCOUNTS[actor].to_string(),
        ACCOUNTS[other].to_string(),
        ACCOUNTS[third].to_string(),
    );
    match kind % 4 {
        0 => TokenOperation::Transfer { from: actor, to: other, amount },
        1 => TokenOperation::Approve { owner: actor, spender: other, amount },
        2 => TokenOperation::TransferFrom {
            spender: actor,
            owner: other,
            to: third,
            amount,
        },
        _ => TokenOperation::Mint {
            authority: actor,
            to: other,
            amount,
        },
    }
}

/// Three-block chain (genesis, transfer, data) shared by the tamper tests
fn sample_chain() -> &'static Vec<Block> {
    static CHAIN: OnceLock<Vec<Block>> = OnceLock::new();
    CHAIN.get_or_init(|| {
        let creator = KeyPair::generate();
        let user = KeyPair::generate();
        let genesis = mine(create_genesis_block(&creator, &token(1_000_000), 1, 1_700_000_000_000));
        let mut state = ChainState::new(genesis, 1).unwrap();

        let transfer = Payload::Token {
            operation: TokenOperation::Transfer {
                from: creator.address.clone(),
                to: user.address.clone(),
                amount: 250,
            },
            public_key: creator.public_key.clone(),
        };
        let block = mine(state.next_block(transfer, Some(&creator), 1_700_000_000_500, 1));
        state.append(block).unwrap();

        let data = Payload::Data {
            data: json!({ "memo": "sample" }),
            signer: None,
        };
        let block = mine(state.next_block(data, None, 1_700_000_001_000, 1));
        state.append(block).unwrap();

        state.blocks().to_vec()
    })
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

proptest! {
    /// Supply invariant: balances always sum to the total supply, and a
    /// rejected operation leaves the ledger untouched
    #[test]
    fn prop_supply_invariant_holds(
        ops in prop::collection::vec(
            (0u8..4, 0usize..4, 0usize..4, 0usize..4, 0u64..5_000),
            1..60,
        )
    ) {
        let mut ledger = TokenLedger::new(&token(10_000), ACCOUNTS[0]);

        for (kind, actor, other, third, amount) in ops {
            let before = ledger.clone();
            let result = ledger.apply(&operation(kind, actor, other, third, amount));

            prop_assert!(ledger.verify_supply_invariant());
            if result.is_err() {
                prop_assert_eq!(&ledger, &before);
            }
        }
    }

    /// Transfer round trip restores both balances
    #[test]
    fn prop_transfer_round_trip(amount in 1u64..=10_000) {
        let mut ledger = TokenLedger::new(&token(10_000), ACCOUNTS[0]);
        let before = ledger.balances().clone();

        ledger.transfer(ACCOUNTS[0], ACCOUNTS[1], amount).unwrap();
        ledger.transfer(ACCOUNTS[1], ACCOUNTS[0], amount).unwrap();

        prop_assert_eq!(ledger.balance_of(ACCOUNTS[0]), before[ACCOUNTS[0]]);
        prop_assert_eq!(ledger.balance_of(ACCOUNTS[1]), 0);
    }

    /// Non-creator mint fails without effect
    #[test]
    fn prop_non_creator_mint_rejected(minter in 1usize..4, amount in 1u64..1_000_000) {
        let mut ledger = TokenLedger::new(&token(10_000), ACCOUNTS[0]);
        let before = ledger.clone();

        let result = ledger.mint(ACCOUNTS[minter], ACCOUNTS[minter], amount);
        prop_assert_eq!(result, Err(TokenError::Unauthorized));
        prop_assert_eq!(ledger, before);
    }

    /// Mined blocks meet their difficulty
    #[test]
    fn prop_mined_block_meets_difficulty(difficulty in 0u32..3, n in any::<u32>()) {
        let payload = Payload::Data { data: json!({ "n": n }), signer: None };
        let block = Block::new(1, 0, payload, hash_bytes(b"parent"), None, difficulty);
        let block = mine(block);

        prop_assert!(block.hash.leading_zero_digits() >= difficulty);
        prop_assert_eq!(block.hash, block.calculate_hash());
    }

    /// Block hash is deterministic and covers the nonce
    #[test]
    fn prop_block_hash_deterministic(timestamp in 0i64..i64::MAX, nonce in 0u64..u64::MAX) {
        let payload = Payload::Data { data: json!("fixed"), signer: None };
        let mut block = Block::new(3, timestamp, payload, Hash::zero(), Some("ab".repeat(16)), 0);
        block.nonce = nonce;

        prop_assert_eq!(block.calculate_hash(), block.clone().calculate_hash());

        let mut next = block.clone();
        next.nonce = nonce.wrapping_add(1);
        prop_assert_ne!(block.calculate_hash(), next.calculate_hash());
    }

    /// Changing any hashed field of any block invalidates the chain
    #[test]
    fn prop_tampering_invalidates_chain(position in 0usize..3, field in 0u8..5) {
        let mut blocks = sample_chain().clone();
        let block = &mut blocks[position];

        match field {
            0 => block.payload = Payload::Data { data: json!("tampered"), signer: None },
            1 => block.previous_hash = hash_bytes(b"elsewhere"),
            2 => block.nonce = block.nonce.wrapping_add(1),
            3 => block.hash = hash_bytes(b"forged"),
            _ => block.timestamp += 1,
        }

        prop_assert!(validate_chain(&blocks, 1).is_err());
    }
}

// ============================================================================
// ADVERSARIAL TESTS
// ============================================================================

/// Test: the untampered sample chain is valid
#[test]
fn test_sample_chain_valid() {
    let result = validate_chain(sample_chain(), 1).unwrap();
    assert_eq!(result.length, 3);
    assert!(result.ledger.verify_supply_invariant());
}

/// Test: re-mining a tampered block does not help
///
/// The attacker rewrites a transfer amount and finds a fresh nonce. The
/// signature no longer covers the payload.
#[test]
fn test_remined_forgery_rejected() {
    let mut blocks = sample_chain().clone();
    if let Payload::Token {
        operation: TokenOperation::Transfer { amount, .. },
        ..
    } = &mut blocks[1].payload
    {
        *amount = 999_999;
    }
    blocks[1] = mine(blocks[1].clone());

    assert_eq!(
        validate_chain(&blocks[..2], 1).map(|r| r.length),
        Err(ValidationError::InvalidSignature { index: 1 })
    );
}

/// Test: difficulty cannot be lowered below the chain minimum
#[test]
fn test_low_difficulty_block_rejected() {
    let blocks = sample_chain();
    let mut state = ChainState::from_blocks(blocks.clone(), 1).unwrap();

    let payload = Payload::Data {
        data: json!("cheap"),
        signer: None,
    };
    let cheap = mine(state.next_block(payload, None, 1_700_000_002_000, 0));

    assert!(matches!(
        state.append(cheap),
        Err(ValidationError::InvalidHash { index: 3, .. })
    ));
    assert_eq!(state.len(), 3);
}

/// Test: a chain with blocks reordered is rejected
#[test]
fn test_reordered_chain_rejected() {
    let mut blocks = sample_chain().clone();
    blocks.swap(1, 2);
    assert!(validate_chain(&blocks, 1).is_err());
}

/// Test: the empty chain is not valid
#[test]
fn test_empty_chain_rejected() {
    assert_eq!(validate_chain(&[], 1).map(|r| r.length), Err(ValidationError::EmptyChain));
}
