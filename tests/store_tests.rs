//! Snapshot persistence through both stores

use mtk_core::config::Config;
use mtk_core::node::Node;
use mtk_core::storage::{JsonFileStore, SledStore, SnapshotStore, StoreError};
use mtk_core::wallet::KeyPair;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn config() -> Config {
    let mut config = Config::default();
    config.chain.difficulty = 1;
    config
}

async fn populated_node(creator: &KeyPair, user: &KeyPair) -> Node {
    let node = Node::new(config(), creator).unwrap();
    node.transfer(creator, &user.address, 1000).await.unwrap();
    node.create_block(json!({ "memo": "stored" }), None).await.unwrap();
    node
}

#[tokio::test]
async fn test_sled_store_round_trip() {
    let dir = tempdir().unwrap();
    let creator = KeyPair::generate();
    let user = KeyPair::generate();
    let node = populated_node(&creator, &user).await;

    let store = SledStore::open(dir.path().join("chain.db")).unwrap();
    assert!(store.load().unwrap().is_none());
    node.save(&store).unwrap();

    let restored = Node::load_or_genesis(config(), &creator, &store).unwrap();
    assert_eq!(restored.chain(), node.chain());
    assert_eq!(restored.balances(), node.balances());
    assert_eq!(restored.balance(&user.address), 1000);
}

#[tokio::test]
async fn test_json_store_round_trip() {
    let dir = tempdir().unwrap();
    let creator = KeyPair::generate();
    let user = KeyPair::generate();
    let node = populated_node(&creator, &user).await;

    let store = JsonFileStore::new(dir.path().join("nested").join("blockchain.json"));
    assert!(store.load().unwrap().is_none());
    node.save(&store).unwrap();
    assert!(store.path().exists());

    let snapshot = store.load().unwrap().unwrap();
    assert_eq!(snapshot, node.snapshot());

    let restored = Node::load_or_genesis(config(), &creator, &store).unwrap();
    assert_eq!(restored.chain(), node.chain());
    assert_eq!(restored.token_info(), node.token_info());
}

#[tokio::test]
async fn test_missing_snapshot_creates_genesis() {
    let dir = tempdir().unwrap();
    let creator = KeyPair::generate();
    let store = JsonFileStore::new(dir.path().join("blockchain.json"));

    let node = Node::load_or_genesis(config(), &creator, &store).unwrap();
    assert_eq!(node.len(), 1);
    assert_eq!(node.balance(&creator.address), node.token_info().total_supply);
}

#[tokio::test]
async fn test_unparseable_snapshot_falls_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blockchain.json");
    fs::write(&path, b"{ definitely not a snapshot").unwrap();
    let store = JsonFileStore::new(&path);

    assert!(matches!(store.load(), Err(StoreError::CorruptSnapshot(_))));

    let creator = KeyPair::generate();
    let node = Node::load_or_genesis(config(), &creator, &store).unwrap();
    assert_eq!(node.len(), 1);
    assert!(node.is_valid());
}

#[tokio::test]
async fn test_tampered_token_section_falls_back() {
    let dir = tempdir().unwrap();
    let creator = KeyPair::generate();
    let user = KeyPair::generate();
    let node = populated_node(&creator, &user).await;

    let store = JsonFileStore::new(dir.path().join("blockchain.json"));
    node.save(&store).unwrap();

    let mut raw: serde_json::Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
    raw["token"]["total_supply"] = json!(1);
    fs::write(store.path(), serde_json::to_vec(&raw).unwrap()).unwrap();

    let snapshot = store.load().unwrap().unwrap();
    assert!(matches!(snapshot.into_state(), Err(StoreError::CorruptSnapshot(_))));

    let restored = Node::load_or_genesis(config(), &creator, &store).unwrap();
    assert_eq!(restored.len(), 1);
    assert_ne!(restored.block(0).unwrap().hash, node.block(0).unwrap().hash);
}

#[tokio::test]
async fn test_tampered_block_falls_back() {
    let dir = tempdir().unwrap();
    let creator = KeyPair::generate();
    let user = KeyPair::generate();
    let node = populated_node(&creator, &user).await;

    let store = JsonFileStore::new(dir.path().join("blockchain.json"));
    node.save(&store).unwrap();

    let mut raw: serde_json::Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
    raw["chain"][2]["payload"]["data"] = json!({ "memo": "rewritten" });
    fs::write(store.path(), serde_json::to_vec(&raw).unwrap()).unwrap();

    let restored = Node::load_or_genesis(config(), &creator, &store).unwrap();
    assert_eq!(restored.len(), 1);
}

#[tokio::test]
async fn test_raised_difficulty_keeps_stored_chain() {
    let dir = tempdir().unwrap();
    let creator = KeyPair::generate();
    let user = KeyPair::generate();
    let node = populated_node(&creator, &user).await;

    let store = JsonFileStore::new(dir.path().join("blockchain.json"));
    node.save(&store).unwrap();

    let mut harder = config();
    harder.chain.difficulty = 2;
    let restored = Node::load_or_genesis(harder, &creator, &store).unwrap();

    assert_eq!(restored.chain(), node.chain());
    assert_eq!(restored.balance(&user.address), 1000);

    let block = restored.create_block(json!("after restart"), None).await.unwrap();
    assert_eq!(block.difficulty, 2);
    assert!(block.hash.to_hex().starts_with("00"));
    assert!(restored.is_valid());
}
