//! Snapshot persistence
//!
//! Two interchangeable stores: a sled database and a plain JSON file.

use log::debug;
use sled::{Db, Tree};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::Snapshot;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
}

/// Somewhere a snapshot can be saved to and loaded from
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

const SNAPSHOT_KEY: &str = "snapshot";

/// Database wrapper
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    chain_tree: Tree,
}

impl SledStore {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let chain_tree = db.open_tree("chain")?;
        Ok(Self { db, chain_tree })
    }
}

impl SnapshotStore for SledStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        match self.chain_tree.get(SNAPSHOT_KEY)? {
            Some(bytes) => Snapshot::from_json(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.chain_tree.insert(SNAPSHOT_KEY, snapshot.to_json()?)?;
        self.db.flush()?;
        debug!("Saved snapshot of {} blocks to sled", snapshot.chain.len());
        Ok(())
    }
}

/// Pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Snapshot::from_json(&bytes).map(Some)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, snapshot.to_json()?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "Saved snapshot of {} blocks to {}",
            snapshot.chain.len(),
            self.path.display()
        );
        Ok(())
    }
}
