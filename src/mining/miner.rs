//! Block miner implementation
//!
//! Performs the proof-of-work nonce search on a candidate block. The
//! search is a blocking loop that polls a stop signal and an optional
//! deadline, so callers run it on a worker thread and can abandon it.

use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::consensus::Block;
use crate::constants::MAX_DIFFICULTY;

/// How many hashes to try between stop/deadline checks
const CHECK_INTERVAL: u64 = 256;

/// Mining result
#[derive(Debug)]
pub enum MiningResult {
    /// Found a nonce satisfying the difficulty
    Success(Block),
    /// Stop signal raised
    Interrupted,
    /// Deadline passed
    TimedOut,
    /// Difficulty can never be met by a 64-digit hex hash
    Unsatisfiable,
}

/// Block miner
#[derive(Debug, Clone)]
pub struct Miner {
    /// Stop signal
    stop_signal: Arc<AtomicBool>,
    /// Give up after this long
    timeout: Option<Duration>,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Miner {
    /// Create a new miner
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            stop_signal: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    /// Get a stop signal handle
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Stop mining
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Reset stop signal
    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    /// Mine `block` at `difficulty`: set the difficulty, then search nonces
    pub fn mine(&self, mut block: Block, difficulty: u32) -> MiningResult {
        block.difficulty = difficulty;
        self.mine_block(block)
    }

    /// Mine a block at its own difficulty (find valid nonce)
    pub fn mine_block(&self, block: Block) -> MiningResult {
        self.mine_with_progress(block, u64::MAX, |_| {})
    }

    /// Mine with progress callback, called every `progress_interval` attempts
    pub fn mine_with_progress<F>(&self, mut block: Block, progress_interval: u64, mut callback: F) -> MiningResult
    where
        F: FnMut(u64),
    {
        if block.difficulty > MAX_DIFFICULTY {
            return MiningResult::Unsatisfiable;
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let progress_interval = progress_interval.max(1);
        let mut attempts = 0u64;

        loop {
            block.hash = block.calculate_hash();
            if block.meets_difficulty() {
                debug!(
                    "Mined block {} after {} attempts: {}",
                    block.index,
                    attempts + 1,
                    block.hash
                );
                return MiningResult::Success(block);
            }

            block.nonce = block.nonce.wrapping_add(1);
            attempts += 1;

            if attempts % progress_interval == 0 {
                callback(attempts);
            }

            if attempts % CHECK_INTERVAL == 0 {
                if self.stop_signal.load(Ordering::SeqCst) {
                    return MiningResult::Interrupted;
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return MiningResult::TimedOut;
                }
            }
        }
    }
}
