//! Fork-choice rule for selecting the best chain.

use log::{debug, warn};

use crate::consensus::{Block, ValidationError};
use crate::storage::ChainState;

/// Outcome of running fork choice over a set of candidate chains
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Candidate that should replace the local chain, fully rebuilt
    pub winner: Option<ChainState>,
    /// Position in the candidate list and reason, for each invalid candidate
    pub rejected: Vec<(usize, ValidationError)>,
}

/// Abstraction over fork-choice rules.
///
/// Given the local chain and the chains offered by peers, an
/// implementation decides which chain (if any) should replace the local one.
pub trait ForkChoice {
    fn select(&self, local: &ChainState, candidates: Vec<Vec<Block>>) -> ResolveReport;
}

/// Longest fully-valid chain wins.
///
/// - Every candidate is rebuilt from raw blocks with the same checks as
///   local validation, including ledger replay, and must share our genesis.
/// - The longest valid candidate replaces the local chain only if it is
///   strictly longer. Ties go to the local chain, and among equally long
///   candidates the first one offered wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct LongestChainForkChoice;

impl ForkChoice for LongestChainForkChoice {
    fn select(&self, local: &ChainState, candidates: Vec<Vec<Block>>) -> ResolveReport {
        let mut report = ResolveReport::default();
        let mut best_len = local.len();

        for (position, blocks) in candidates.into_iter().enumerate() {
            let offered = blocks.len();

            if blocks.first().map(|g| g.hash) != Some(local.genesis().hash) {
                warn!("Rejected candidate {}: genesis mismatch", position);
                report.rejected.push((position, ValidationError::GenesisMismatch));
                continue;
            }

            let candidate = match ChainState::from_blocks(blocks, local.min_difficulty()) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!("Rejected candidate {} ({} blocks): {}", position, offered, e);
                    report.rejected.push((position, e));
                    continue;
                }
            };

            if candidate.len() > best_len {
                best_len = candidate.len();
                report.winner = Some(candidate);
            } else {
                debug!(
                    "Candidate {} valid but not longer ({} <= {})",
                    position,
                    candidate.len(),
                    best_len
                );
            }
        }

        report
    }
}
