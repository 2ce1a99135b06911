//! Consensus module - Block structure, validation and fork choice

mod block;
mod fork_choice;
mod validation;

pub use block::*;
pub use fork_choice::*;
pub use validation::*;
