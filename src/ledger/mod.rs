//! Ledger module - Token balances, allowances and the operations on them

mod operation;
mod token;

pub use operation::*;
pub use token::*;
