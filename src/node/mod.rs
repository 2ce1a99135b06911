//! Node module - Genesis creation and the chain service

mod genesis;
mod node;

pub use genesis::*;
pub use node::*;
