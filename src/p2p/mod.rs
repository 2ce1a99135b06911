//! P2P module - Chain exchange messages

mod protocol;

pub use protocol::*;
