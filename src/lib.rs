//! MTK Token Chain Core Library
//!
//! A single-writer proof-of-work chain whose blocks carry data records and
//! signed operations on one fungible token. The token ledger is always the
//! replay of the chain.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod ledger;
pub mod mining;
pub mod node;
pub mod p2p;
pub mod storage;
pub mod wallet;

/// Protocol constants
pub mod constants {
    /// Prefix of every address
    pub const ADDRESS_PREFIX: &str = "MT";

    /// Random bits in the signature field of an unsigned block
    pub const SIGNATURE_BITS: usize = 128;

    /// A SHA-256 hex digest has 64 digits, so no higher difficulty can be met
    pub const MAX_DIFFICULTY: u32 = 64;

    /// Default number of leading zero hex digits
    pub const DEFAULT_DIFFICULTY: u32 = 4;

    /// Message carried by every genesis block
    pub const GENESIS_MESSAGE: &str = "Genesis Block - Token Creation";

    pub const DEFAULT_TOKEN_NAME: &str = "MyToken";
    pub const DEFAULT_TOKEN_SYMBOL: &str = "MTK";
    pub const DEFAULT_DECIMALS: u8 = 18;

    /// Initial supply in base units, credited to the creator at genesis
    pub const DEFAULT_INITIAL_SUPPLY: u64 = 100_000_000_000;
}
