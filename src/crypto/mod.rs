//! Cryptography module - SHA-256 hashing, Schnorr signatures, random bits

mod hash;
mod random;
mod schnorr;

pub use hash::*;
pub use random::*;
pub use schnorr::*;
