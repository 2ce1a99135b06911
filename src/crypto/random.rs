//! Random bit generation
//!
//! Everything random in the chain (key material, unsigned block
//! signatures) comes from the operating system CSPRNG.

use rand::rngs::OsRng;
use rand::RngCore;

/// Generate `num_bits` random bits.
///
/// Returns `ceil(num_bits / 8)` bytes, big-endian, with the unused high
/// bits of the first byte cleared.
pub fn random_bits(num_bits: usize) -> Vec<u8> {
    let len = num_bits.div_ceil(8);
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);

    let spare = len * 8 - num_bits;
    if spare > 0 {
        bytes[0] &= 0xff >> spare;
    }
    bytes
}

/// Hex form of [`random_bits`]
pub fn random_hex(num_bits: usize) -> String {
    hex::encode(random_bits(num_bits))
}
