//! Wallet module - Key management and address checks

mod wallet;

pub use wallet::*;

use crate::constants::ADDRESS_PREFIX;

/// Check that an address decodes and carries a valid checksum
/// Address format: "MT" + Base58(digest[0:20] + checksum[0:4])
pub fn validate_address(address: &str) -> Result<(), String> {
    let encoded = address
        .strip_prefix(ADDRESS_PREFIX)
        .ok_or_else(|| "Invalid address prefix".to_string())?;

    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| "Invalid base58 encoding")?;

    if decoded.len() != 24 {
        return Err("Invalid address length".to_string());
    }

    let (addr_bytes, checksum) = decoded.split_at(20);
    let expected_checksum = crate::crypto::double_hash(addr_bytes);
    if checksum != &expected_checksum.0[0..4] {
        return Err("Invalid checksum".to_string());
    }

    Ok(())
}
