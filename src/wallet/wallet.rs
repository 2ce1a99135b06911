//! Key pairs
//!
//! A key pair is the identity that authorizes token operations. The
//! address is what the ledger stores balances under.

use crate::crypto::{Hash, PrivateKey, PublicKey, SchnorrSignature, SignatureError};
use log::info;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Key file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] SignatureError),
}

/// A signing key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Private key (for signing)
    private_key: PrivateKey,
    /// Public key
    pub public_key: PublicKey,
    /// Address (derived from public key)
    pub address: String,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_private_key(PrivateKey::generate())
    }

    /// Build from an existing private key
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let address = public_key.to_address();

        Self {
            private_key,
            public_key,
            address,
        }
    }

    /// Import from private key bytes
    pub fn from_private_key_bytes(bytes: &[u8; 32]) -> Result<Self, WalletError> {
        Ok(Self::from_private_key(PrivateKey::from_bytes(bytes)?))
    }

    /// Export private key bytes
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.private_key.to_bytes()
    }

    /// Sign a message
    pub fn sign(&self, message: &Hash) -> SchnorrSignature {
        self.private_key.sign(message)
    }

    /// Verify a signature against this pair's public key
    pub fn verify(&self, message: &Hash, signature: &SchnorrSignature) -> bool {
        self.public_key.verify(message, signature)
    }

    /// Load a hex private key from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_private_key(PrivateKey::from_hex(&contents)?))
    }

    /// Write the private key to `path` as hex
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), WalletError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.private_key.to_hex())?;
        Ok(())
    }

    /// Load the key at `path`, or generate and persist a new one
    pub fn load_or_generate<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        let keypair = Self::generate();
        keypair.save(path)?;
        info!("Generated new key pair {} at {}", keypair.address, path.display());
        Ok(keypair)
    }
}
