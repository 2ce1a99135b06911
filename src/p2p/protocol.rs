//! P2P protocol messages
//!
//! Nodes exchange whole chains. A peer asks for the local chain with
//! `GetChain`, answers with `Chain`, and `Candidates` hands one or more
//! chains to the receiver's resolver.
//!
//! Frame layout: magic (4) | version (u32 LE) | length (u32 LE) | JSON body.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consensus::Block;

/// Protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Network magic bytes ("MTKN")
pub const NETWORK_MAGIC: [u8; 4] = [0x4D, 0x54, 0x4B, 0x4E];

/// Maximum body size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 12;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message too short")]
    TooShort,
    #[error("Invalid network magic")]
    InvalidMagic,
    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u32),
    #[error("Message too large: {0} bytes")]
    TooLarge(usize),
    #[error("Incomplete message: expected {expected} bytes, got {actual}")]
    Incomplete { expected: usize, actual: usize },
    #[error("Malformed body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// P2P message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Message {
    /// Ask for the receiver's chain
    GetChain,
    /// A full chain, genesis first
    Chain(Vec<Block>),
    /// Chains offered for longest-chain resolution
    Candidates(Vec<Vec<Block>>),
}

impl Message {
    /// Serialize into a framed message
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let body = serde_json::to_vec(self)?;
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::TooLarge(body.len()));
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(&NETWORK_MAGIC);
        bytes.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Parse a framed message
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::TooShort);
        }
        if bytes[0..4] != NETWORK_MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if length > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::TooLarge(length));
        }
        if bytes.len() < HEADER_LEN + length {
            return Err(ProtocolError::Incomplete {
                expected: HEADER_LEN + length,
                actual: bytes.len(),
            });
        }

        Ok(serde_json::from_slice(&bytes[HEADER_LEN..HEADER_LEN + length])?)
    }

    /// Get the command name for this message
    pub fn command(&self) -> &'static str {
        match self {
            Message::GetChain => "getchain",
            Message::Chain(_) => "chain",
            Message::Candidates(_) => "candidates",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_chain_framing() {
        let bytes = Message::GetChain.to_bytes().unwrap();
        assert_eq!(&bytes[0..4], &NETWORK_MAGIC);
        assert_eq!(&bytes[4..8], &PROTOCOL_VERSION.to_le_bytes());
        assert_eq!(Message::from_bytes(&bytes).unwrap(), Message::GetChain);
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut bytes = Message::GetChain.to_bytes().unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(Message::from_bytes(&bytes), Err(ProtocolError::InvalidMagic)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = Message::GetChain.to_bytes().unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(ProtocolError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_truncated_message_rejected() {
        let bytes = Message::Candidates(vec![vec![]]).to_bytes().unwrap();
        assert!(matches!(
            Message::from_bytes(&bytes[..bytes.len() - 1]),
            Err(ProtocolError::Incomplete { .. })
        ));
        assert!(matches!(Message::from_bytes(&bytes[..5]), Err(ProtocolError::TooShort)));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut bytes = Message::GetChain.to_bytes().unwrap();
        bytes[8..12].copy_from_slice(&(MAX_MESSAGE_SIZE as u32 + 1).to_le_bytes());
        assert!(matches!(Message::from_bytes(&bytes), Err(ProtocolError::TooLarge(_))));
    }

    #[test]
    fn test_garbage_body_rejected() {
        let body = b"{not json";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&NETWORK_MAGIC);
        bytes.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(body);
        assert!(matches!(Message::from_bytes(&bytes), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Message::GetChain.command(), "getchain");
        assert_eq!(Message::Chain(vec![]).command(), "chain");
        assert_eq!(Message::Candidates(vec![]).command(), "candidates");
    }
}
