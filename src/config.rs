//! Node configuration
//!
//! Loaded from a TOML file; every section and field has a default, so a
//! missing file or a partial one is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    DEFAULT_DECIMALS, DEFAULT_DIFFICULTY, DEFAULT_INITIAL_SUPPLY, DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SYMBOL,
    MAX_DIFFICULTY,
};
use crate::ledger::TokenInfo;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Leading zero hex digits required of every block
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_name")]
    pub name: String,
    #[serde(default = "default_token_symbol")]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_initial_supply")]
    pub initial_supply: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Abandon a nonce search after this many seconds; unset means no limit
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Log progress every this many attempts
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    /// Re-mine this many times when the tip moves under a pending block
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_token_name() -> String {
    DEFAULT_TOKEN_NAME.to_string()
}

fn default_token_symbol() -> String {
    DEFAULT_TOKEN_SYMBOL.to_string()
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_initial_supply() -> u64 {
    DEFAULT_INITIAL_SUPPLY
}

fn default_progress_interval() -> u64 {
    100_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sled
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: default_token_name(),
            symbol: default_token_symbol(),
            decimals: default_decimals(),
            initial_supply: default_initial_supply(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            progress_interval: default_progress_interval(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: default_backend(),
        }
    }
}

impl TokenConfig {
    pub fn to_info(&self) -> TokenInfo {
        TokenInfo {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            total_supply: self.initial_supply,
        }
    }
}

impl MiningConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Parse and validate a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Load from `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds {}",
                self.chain.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.token.symbol.is_empty() {
            return Err(ConfigError::Invalid("token symbol is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chain.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.token.initial_supply, DEFAULT_INITIAL_SUPPLY);
        assert_eq!(config.storage.backend, StorageBackend::Sled);
        assert_eq!(config.mining.timeout(), None);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [chain]
            difficulty = 2

            [token]
            symbol = "ABC"

            [mining]
            timeout_secs = 30

            [storage]
            backend = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.difficulty, 2);
        assert_eq!(config.token.symbol, "ABC");
        assert_eq!(config.token.name, DEFAULT_TOKEN_NAME);
        assert_eq!(config.mining.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.storage.backend, StorageBackend::Json);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_rejects_impossible_difficulty() {
        assert!(matches!(
            Config::from_toml("[chain]\ndifficulty = 65\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("/definitely/not/here.toml").unwrap();
        assert_eq!(config, Config::default());
    }
}
