//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_STORAGE_DIR` - Directory holding the on-disk cart record (default: .gomarketplace)
//! - `CART_STORAGE_KEY` - Key of the cart record (default: @GoMarketplace:products)
//! - `CART_EVENT_CAPACITY` - Buffered events per broadcast receiver (default: 64, max: 65536)

use std::path::PathBuf;

use thiserror::Error;

/// Storage key of the persisted cart record.
pub const DEFAULT_STORAGE_KEY: &str = "@GoMarketplace:products";

/// Default directory for the file-backed store.
pub const DEFAULT_STORAGE_DIR: &str = ".gomarketplace";

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Largest accepted broadcast channel capacity.
pub const MAX_EVENT_CAPACITY: usize = 65_536;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Directory used by `FileStore`
    pub storage_dir: PathBuf,
    /// Key the cart record is stored under
    pub storage_key: String,
    /// Capacity of the cart event broadcast channel
    pub event_capacity: usize,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_dir = lookup("CART_STORAGE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from);

        let storage_key = lookup("CART_STORAGE_KEY")
            .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());
        if storage_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_STORAGE_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let event_capacity = match lookup("CART_EVENT_CAPACITY") {
            Some(raw) => parse_capacity(&raw)?,
            None => DEFAULT_EVENT_CAPACITY,
        };

        Ok(Self {
            storage_dir,
            storage_key,
            event_capacity,
        })
    }
}

fn parse_capacity(raw: &str) -> Result<usize, ConfigError> {
    let capacity = raw.trim().parse::<usize>().map_err(|e| {
        ConfigError::InvalidEnvVar("CART_EVENT_CAPACITY".to_string(), e.to_string())
    })?;
    if capacity == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "CART_EVENT_CAPACITY".to_string(),
            "must be greater than 0".to_string(),
        ));
    }
    if capacity > MAX_EVENT_CAPACITY {
        return Err(ConfigError::InvalidEnvVar(
            "CART_EVENT_CAPACITY".to_string(),
            format!("must be at most {MAX_EVENT_CAPACITY}"),
        ));
    }
    Ok(capacity)
}
