//! # Configuration
//!
//! Runtime settings and the catalog manifest, both loaded from TOML.
//!
//! ```toml
//! # economy.toml
//! save_key = "ingame_inventory"
//! save_dir = "save_data"
//! write_delay_ms = 2000
//! ```
//!
//! ```toml
//! # catalog.toml
//! [[items]]
//! item_id = "gem"
//! name = "Gem"
//! max_stack = 99
//! item_type = "currency"
//!
//! [[transactions]]
//! transaction_id = "buy_booster"
//! name = "Buy Booster"
//! costs = [{ item_id = "gem", count = 20 }]
//! rewards = [{ item_id = "booster", count = 1 }]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{ItemData, ItemDatabase, TransactionDatabase};
use crate::error::{EconomyError, EconomyResult};
use crate::transaction::Transaction;

/// Default save key for the player's inventory.
pub const DEFAULT_SAVE_KEY: &str = "ingame_inventory";

/// Runtime settings for the inventory manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Key the inventory is saved under.
    pub save_key: String,
    /// Directory file saves are written to.
    pub save_dir: PathBuf,
    /// Minimum time between two writes, in milliseconds.
    pub write_delay_ms: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            save_key: DEFAULT_SAVE_KEY.to_string(),
            save_dir: PathBuf::from("save_data"),
            write_delay_ms: 2000,
        }
    }
}

impl EconomyConfig {
    /// Parses and validates settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> EconomyResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads settings from a file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file can't be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> EconomyResult<Self> {
        Self::from_toml_str(&read_config(path.as_ref())?)
    }

    /// Checks the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the save key is empty.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.save_key.trim().is_empty() {
            return Err(EconomyError::InvalidConfig("save_key is empty".into()));
        }
        Ok(())
    }

    /// Write delay as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }
}

/// Item and transaction definitions declared in one file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    /// Item entries.
    #[serde(default)]
    pub items: Vec<ItemData>,
    /// Transaction definitions.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Both catalogs built from a manifest.
#[derive(Debug)]
pub struct Catalog {
    /// Item catalog.
    pub items: ItemDatabase,
    /// Transaction catalog.
    pub transactions: TransactionDatabase,
}

impl CatalogManifest {
    /// Parses a manifest.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML.
    pub fn from_toml_str(text: &str) -> EconomyResult<Self> {
        toml::from_str(text).map_err(|e| EconomyError::InvalidConfig(e.to_string()))
    }

    /// Reads a manifest from a file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file can't be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> EconomyResult<Self> {
        Self::from_toml_str(&read_config(path.as_ref())?)
    }

    /// Builds and cross-checks both catalogs.
    ///
    /// # Errors
    ///
    /// - `Catalog` on empty or duplicate ids
    /// - `InvalidDefinition` on bad stacks or transactions naming unknown items
    pub fn build(self) -> EconomyResult<Catalog> {
        let items = ItemDatabase::load(self.items)?;
        let transactions = TransactionDatabase::load(self.transactions)?;
        transactions.validate_against(&items)?;
        Ok(Catalog {
            items,
            transactions,
        })
    }
}

fn read_config(path: &Path) -> EconomyResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| EconomyError::InvalidConfig(format!("{}: {e}", path.display())))
}
