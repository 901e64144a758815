//! # BAZAAR Economy System
//!
//! Item catalog, inventory store and transaction processor.
//!
//! ## Design Principles
//!
//! 1. **Catalog first** - item and transaction definitions are loaded once from
//!    TOML and never change afterwards
//! 2. **No back-pointers** - instances live in a per-store arena and are
//!    addressed by [`ItemHandle`]
//! 3. **Deferred removal** - removed instances stay visible until the next
//!    [`Inventory::update_inventory`] sweep
//! 4. **All-or-nothing batches** - a batch of transactions either fully applies
//!    or leaves the inventory untouched
//!
//! ## Threading
//!
//! Everything here is single-threaded and driven by an external tick.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bazaar_economy::{CatalogManifest, Inventory, TransactionManager};
//!
//! let catalog = CatalogManifest::from_file("data/catalog.toml")?.build()?;
//! let mut inventory = Inventory::new(Rc::new(catalog.items), Arc::new(SystemClock));
//!
//! // 150 gems at max stack 99 -> two stacks: 99 + 51
//! inventory.add_item("gem", 150, None)?;
//!
//! // Once per frame
//! inventory.update_inventory();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod inventory;
pub mod item;
pub mod manager;
pub mod processor;
pub mod save;
pub mod transaction;

pub use catalog::{
    ItemData, ItemDatabase, ItemDefinition, ItemFamily, ItemType, TraitKind, TransactionDatabase,
};
pub use config::{Catalog, CatalogManifest, EconomyConfig, DEFAULT_SAVE_KEY};
pub use error::{EconomyError, EconomyResult};
pub use inventory::{Inventory, InventoryEvent};
pub use item::{InventoryItem, ItemHandle, ItemState, ItemTraits, StoreId};
pub use manager::InventoryManager;
pub use processor::{InventoryHost, TransactionEvent, TransactionManager, TransactionResult};
pub use save::{InventorySave, LegacySaveMigrator, SavedItem};
pub use transaction::{
    ExpirationMode, OverrideProvider, Transaction, TransactionItem, TransactionItemListProvider,
};
