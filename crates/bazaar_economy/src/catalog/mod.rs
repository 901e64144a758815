//! # Catalog
//!
//! Static item and transaction definitions, loaded once and shared for the
//! process lifetime. Definitions are immutable after load.

mod item_database;
mod items;
mod transaction_database;

pub use item_database::ItemDatabase;
pub use items::{ItemData, ItemDefinition, ItemFamily, ItemType, TraitKind};
pub use transaction_database::TransactionDatabase;
