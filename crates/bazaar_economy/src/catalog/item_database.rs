//! The item catalog.

use std::sync::Arc;

use bazaar_core::KeyedMap;
use once_cell::unsync::OnceCell;
use tracing::info;

use super::items::ItemData;
use crate::error::{EconomyError, EconomyResult};

/// Every item the game knows about, keyed by item id.
///
/// The id map is built on first access and rebuilt after [`reload`](Self::reload).
#[derive(Debug, Default)]
pub struct ItemDatabase {
    entries: Vec<Arc<ItemData>>,
    mapping: OnceCell<KeyedMap<String, Arc<ItemData>>>,
}

impl ItemDatabase {
    /// Wraps entries without validating them. The map is built lazily.
    fn new(entries: Vec<ItemData>) -> Self {
        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
            mapping: OnceCell::new(),
        }
    }

    /// Builds a validated catalog.
    ///
    /// # Errors
    ///
    /// - `InvalidDefinition` if an entry has `max_stack == 0`
    /// - `Catalog` if ids are empty or duplicated
    pub fn load(entries: Vec<ItemData>) -> EconomyResult<Self> {
        let db = Self::new(entries);
        db.item_mapping()?;
        info!("Item catalog loaded: {} items", db.len());
        Ok(db)
    }

    /// The id map, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns the build error if the entries are invalid.
    pub fn item_mapping(&self) -> EconomyResult<&KeyedMap<String, Arc<ItemData>>> {
        self.mapping.get_or_try_init(|| {
            for entry in &self.entries {
                entry.validate()?;
            }
            let map = KeyedMap::build(self.entries.iter().cloned(), |entry| {
                (!entry.item_id.is_empty()).then(|| entry.item_id.clone())
            })?;
            Ok::<_, EconomyError>(map)
        })
    }

    /// Looks up an item. Returns `None` for unknown ids.
    ///
    /// Catalogs only come from [`load`](Self::load) or `Default`, so the map
    /// is always buildable here.
    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<&Arc<ItemData>> {
        self.item_mapping().ok()?.get(item_id)
    }

    /// Looks up an item that must exist.
    ///
    /// # Errors
    ///
    /// Returns `Catalog(KeyNotFound)` for unknown ids.
    pub fn require(&self, item_id: &str) -> EconomyResult<&Arc<ItemData>> {
        Ok(self.item_mapping()?.require(item_id)?)
    }

    /// Replaces the entry set and rebuilds the map.
    ///
    /// On failure the previous entries stay in place. Inventories hold the
    /// catalog behind an `Rc` and keep their old entries; rebind them with
    /// [`InventoryManager::reload_catalog`](crate::InventoryManager::reload_catalog).
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn reload(&mut self, entries: Vec<ItemData>) -> EconomyResult<()> {
        let fresh = Self::load(entries)?;
        *self = fresh;
        Ok(())
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ItemData>> {
        self.entries.iter()
    }
}
