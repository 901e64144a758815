//! # Inventory Manager
//!
//! Owns the player's inventory and keeps it on disk without writing every
//! frame.
//!
//! ## Write Schedule
//!
//! ```text
//! request_save()  -> pending = true
//! tick(dt)        -> sweep; if it removed anything, pending = true
//!                    cooldown -= dt
//!                    if cooldown == 0 and pending: write, cooldown = write_delay
//! flush()         -> write now (pause, focus loss, shutdown)
//! ```

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{load, save, SaveStore, TimeSource};
use tracing::{debug, error, info};

use crate::catalog::ItemDatabase;
use crate::config::EconomyConfig;
use crate::error::EconomyResult;
use crate::inventory::Inventory;
use crate::processor::InventoryHost;
use crate::save::InventorySave;

/// Debounced persistence host for one inventory.
pub struct InventoryManager<S: SaveStore> {
    store: S,
    config: EconomyConfig,
    catalog: Rc<ItemDatabase>,
    clock: Arc<dyn TimeSource>,
    inventory: Inventory,
    write_pending: bool,
    cooldown: Duration,
}

impl<S: SaveStore> std::fmt::Debug for InventoryManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryManager")
            .field("save_key", &self.config.save_key)
            .field("inventory", &self.inventory)
            .field("write_pending", &self.write_pending)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl<S: SaveStore> InventoryManager<S> {
    /// Opens the inventory saved under `config.save_key`.
    ///
    /// A key that was never written gets an empty inventory, saved at once.
    ///
    /// # Errors
    ///
    /// Returns `Persist` if the store fails or the save is corrupt.
    pub fn open(
        store: S,
        config: EconomyConfig,
        catalog: Rc<ItemDatabase>,
        clock: Arc<dyn TimeSource>,
    ) -> EconomyResult<Self> {
        config.validate()?;

        if !store.exists(&config.save_key)? {
            info!("Creating inventory '{}'", config.save_key);
            save(&store, &config.save_key, &InventorySave::default())?;
        }

        let snapshot: InventorySave = load(&store, &config.save_key)?;
        let inventory = Inventory::from_save(snapshot, Rc::clone(&catalog), Arc::clone(&clock));
        info!(
            "Inventory '{}' opened with {} stacks",
            config.save_key,
            inventory.len()
        );

        Ok(Self {
            store,
            config,
            catalog,
            clock,
            inventory,
            write_pending: false,
            cooldown: Duration::ZERO,
        })
    }

    /// Discards in-memory state and reads the save again.
    ///
    /// # Errors
    ///
    /// Returns `Persist` if the store fails or the save is corrupt.
    pub fn reload(&mut self) -> EconomyResult<()> {
        let snapshot: InventorySave = load(&self.store, &self.config.save_key)?;
        self.inventory =
            Inventory::from_save(snapshot, Rc::clone(&self.catalog), Arc::clone(&self.clock));
        self.write_pending = false;
        debug!("Inventory '{}' reloaded", self.config.save_key);
        Ok(())
    }

    /// Swaps in a new item catalog and rebinds the live inventory to it.
    ///
    /// Stacks are re-resolved the way a load resolves them: unknown ids are
    /// dropped and counts are clamped to the new stack limits. Handles taken
    /// before the swap go stale. The result is queued for writing.
    pub fn reload_catalog(&mut self, catalog: Rc<ItemDatabase>) {
        self.inventory = self.inventory.rebind_catalog(Rc::clone(&catalog));
        self.catalog = catalog;
        self.write_pending = true;
        info!(
            "Inventory '{}' rebound to a catalog of {} items",
            self.config.save_key,
            self.catalog.len()
        );
    }

    /// Marks the inventory for writing on a later tick.
    pub fn request_save(&mut self) {
        self.write_pending = true;
    }

    /// Returns true if a write is waiting.
    #[inline]
    #[must_use]
    pub const fn is_write_pending(&self) -> bool {
        self.write_pending
    }

    /// Per-frame update. Runs the sweep, then the write timer.
    ///
    /// Write failures are logged and the write stays pending.
    ///
    /// # Returns
    ///
    /// True if the inventory was written this tick.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if self.inventory.update_inventory() {
            self.write_pending = true;
        }

        self.cooldown = self.cooldown.saturating_sub(dt);
        if !self.cooldown.is_zero() || !self.write_pending {
            return false;
        }

        match self.flush() {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save inventory '{}': {}", self.config.save_key, e);
                false
            }
        }
    }

    /// Writes immediately and restarts the write timer.
    ///
    /// # Errors
    ///
    /// Returns `Persist` if the store fails.
    pub fn flush(&mut self) -> EconomyResult<()> {
        save(&self.store, &self.config.save_key, &self.inventory.to_save())?;
        self.write_pending = false;
        self.cooldown = self.config.write_delay();
        Ok(())
    }

    /// Writes only if something is pending. Call on pause or focus loss.
    ///
    /// # Errors
    ///
    /// Returns `Persist` if the store fails.
    pub fn flush_if_pending(&mut self) -> EconomyResult<bool> {
        if !self.write_pending {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// The managed inventory.
    #[inline]
    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// The managed inventory, mutably. Call [`request_save`](Self::request_save)
    /// after changing it.
    #[inline]
    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    /// The item catalog.
    #[inline]
    #[must_use]
    pub const fn catalog(&self) -> &Rc<ItemDatabase> {
        &self.catalog
    }

    /// The backing store.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active settings.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &EconomyConfig {
        &self.config
    }
}

impl<S: SaveStore> InventoryHost for InventoryManager<S> {
    fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    fn request_save(&mut self) {
        self.write_pending = true;
    }
}
