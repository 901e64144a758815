//! # Inventory Store
//!
//! The live container of item instances.
//!
//! ## Layout
//!
//! ```text
//! items:        SlotArena<InventoryItem>   (owns every instance)
//! order:        Vec<SlotId>                (primary list, insertion order)
//! by_item_id:   item id   -> [SlotId]
//! by_type:      item type -> [SlotId]
//! by_instance:  uuid      -> SlotId
//! remove_queue: VecDeque<SlotId>           (drained by update_inventory)
//! ```
//!
//! Every slot in `order` sits in exactly one bucket of each index. Removal is
//! deferred: a removed instance stays visible to queries until the next
//! [`Inventory::update_inventory`] detaches it.
//!
//! ## Lifecycle
//!
//! `Unowned -> Owned -> PendingRemoval -> Detached`

use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use bazaar_core::{SlotArena, SlotId, TimeSource};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::catalog::{ItemData, ItemDatabase, ItemFamily, ItemType};
use crate::error::{EconomyError, EconomyResult};
use crate::item::{InventoryItem, ItemHandle, ItemTraits, StoreId};
use crate::save::{InventorySave, SavedItem};

/// Change notifications buffered by an [`Inventory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InventoryEvent {
    /// A new instance joined the store.
    ItemAdded(ItemHandle),
    /// An instance was queued for removal. The handle still resolves until
    /// the next sweep.
    ItemRemoved(ItemHandle),
    /// An instance's count changed.
    CountChanged {
        /// The instance.
        handle: ItemHandle,
        /// Count before the change.
        previous: u32,
        /// Count after the change.
        current: u32,
    },
}

/// Order in which existing stacks are topped up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StackOrder {
    /// Oldest stack first.
    Insertion,
    /// Fullest stack first. Ties keep insertion order.
    LargestFirst,
}

/// A multi-indexed store of item instances.
pub struct Inventory {
    id: StoreId,
    catalog: Rc<ItemDatabase>,
    clock: Arc<dyn TimeSource>,
    items: SlotArena<InventoryItem>,
    order: Vec<SlotId>,
    by_item_id: HashMap<String, Vec<SlotId>>,
    by_type: HashMap<ItemType, Vec<SlotId>>,
    by_instance: HashMap<Uuid, SlotId>,
    remove_queue: VecDeque<SlotId>,
    events: Vec<InventoryEvent>,
}

impl fmt::Debug for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inventory")
            .field("id", &self.id)
            .field("items", &self.order.len())
            .field("pending_removals", &self.remove_queue.len())
            .finish_non_exhaustive()
    }
}

impl Inventory {
    /// Creates an empty store backed by `catalog`.
    #[must_use]
    pub fn new(catalog: Rc<ItemDatabase>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            id: StoreId::next(),
            catalog,
            clock,
            items: SlotArena::new(),
            order: Vec::new(),
            by_item_id: HashMap::new(),
            by_type: HashMap::new(),
            by_instance: HashMap::new(),
            remove_queue: VecDeque::new(),
            events: Vec::new(),
        }
    }

    /// This store's identity.
    #[inline]
    #[must_use]
    pub const fn store_id(&self) -> StoreId {
        self.id
    }

    /// The catalog instances resolve against.
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Rc<ItemDatabase> {
        &self.catalog
    }

    /// Current time according to the injected clock.
    #[inline]
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc_now()
    }

    /// Number of instances in the primary list, pending ones included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the store holds no instances.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of instances waiting for the next sweep.
    #[inline]
    #[must_use]
    pub fn pending_removals(&self) -> usize {
        self.remove_queue.len()
    }

    /// Instances in insertion order.
    pub fn items(&self) -> impl Iterator<Item = (ItemHandle, &InventoryItem)> + '_ {
        self.order
            .iter()
            .filter_map(|&slot| self.items.get(slot).map(|item| (self.handle(slot), item)))
    }

    /// Returns true if `handle` refers to an instance owned by this store.
    #[inline]
    #[must_use]
    pub fn owns(&self, handle: ItemHandle) -> bool {
        handle.store() == self.id && self.items.contains(handle.slot())
    }

    /// Borrows an owned instance.
    #[must_use]
    pub fn item(&self, handle: ItemHandle) -> Option<&InventoryItem> {
        if handle.store() != self.id {
            return None;
        }
        self.items.get(handle.slot())
    }

    /// Looks up an instance by its unique id.
    #[must_use]
    pub fn get_item(&self, instance_id: &Uuid) -> Option<ItemHandle> {
        self.by_instance.get(instance_id).map(|&slot| self.handle(slot))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// First instance of the family `F`.
    #[must_use]
    pub fn find_one_by_type<F: ItemFamily>(&self) -> Option<ItemHandle> {
        self.by_type
            .get(&F::item_type())
            .and_then(|bucket| bucket.first())
            .map(|&slot| self.handle(slot))
    }

    /// Every instance of a family, in insertion order.
    #[must_use]
    pub fn find_many_by_type(&self, item_type: &ItemType) -> Vec<ItemHandle> {
        self.bucket_handles(self.by_type.get(item_type))
    }

    /// First instance of an item id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `item_id` is empty.
    pub fn find_one_by_item_id(&self, item_id: &str) -> EconomyResult<Option<ItemHandle>> {
        Self::check_item_id(item_id)?;
        Ok(self
            .by_item_id
            .get(item_id)
            .and_then(|bucket| bucket.first())
            .map(|&slot| self.handle(slot)))
    }

    /// Every instance of an item id, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `item_id` is empty.
    pub fn find_many_by_item_id(&self, item_id: &str) -> EconomyResult<Vec<ItemHandle>> {
        Self::check_item_id(item_id)?;
        Ok(self.bucket_handles(self.by_item_id.get(item_id)))
    }

    /// Number of instances of a family.
    #[must_use]
    pub fn count_by_type(&self, item_type: &ItemType) -> usize {
        self.by_type.get(item_type).map_or(0, Vec::len)
    }

    /// Total quantity held across a family.
    #[must_use]
    pub fn count_stack_by_type(&self, item_type: &ItemType) -> u64 {
        self.bucket_stack(self.by_type.get(item_type))
    }

    /// Number of instances of an item id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `item_id` is empty.
    pub fn count_by_item_id(&self, item_id: &str) -> EconomyResult<usize> {
        Self::check_item_id(item_id)?;
        Ok(self.by_item_id.get(item_id).map_or(0, Vec::len))
    }

    /// Total quantity held of an item id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `item_id` is empty.
    pub fn count_stack_by_item_id(&self, item_id: &str) -> EconomyResult<u64> {
        Self::check_item_id(item_id)?;
        Ok(self.bucket_stack(self.by_item_id.get(item_id)))
    }

    /// Quantity of an item id that can pay costs at `now`.
    ///
    /// Stacks queued for removal or already expired are left out, even
    /// before the sweep detaches them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `item_id` is empty.
    pub fn spendable_stack_by_item_id(&self, item_id: &str, now: DateTime<Utc>) -> EconomyResult<u64> {
        Self::check_item_id(item_id)?;
        Ok(self
            .spendable_slots(item_id, now)
            .into_iter()
            .filter_map(|slot| self.items.get(slot))
            .map(|item| u64::from(item.count()))
            .sum())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Adds `amount` of an item, topping up matching stacks before creating new ones.
    ///
    /// Stacks match when they share the item id and the exact expiry. Unknown
    /// item ids are ignored with a warning.
    ///
    /// # Returns
    ///
    /// Handles of the newly created instances.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `item_id` is empty.
    pub fn add_item(
        &mut self,
        item_id: &str,
        amount: u32,
        expires_at: Option<DateTime<Utc>>,
    ) -> EconomyResult<Vec<ItemHandle>> {
        self.add_with_order(item_id, amount, expires_at, StackOrder::Insertion)
    }

    /// Adds `amount` of an item that expires `after` from now.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `item_id` is empty or the expiry overflows.
    pub fn add_item_after(
        &mut self,
        item_id: &str,
        amount: u32,
        after: Duration,
    ) -> EconomyResult<Vec<ItemHandle>> {
        let expires_at = self.now().checked_add_signed(after).ok_or_else(|| {
            EconomyError::InvalidArgument(format!("expiry out of range: now + {after}"))
        })?;
        self.add_item(item_id, amount, Some(expires_at))
    }

    /// Adds `amount` of a catalog entry directly.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` if the entry has `max_stack == 0`.
    pub fn add_item_for(
        &mut self,
        data: &Arc<ItemData>,
        amount: u32,
        expires_at: Option<DateTime<Utc>>,
    ) -> EconomyResult<Vec<ItemHandle>> {
        data.validate()?;
        Ok(self.distribute(data, amount, expires_at, StackOrder::Insertion))
    }

    pub(crate) fn add_with_order(
        &mut self,
        item_id: &str,
        amount: u32,
        expires_at: Option<DateTime<Utc>>,
        order: StackOrder,
    ) -> EconomyResult<Vec<ItemHandle>> {
        Self::check_item_id(item_id)?;
        let Some(data) = self.catalog.get(item_id).cloned() else {
            warn!("Ignoring add of unknown item '{}'", item_id);
            return Ok(Vec::new());
        };
        data.validate()?;
        Ok(self.distribute(&data, amount, expires_at, order))
    }

    /// Spreads `amount` over matching stacks, then creates `max_stack` chunks.
    fn distribute(
        &mut self,
        data: &Arc<ItemData>,
        amount: u32,
        expires_at: Option<DateTime<Utc>>,
        order: StackOrder,
    ) -> Vec<ItemHandle> {
        if amount == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<SlotId> = self
            .by_item_id
            .get(&data.item_id)
            .map(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .filter(|&slot| {
                        self.items.get(slot).is_some_and(|item| {
                            !item.is_pending_removal() && item.expires_at() == expires_at
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if order == StackOrder::LargestFirst {
            candidates
                .sort_by_key(|&slot| Reverse(self.items.get(slot).map_or(0, InventoryItem::count)));
        }

        let mut remaining = amount;
        for slot in candidates {
            if remaining == 0 {
                break;
            }
            let Some(item) = self.items.get_mut(slot) else {
                continue;
            };
            let take = item.capacity_left().min(remaining);
            if take == 0 {
                continue;
            }
            let previous = item.count();
            item.set_raw_count(previous + take);
            remaining -= take;
            self.events.push(InventoryEvent::CountChanged {
                handle: ItemHandle::new(self.id, slot),
                previous,
                current: previous + take,
            });
        }

        let max_stack = data.max_stack();
        let mut created = Vec::new();
        while remaining > 0 {
            let chunk = remaining.min(max_stack);
            created.push(self.append_item(InventoryItem::new(Arc::clone(data), chunk, expires_at)));
            remaining -= chunk;
        }

        debug!(
            "Added {} x '{}' ({} new stacks)",
            amount,
            data.item_id,
            created.len()
        );
        created
    }

    /// Sets an instance's count, clamped to `max_stack`.
    ///
    /// Zero on an auto-dispose instance queues it for removal.
    ///
    /// # Errors
    ///
    /// Returns `Ownership` if the handle isn't owned by this store.
    pub fn set_count(&mut self, handle: ItemHandle, count: u32) -> EconomyResult<()> {
        let slot = self.owned_slot(handle)?;
        self.apply_count(slot, count);
        Ok(())
    }

    /// Replaces an instance's trait payload.
    ///
    /// # Errors
    ///
    /// - `Ownership` if the handle isn't owned by this store
    /// - `TraitMismatch` if the payload kind differs from the definition's
    pub fn set_traits(&mut self, handle: ItemHandle, traits: ItemTraits) -> EconomyResult<()> {
        let slot = self.owned_slot(handle)?;
        let Some(item) = self.items.get_mut(slot) else {
            return Err(Self::ownership_error(handle));
        };

        let expected = item.definition().traits;
        if traits.kind() != expected {
            return Err(EconomyError::TraitMismatch {
                item_id: item.item_id().to_string(),
                expected: expected.to_string(),
                found: traits.kind().to_string(),
            });
        }

        item.set_traits(Some(traits));
        Ok(())
    }

    /// Queues an instance for removal on the next sweep.
    ///
    /// Fires `ItemRemoved` immediately. Removing an instance that is already
    /// queued does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Ownership` if the handle isn't owned by this store.
    pub fn remove_item(&mut self, handle: ItemHandle) -> EconomyResult<()> {
        let slot = self.owned_slot(handle)?;
        if self.enqueue_removal(slot) {
            debug!("Queued {} for removal", handle);
        }
        Ok(())
    }

    /// Runs the per-tick sweep.
    ///
    /// 1. Instances whose expiry is strictly before now are queued.
    /// 2. Every queued instance is detached from the primary list and indices.
    ///
    /// # Returns
    ///
    /// True if anything was queued when the drain started.
    pub fn update_inventory(&mut self) -> bool {
        let now = self.clock.utc_now();

        let expired: Vec<SlotId> = self
            .order
            .iter()
            .copied()
            .filter(|&slot| {
                self.items
                    .get(slot)
                    .is_some_and(|item| !item.is_pending_removal() && item.is_expired(now))
            })
            .collect();

        for slot in expired {
            debug!("Item {} expired", self.handle(slot));
            self.enqueue_removal(slot);
        }

        if self.remove_queue.is_empty() {
            return false;
        }

        while let Some(slot) = self.remove_queue.pop_front() {
            if let Err(e) = self.detach(slot) {
                error!("Failed to detach item {}: {}", self.handle(slot), e);
            }
        }
        true
    }

    /// Takes every buffered event.
    pub fn drain_events(&mut self) -> Vec<InventoryEvent> {
        std::mem::take(&mut self.events)
    }

    /// Pays `amount` of an item from the smallest spendable stacks first.
    ///
    /// # Returns
    ///
    /// The part of `amount` that could not be paid.
    pub(crate) fn pay(&mut self, item_id: &str, amount: u32, now: DateTime<Utc>) -> u32 {
        let mut slots = self.spendable_slots(item_id, now);
        slots.sort_by_key(|&slot| self.items.get(slot).map_or(0, InventoryItem::count));

        let mut remaining = amount;
        for slot in slots {
            if remaining == 0 {
                break;
            }
            let count = self.items.get(slot).map_or(0, InventoryItem::count);
            if count == 0 {
                continue;
            }
            let take = remaining.min(count);
            self.apply_count(slot, count - take);
            remaining -= take;
        }
        remaining
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Snapshot of the primary list. Queued instances are left out.
    #[must_use]
    pub fn to_save(&self) -> InventorySave {
        let items = self
            .items()
            .filter(|(_, item)| !item.is_pending_removal())
            .map(|(_, item)| SavedItem {
                id: item.id(),
                item_id: item.item_id().to_string(),
                count: item.count(),
                expires_at: item.expires_at(),
                traits: item.traits().cloned(),
            })
            .collect();
        InventorySave { items }
    }

    /// Rebuilds a store from a snapshot.
    ///
    /// Entries naming unknown items or repeating an instance id are skipped.
    /// Counts above `max_stack` are clamped, empty auto-dispose stacks are
    /// dropped, and traits that don't match the definition are discarded.
    #[must_use]
    pub fn from_save(save: InventorySave, catalog: Rc<ItemDatabase>, clock: Arc<dyn TimeSource>) -> Self {
        let mut inventory = Self::new(catalog, clock);

        for saved in save.items {
            let Some(data) = inventory.catalog.get(&saved.item_id).cloned() else {
                warn!("Skipping saved item with unknown id '{}'", saved.item_id);
                continue;
            };
            if inventory.by_instance.contains_key(&saved.id) {
                warn!("Skipping duplicate saved instance {}", saved.id);
                continue;
            }

            let count = if saved.count > data.max_stack() {
                warn!(
                    "Clamping saved '{}' from {} to {}",
                    saved.item_id,
                    saved.count,
                    data.max_stack()
                );
                data.max_stack()
            } else {
                saved.count
            };
            if count == 0 && data.auto_dispose {
                debug!("Dropping empty saved stack of '{}'", saved.item_id);
                continue;
            }

            let traits = match saved.traits {
                Some(traits) if traits.kind() != data.definition.traits => {
                    warn!(
                        "Discarding {} traits on '{}' (expected {})",
                        traits.kind(),
                        saved.item_id,
                        data.definition.traits
                    );
                    None
                }
                other => other,
            };

            inventory.append_item(InventoryItem::restore(
                saved.id,
                data,
                count,
                saved.expires_at,
                traits,
            ));
        }

        inventory.events.clear();
        inventory
    }

    /// Rebuilds this store against a replacement catalog.
    ///
    /// Instances pick up the new entries for their item ids. The same rules as
    /// [`from_save`](Self::from_save) apply: items missing from the new catalog
    /// are dropped and counts are clamped to the new `max_stack`. Queued
    /// instances are not carried over. Handles into the old store are stale.
    #[must_use]
    pub fn rebind_catalog(&self, catalog: Rc<ItemDatabase>) -> Self {
        Self::from_save(self.to_save(), catalog, Arc::clone(&self.clock))
    }

    /// Checks the primary list and every index agree.
    ///
    /// # Errors
    ///
    /// Returns `IndexCorrupted` naming the first inconsistent index.
    pub fn verify_indices(&self) -> EconomyResult<()> {
        if self.order.len() != self.items.len() {
            return Err(self.corrupted(self.order.first().copied(), "primary list"));
        }

        for &slot in &self.order {
            let Some(item) = self.items.get(slot) else {
                return Err(self.corrupted(Some(slot), "primary list"));
            };
            let in_bucket = |bucket: Option<&Vec<SlotId>>| {
                bucket.map_or(0, |b| b.iter().filter(|&&s| s == slot).count()) == 1
            };
            if !in_bucket(self.by_item_id.get(item.item_id())) {
                return Err(self.corrupted(Some(slot), "item id"));
            }
            if !in_bucket(self.by_type.get(&item.definition().item_type)) {
                return Err(self.corrupted(Some(slot), "item type"));
            }
            if self.by_instance.get(&item.id()) != Some(&slot) {
                return Err(self.corrupted(Some(slot), "instance id"));
            }
        }

        let id_total: usize = self.by_item_id.values().map(Vec::len).sum();
        if id_total != self.order.len() {
            return Err(self.corrupted(None, "item id"));
        }
        let type_total: usize = self.by_type.values().map(Vec::len).sum();
        if type_total != self.order.len() {
            return Err(self.corrupted(None, "item type"));
        }
        if self.by_instance.len() != self.order.len() {
            return Err(self.corrupted(None, "instance id"));
        }

        for &slot in &self.remove_queue {
            if !self.items.get(slot).is_some_and(InventoryItem::is_pending_removal) {
                return Err(self.corrupted(Some(slot), "removal queue"));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn handle(&self, slot: SlotId) -> ItemHandle {
        ItemHandle::new(self.id, slot)
    }

    fn check_item_id(item_id: &str) -> EconomyResult<()> {
        if item_id.is_empty() {
            return Err(EconomyError::InvalidArgument("item id is empty".into()));
        }
        Ok(())
    }

    fn ownership_error(handle: ItemHandle) -> EconomyError {
        EconomyError::Ownership {
            handle: handle.to_string(),
        }
    }

    fn corrupted(&self, slot: Option<SlotId>, index: &'static str) -> EconomyError {
        EconomyError::IndexCorrupted {
            handle: slot.map_or_else(|| "-".to_string(), |s| self.handle(s).to_string()),
            index,
        }
    }

    fn owned_slot(&self, handle: ItemHandle) -> EconomyResult<SlotId> {
        if self.owns(handle) {
            Ok(handle.slot())
        } else {
            Err(Self::ownership_error(handle))
        }
    }

    fn bucket_handles(&self, bucket: Option<&Vec<SlotId>>) -> Vec<ItemHandle> {
        bucket
            .map(|b| b.iter().map(|&slot| self.handle(slot)).collect())
            .unwrap_or_default()
    }

    /// Stacks of an item id that are neither pending nor expired, in insertion order.
    fn spendable_slots(&self, item_id: &str, now: DateTime<Utc>) -> Vec<SlotId> {
        self.by_item_id
            .get(item_id)
            .map(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .filter(|&slot| {
                        self.items
                            .get(slot)
                            .is_some_and(|item| item.is_spendable(now))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn bucket_stack(&self, bucket: Option<&Vec<SlotId>>) -> u64 {
        bucket.map_or(0, |b| {
            b.iter()
                .filter_map(|&slot| self.items.get(slot))
                .map(|item| u64::from(item.count()))
                .sum()
        })
    }

    fn apply_count(&mut self, slot: SlotId, count: u32) {
        let Some(item) = self.items.get_mut(slot) else {
            return;
        };
        let previous = item.count();
        let current = count.min(item.data().max_stack());
        let dispose = current == 0 && item.data().auto_dispose;
        item.set_raw_count(current);

        if previous != current {
            self.events.push(InventoryEvent::CountChanged {
                handle: ItemHandle::new(self.id, slot),
                previous,
                current,
            });
        }
        if dispose {
            self.enqueue_removal(slot);
        }
    }

    /// Returns false if the slot was already queued or isn't live.
    fn enqueue_removal(&mut self, slot: SlotId) -> bool {
        let Some(item) = self.items.get_mut(slot) else {
            return false;
        };
        if item.is_pending_removal() {
            return false;
        }
        item.mark_pending();
        self.remove_queue.push_back(slot);
        self.events
            .push(InventoryEvent::ItemRemoved(ItemHandle::new(self.id, slot)));
        true
    }

    fn append_item(&mut self, item: InventoryItem) -> ItemHandle {
        let item_id = item.item_id().to_string();
        let item_type = item.definition().item_type.clone();
        let instance = item.id();

        let slot = self.items.insert(item);
        self.order.push(slot);
        self.by_item_id.entry(item_id).or_default().push(slot);
        self.by_type.entry(item_type).or_default().push(slot);
        self.by_instance.insert(instance, slot);

        let handle = self.handle(slot);
        self.events.push(InventoryEvent::ItemAdded(handle));
        handle
    }

    fn detach(&mut self, slot: SlotId) -> EconomyResult<InventoryItem> {
        let handle = self.handle(slot);
        let item = self
            .items
            .remove(slot)
            .ok_or_else(|| Self::ownership_error(handle))?;

        let mut missing = None;
        if !unlink(&mut self.by_item_id, item.item_id(), slot) {
            missing = Some("item id");
        }
        if !unlink(&mut self.by_type, &item.definition().item_type, slot) {
            missing = missing.or(Some("item type"));
        }
        if self.by_instance.remove(&item.id()).is_none() {
            missing = missing.or(Some("instance id"));
        }
        match self.order.iter().position(|&s| s == slot) {
            Some(pos) => {
                self.order.remove(pos);
            }
            None => {
                missing = missing.or(Some("primary list"));
            }
        }

        if let Some(index) = missing {
            return Err(EconomyError::IndexCorrupted {
                handle: handle.to_string(),
                index,
            });
        }
        debug!("Detached {} ('{}')", handle, item.item_id());
        Ok(item)
    }
}

/// Removes `slot` from its bucket, dropping the bucket when it empties.
fn unlink<K, Q>(index: &mut HashMap<K, Vec<SlotId>>, key: &Q, slot: SlotId) -> bool
where
    K: Borrow<Q> + Eq + Hash,
    Q: Eq + Hash + ?Sized,
{
    let Some(bucket) = index.get_mut(key) else {
        return false;
    };
    let Some(pos) = bucket.iter().position(|&s| s == slot) else {
        return false;
    };
    bucket.remove(pos);
    if bucket.is_empty() {
        index.remove(key);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ItemDefinition, TraitKind};
    use bazaar_core::ManualClock;
    use chrono::TimeZone;

    struct Currency;

    impl ItemFamily for Currency {
        const ITEM_TYPE: &'static str = "currency";
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn catalog() -> Rc<ItemDatabase> {
        Rc::new(
            ItemDatabase::load(vec![
                ItemData::new("gem", ItemDefinition::new("Gem", "currency", 99)),
                ItemData::new("coin", ItemDefinition::new("Coin", "currency", 999)),
                ItemData::new(
                    "sword",
                    ItemDefinition::new("Sword", "gear", 1).with_traits(TraitKind::Equipment),
                ),
                ItemData::new("ticket", ItemDefinition::new("Ticket", "pass", 10))
                    .with_auto_dispose(false),
            ])
            .unwrap(),
        )
    }

    fn setup() -> (Inventory, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        (Inventory::new(catalog(), clock.clone()), clock)
    }

    fn counts(inv: &Inventory, item_id: &str) -> Vec<u32> {
        inv.find_many_by_item_id(item_id)
            .unwrap()
            .into_iter()
            .map(|h| inv.item(h).unwrap().count())
            .collect()
    }

    #[test]
    fn test_add_splits_into_max_stack_chunks() {
        let (mut inv, _) = setup();
        let created = inv.add_item("gem", 150, None).unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(counts(&inv, "gem"), vec![99, 51]);
        assert_eq!(inv.count_stack_by_item_id("gem").unwrap(), 150);
        inv.verify_indices().unwrap();
    }

    #[test]
    fn test_add_large_amount_never_exceeds_max_stack() {
        let (mut inv, _) = setup();
        inv.add_item("gem", 500, None).unwrap();
        assert_eq!(counts(&inv, "gem"), vec![99, 99, 99, 99, 99, 5]);
    }

    #[test]
    fn test_add_tops_up_before_creating() {
        let (mut inv, _) = setup();
        inv.add_item("gem", 90, None).unwrap();
        let created = inv.add_item("gem", 20, None).unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(counts(&inv, "gem"), vec![99, 11]);
    }

    #[test]
    fn test_add_keeps_expiries_apart() {
        let (mut inv, _) = setup();
        let tomorrow = start() + Duration::days(1);
        inv.add_item("gem", 10, None).unwrap();
        inv.add_item("gem", 10, Some(tomorrow)).unwrap();
        inv.add_item("gem", 5, Some(tomorrow)).unwrap();

        assert_eq!(counts(&inv, "gem"), vec![10, 15]);
    }

    #[test]
    fn test_add_unknown_or_zero_is_noop() {
        let (mut inv, _) = setup();
        assert!(inv.add_item("ruby", 5, None).unwrap().is_empty());
        assert!(inv.add_item("gem", 0, None).unwrap().is_empty());
        assert!(inv.is_empty());
        assert!(matches!(
            inv.add_item("", 1, None),
            Err(EconomyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_type_queries() {
        let (mut inv, _) = setup();
        inv.add_item("gem", 5, None).unwrap();
        inv.add_item("coin", 7, None).unwrap();
        inv.add_item("sword", 1, None).unwrap();

        let currency = Currency::item_type();
        assert_eq!(inv.count_by_type(&currency), 2);
        assert_eq!(inv.count_stack_by_type(&currency), 12);
        assert_eq!(inv.find_many_by_type(&ItemType::new("gear")).len(), 1);
        assert!(inv.find_many_by_type(&ItemType::new("pet")).is_empty());

        let first = inv.find_one_by_type::<Currency>().unwrap();
        assert_eq!(inv.item(first).unwrap().item_id(), "gem");
    }

    #[test]
    fn test_remove_fires_event_before_detach() {
        let (mut inv, _) = setup();
        let handle = inv.add_item("gem", 5, None).unwrap()[0];
        inv.drain_events();

        inv.remove_item(handle).unwrap();
        assert_eq!(inv.drain_events(), vec![InventoryEvent::ItemRemoved(handle)]);

        // Still visible until the sweep.
        assert!(inv.item(handle).unwrap().is_pending_removal());
        assert_eq!(inv.count_by_item_id("gem").unwrap(), 1);

        assert!(inv.update_inventory());
        assert!(inv.item(handle).is_none());
        assert_eq!(inv.count_by_item_id("gem").unwrap(), 0);
        inv.verify_indices().unwrap();
    }

    #[test]
    fn test_duplicate_remove_is_idempotent() {
        let (mut inv, _) = setup();
        let handle = inv.add_item("gem", 5, None).unwrap()[0];
        inv.drain_events();

        inv.remove_item(handle).unwrap();
        inv.remove_item(handle).unwrap();
        assert_eq!(inv.pending_removals(), 1);
        assert_eq!(inv.drain_events().len(), 1);

        assert!(inv.update_inventory());
        assert!(!inv.update_inventory());
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let (mut a, _) = setup();
        let (mut b, _) = setup();
        let handle = a.add_item("gem", 1, None).unwrap()[0];

        assert!(matches!(
            b.remove_item(handle),
            Err(EconomyError::Ownership { .. })
        ));
        assert!(b.item(handle).is_none());

        a.remove_item(handle).unwrap();
        a.update_inventory();
        assert!(matches!(
            a.set_count(handle, 3),
            Err(EconomyError::Ownership { .. })
        ));
    }

    #[test]
    fn test_set_count_clamps_and_disposes() {
        let (mut inv, _) = setup();
        let handle = inv.add_item("gem", 5, None).unwrap()[0];
        inv.drain_events();

        inv.set_count(handle, 500).unwrap();
        assert_eq!(inv.item(handle).unwrap().count(), 99);
        assert_eq!(
            inv.drain_events(),
            vec![InventoryEvent::CountChanged {
                handle,
                previous: 5,
                current: 99
            }]
        );

        inv.set_count(handle, 0).unwrap();
        assert!(inv.item(handle).unwrap().is_pending_removal());
        inv.update_inventory();
        assert!(inv.is_empty());
    }

    #[test]
    fn test_non_auto_dispose_sits_at_zero() {
        let (mut inv, _) = setup();
        let handle = inv.add_item("ticket", 3, None).unwrap()[0];
        inv.set_count(handle, 0).unwrap();

        assert!(!inv.update_inventory());
        assert_eq!(inv.item(handle).unwrap().count(), 0);
    }

    #[test]
    fn test_expiry_sweep() {
        let (mut inv, clock) = setup();
        let soon = inv
            .add_item_after("gem", 5, Duration::seconds(10))
            .unwrap()[0];
        let keep = inv.add_item("gem", 5, None).unwrap()[0];

        assert!(!inv.update_inventory());

        clock.advance(Duration::seconds(10));
        assert!(!inv.update_inventory(), "expiry is strictly before now");

        clock.advance(Duration::seconds(1));
        assert!(inv.update_inventory());
        assert!(inv.item(soon).is_none());
        assert!(inv.item(keep).is_some());
        assert_eq!(inv.count_by_type(&Currency::item_type()), 1);
        inv.verify_indices().unwrap();
    }

    #[test]
    fn test_set_traits_checks_kind() {
        let (mut inv, _) = setup();
        let sword = inv.add_item("sword", 1, None).unwrap()[0];
        let gem = inv.add_item("gem", 1, None).unwrap()[0];
        let helm = ItemTraits::Equipment {
            slot: "hand".into(),
            level: 2,
        };

        inv.set_traits(sword, helm.clone()).unwrap();
        assert_eq!(inv.item(sword).unwrap().traits(), Some(&helm));

        assert!(matches!(
            inv.set_traits(gem, helm),
            Err(EconomyError::TraitMismatch { .. })
        ));
    }

    #[test]
    fn test_pay_drains_smallest_first() {
        let (mut inv, _) = setup();
        for amount in [5, 2, 8] {
            let data = Arc::clone(inv.catalog().get("gem").unwrap());
            inv.append_item(InventoryItem::new(data, amount, None));
        }

        assert_eq!(inv.pay("gem", 10, start()), 0);
        inv.update_inventory();
        assert_eq!(counts(&inv, "gem"), vec![5]);
    }

    #[test]
    fn test_pay_skips_queued_stacks() {
        let (mut inv, _) = setup();
        inv.add_item("gem", 30, None).unwrap();
        let queued = inv
            .add_item("gem", 20, Some(start() + Duration::days(1)))
            .unwrap()[0];
        inv.remove_item(queued).unwrap();

        assert_eq!(inv.spendable_stack_by_item_id("gem", start()).unwrap(), 30);
        assert_eq!(inv.pay("gem", 20, start()), 0);
        assert_eq!(inv.item(queued).unwrap().count(), 20);

        inv.update_inventory();
        assert_eq!(counts(&inv, "gem"), vec![10]);
    }

    #[test]
    fn test_pay_skips_expired_stacks() {
        let (mut inv, clock) = setup();
        inv.add_item("gem", 30, None).unwrap();
        inv.add_item("gem", 20, Some(start() + Duration::seconds(5)))
            .unwrap();
        clock.advance(Duration::minutes(1));
        let now = inv.now();

        // Expired but not swept yet: still counted, never spent.
        assert_eq!(inv.count_stack_by_item_id("gem").unwrap(), 50);
        assert_eq!(inv.spendable_stack_by_item_id("gem", now).unwrap(), 30);

        assert_eq!(inv.pay("gem", 40, now), 10);
        inv.update_inventory();
        assert_eq!(inv.count_stack_by_item_id("gem").unwrap(), 0);
    }

    #[test]
    fn test_reward_order_tops_up_largest_first() {
        let (mut inv, _) = setup();
        for amount in [10, 90] {
            let data = Arc::clone(inv.catalog().get("gem").unwrap());
            inv.append_item(InventoryItem::new(data, amount, None));
        }

        inv.add_with_order("gem", 5, None, StackOrder::LargestFirst)
            .unwrap();
        assert_eq!(counts(&inv, "gem"), vec![10, 95]);
    }

    #[test]
    fn test_instance_lookup() {
        let (mut inv, _) = setup();
        let handle = inv.add_item("coin", 3, None).unwrap()[0];
        let id = inv.item(handle).unwrap().id();

        assert_eq!(inv.get_item(&id), Some(handle));
        assert_eq!(inv.get_item(&Uuid::new_v4()), None);
    }

    #[test]
    fn test_save_snapshot_restores() {
        let (mut inv, clock) = setup();
        inv.add_item("gem", 150, None).unwrap();
        inv.add_item_after("coin", 40, Duration::hours(1)).unwrap();
        let gone = inv.add_item("sword", 1, None).unwrap()[0];
        inv.remove_item(gone).unwrap();

        let restored = Inventory::from_save(inv.to_save(), catalog(), clock);
        restored.verify_indices().unwrap();

        let original: Vec<_> = inv
            .items()
            .filter(|(_, i)| !i.is_pending_removal())
            .map(|(_, i)| (i.id(), i.count(), i.expires_at()))
            .collect();
        let loaded: Vec<_> = restored
            .items()
            .map(|(_, i)| (i.id(), i.count(), i.expires_at()))
            .collect();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_rebind_catalog_uses_new_entries() {
        let (mut inv, _) = setup();
        inv.add_item("gem", 150, None).unwrap();
        inv.add_item("coin", 5, None).unwrap();

        let smaller = Rc::new(
            ItemDatabase::load(vec![ItemData::new(
                "gem",
                ItemDefinition::new("Gem", "currency", 60),
            )])
            .unwrap(),
        );
        let rebound = inv.rebind_catalog(Rc::clone(&smaller));

        assert_eq!(counts(&rebound, "gem"), vec![60, 51]);
        assert_eq!(rebound.count_by_item_id("coin").unwrap(), 0);
        let (_, first) = rebound.items().next().unwrap();
        assert!(Arc::ptr_eq(first.data(), smaller.get("gem").unwrap()));
        rebound.verify_indices().unwrap();
    }

    #[test]
    fn test_from_save_sanitizes_entries() {
        let id = Uuid::new_v4();
        let save = InventorySave {
            items: vec![
                SavedItem {
                    id,
                    item_id: "gem".into(),
                    count: 500,
                    expires_at: None,
                    traits: Some(ItemTraits::Consumable { uses_left: 1 }),
                },
                SavedItem {
                    id,
                    item_id: "gem".into(),
                    count: 1,
                    expires_at: None,
                    traits: None,
                },
                SavedItem {
                    id: Uuid::new_v4(),
                    item_id: "ruby".into(),
                    count: 1,
                    expires_at: None,
                    traits: None,
                },
                SavedItem {
                    id: Uuid::new_v4(),
                    item_id: "coin".into(),
                    count: 0,
                    expires_at: None,
                    traits: None,
                },
            ],
        };

        let clock = Arc::new(ManualClock::new(start()));
        let mut inv = Inventory::from_save(save, catalog(), clock);
        assert_eq!(inv.len(), 1);

        let handle = inv.get_item(&id).unwrap();
        let item = inv.item(handle).unwrap();
        assert_eq!(item.count(), 99);
        assert!(item.traits().is_none());
        assert!(inv.drain_events().is_empty());
    }
}
