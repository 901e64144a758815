//! # Item Instances
//!
//! One [`InventoryItem`] is one stack of a single item id. Instances live
//! inside an [`Inventory`](crate::Inventory) arena and are addressed from
//! outside through an [`ItemHandle`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bazaar_core::SlotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{ItemData, ItemDefinition, TraitKind};

static NEXT_STORE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one inventory store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoreId(u32);

impl StoreId {
    /// Allocates a process-unique store id.
    pub(crate) fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Reference to an instance inside a specific inventory.
///
/// Handles are plain values. Ownership is checked on every use, so a handle
/// from another store or a detached instance is rejected rather than followed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemHandle {
    store: StoreId,
    slot: SlotId,
}

impl ItemHandle {
    pub(crate) const fn new(store: StoreId, slot: SlotId) -> Self {
        Self { store, slot }
    }

    /// The store that issued this handle.
    #[inline]
    #[must_use]
    pub const fn store(self) -> StoreId {
        self.store
    }

    /// Arena slot within the store.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> SlotId {
        self.slot
    }
}

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store.0, self.slot)
    }
}

/// Family-specific payload carried by an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemTraits {
    /// Limited-use item.
    Consumable {
        /// Uses remaining.
        uses_left: u32,
    },
    /// Wearable item.
    Equipment {
        /// Slot the item is worn in.
        slot: String,
        /// Upgrade level.
        level: u32,
    },
    /// Free-form string attributes.
    Attributes {
        /// Attribute values by name.
        values: BTreeMap<String, String>,
    },
}

impl ItemTraits {
    /// The kind this payload satisfies.
    #[must_use]
    pub const fn kind(&self) -> TraitKind {
        match self {
            Self::Consumable { .. } => TraitKind::Consumable,
            Self::Equipment { .. } => TraitKind::Equipment,
            Self::Attributes { .. } => TraitKind::Attributes,
        }
    }
}

/// Lifecycle of an owned instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    /// Live in the store.
    Owned,
    /// Queued for detachment on the next sweep. Still visible to queries.
    PendingRemoval,
}

/// One stack of an item id.
#[derive(Clone, Debug)]
pub struct InventoryItem {
    id: Uuid,
    data: Arc<ItemData>,
    count: u32,
    expires_at: Option<DateTime<Utc>>,
    traits: Option<ItemTraits>,
    state: ItemState,
}

impl InventoryItem {
    pub(crate) fn new(data: Arc<ItemData>, count: u32, expires_at: Option<DateTime<Utc>>) -> Self {
        Self::restore(Uuid::new_v4(), data, count, expires_at, None)
    }

    pub(crate) fn restore(
        id: Uuid,
        data: Arc<ItemData>,
        count: u32,
        expires_at: Option<DateTime<Utc>>,
        traits: Option<ItemTraits>,
    ) -> Self {
        Self {
            id,
            data,
            count,
            expires_at,
            traits,
            state: ItemState::Owned,
        }
    }

    /// Unique instance id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Catalog item id.
    #[inline]
    #[must_use]
    pub fn item_id(&self) -> &str {
        &self.data.item_id
    }

    /// Catalog entry.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Arc<ItemData> {
        &self.data
    }

    /// Item definition.
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &ItemDefinition {
        &self.data.definition
    }

    /// Current count.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Room left before the stack is full.
    #[inline]
    #[must_use]
    pub fn capacity_left(&self) -> u32 {
        self.data.max_stack().saturating_sub(self.count)
    }

    /// Absolute expiry, if any.
    #[inline]
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the expiry is strictly before `now`.
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Trait payload, if any.
    #[inline]
    #[must_use]
    pub const fn traits(&self) -> Option<&ItemTraits> {
        self.traits.as_ref()
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ItemState {
        self.state
    }

    /// Returns true once the instance has been queued for removal.
    #[inline]
    #[must_use]
    pub fn is_pending_removal(&self) -> bool {
        self.state == ItemState::PendingRemoval
    }

    /// Returns true if the stack can still pay costs at `now`: not queued for
    /// removal and not expired.
    #[inline]
    #[must_use]
    pub fn is_spendable(&self, now: DateTime<Utc>) -> bool {
        !self.is_pending_removal() && !self.is_expired(now)
    }

    pub(crate) fn set_raw_count(&mut self, count: u32) {
        self.count = count;
    }

    pub(crate) fn set_traits(&mut self, traits: Option<ItemTraits>) {
        self.traits = traits;
    }

    pub(crate) fn mark_pending(&mut self) {
        self.state = ItemState::PendingRemoval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn gem() -> Arc<ItemData> {
        Arc::new(ItemData::new("gem", ItemDefinition::new("Gem", "currency", 99)))
    }

    #[test]
    fn test_new_instances_get_distinct_ids() {
        let a = InventoryItem::new(gem(), 1, None);
        let b = InventoryItem::new(gem(), 1, None);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), ItemState::Owned);
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let item = InventoryItem::new(gem(), 1, Some(now));
        assert!(!item.is_expired(now));
        assert!(item.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_pending_or_expired_is_not_spendable() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut item = InventoryItem::new(gem(), 5, Some(now + Duration::seconds(5)));
        assert!(item.is_spendable(now));
        assert!(!item.is_spendable(now + Duration::seconds(6)));

        item.mark_pending();
        assert!(!item.is_spendable(now));
    }

    #[test]
    fn test_traits_tagged_serialization() {
        let traits = ItemTraits::Equipment {
            slot: "head".into(),
            level: 3,
        };
        let json = serde_json::to_value(&traits).unwrap();
        assert_eq!(json["kind"], "equipment");
        assert_eq!(traits.kind(), TraitKind::Equipment);
    }

    #[test]
    fn test_store_ids_unique() {
        assert_ne!(StoreId::next(), StoreId::next());
    }
}
