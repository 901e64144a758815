//! # Inventory Save Format
//!
//! Only the primary list is written. Indices are rebuilt on load.
//!
//! | Version | Shape |
//! |---------|-------|
//! | `0.0.0` | headerless; items carry `itemId`, `itemStack`, `InventoryTraits` |
//! | `1.0.0` | items carry `id`, `item_id`, `count`, `expires_at`, `traits` |

use bazaar_core::{Migrator, PersistError, VersionTag, Versioned};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::item::ItemTraits;

/// Saved form of an inventory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySave {
    /// Instances in insertion order.
    #[serde(default)]
    pub items: Vec<SavedItem>,
}

/// Saved form of one instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedItem {
    /// Unique instance id.
    pub id: Uuid,
    /// Catalog item id.
    pub item_id: String,
    /// Stack count.
    pub count: u32,
    /// Absolute expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Trait payload.
    #[serde(default)]
    pub traits: Option<ItemTraits>,
}

impl Versioned for InventorySave {
    const CURRENT_VERSION: VersionTag = VersionTag::new(1, 0, 0);

    fn migrators() -> Vec<Box<dyn Migrator>> {
        vec![Box::new(LegacySaveMigrator)]
    }
}

/// Upgrades headerless saves to `1.0.0`.
///
/// Legacy items had no instance id, so each one gets a fresh id. Non-empty
/// `InventoryTraits` maps become `attributes` traits.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegacySaveMigrator;

impl LegacySaveMigrator {
    fn fail(&self, reason: impl Into<String>) -> PersistError {
        PersistError::MigrationFailed {
            from: self.source_version(),
            to: self.target_version(),
            reason: reason.into(),
        }
    }

    fn migrate_item(&self, legacy: &Value) -> Result<Value, PersistError> {
        let item_id = legacy
            .get("itemId")
            .and_then(Value::as_str)
            .ok_or_else(|| self.fail("item without itemId"))?;
        let count = legacy
            .get("itemStack")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .clamp(0, i64::from(u32::MAX));

        let traits = match legacy.get("InventoryTraits").and_then(Value::as_object) {
            Some(values) if !values.is_empty() => {
                let values: Map<String, Value> = values
                    .iter()
                    .map(|(k, v)| {
                        let text = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                        (k.clone(), Value::String(text))
                    })
                    .collect();
                json!({ "kind": "attributes", "values": values })
            }
            _ => Value::Null,
        };

        Ok(json!({
            "id": Uuid::new_v4(),
            "item_id": item_id,
            "count": count,
            "expires_at": null,
            "traits": traits,
        }))
    }
}

impl Migrator for LegacySaveMigrator {
    fn source_version(&self) -> VersionTag {
        VersionTag::UNVERSIONED
    }

    fn target_version(&self) -> VersionTag {
        VersionTag::new(1, 0, 0)
    }

    fn migrate(&self, payload: Value) -> Result<Value, PersistError> {
        let legacy_items = match &payload {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => match map.get("items") {
                Some(Value::Array(items)) => items.as_slice(),
                Some(_) => return Err(self.fail("items is not a list")),
                None => &[][..],
            },
            _ => return Err(self.fail("expected an object or a list")),
        };

        let items = legacy_items
            .iter()
            .map(|item| self.migrate_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({ "items": items }))
    }
}
