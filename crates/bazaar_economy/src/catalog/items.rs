//! Item definitions and catalog entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Tag grouping items into families (`"currency"`, `"booster"`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemType(String);

impl ItemType {
    /// Creates a type tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The raw tag.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// A statically named item family.
///
/// Lets callers query an inventory by family without spelling the tag:
///
/// ```
/// use bazaar_economy::ItemFamily;
///
/// struct Currency;
///
/// impl ItemFamily for Currency {
///     const ITEM_TYPE: &'static str = "currency";
/// }
///
/// assert_eq!(Currency::item_type().as_str(), "currency");
/// ```
pub trait ItemFamily {
    /// The family's type tag.
    const ITEM_TYPE: &'static str;

    /// The tag as an [`ItemType`].
    #[must_use]
    fn item_type() -> ItemType {
        ItemType::new(Self::ITEM_TYPE)
    }
}

/// Which trait payload instances of an item may carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    /// No payload.
    #[default]
    None,
    /// Limited-use items.
    Consumable,
    /// Wearable items.
    Equipment,
    /// Free-form string attributes.
    Attributes,
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Consumable => "consumable",
            Self::Equipment => "equipment",
            Self::Attributes => "attributes",
        };
        f.write_str(name)
    }
}

/// Description of an item family member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Largest count a single instance may hold. Always at least 1.
    pub max_stack: u32,
    /// Family tag used for type queries.
    pub item_type: ItemType,
    /// Trait payload kind.
    #[serde(default)]
    pub traits: TraitKind,
}

impl ItemDefinition {
    /// Creates a definition with no description and no traits.
    #[must_use]
    pub fn new(name: impl Into<String>, item_type: impl Into<ItemType>, max_stack: u32) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            max_stack,
            item_type: item_type.into(),
            traits: TraitKind::None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the trait kind.
    #[must_use]
    pub const fn with_traits(mut self, traits: TraitKind) -> Self {
        self.traits = traits;
        self
    }
}

const fn default_auto_dispose() -> bool {
    true
}

/// A catalog entry: a unique item id bound to its definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemData {
    /// Unique item id.
    pub item_id: String,
    /// The definition.
    #[serde(flatten)]
    pub definition: ItemDefinition,
    /// Whether instances disappear when their count reaches zero.
    #[serde(default = "default_auto_dispose")]
    pub auto_dispose: bool,
}

impl ItemData {
    /// Creates an auto-disposing entry.
    #[must_use]
    pub fn new(item_id: impl Into<String>, definition: ItemDefinition) -> Self {
        Self {
            item_id: item_id.into(),
            definition,
            auto_dispose: true,
        }
    }

    /// Sets the auto-dispose flag.
    #[must_use]
    pub const fn with_auto_dispose(mut self, auto_dispose: bool) -> Self {
        self.auto_dispose = auto_dispose;
        self
    }

    /// Shorthand for `definition.max_stack`.
    #[inline]
    #[must_use]
    pub const fn max_stack(&self) -> u32 {
        self.definition.max_stack
    }

    /// Shorthand for `definition.item_type`.
    #[inline]
    #[must_use]
    pub const fn item_type(&self) -> &ItemType {
        &self.definition.item_type
    }

    /// Checks the entry can be used by an inventory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` if `max_stack` is zero.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.definition.max_stack == 0 {
            return Err(EconomyError::InvalidDefinition {
                item_id: self.item_id.clone(),
                reason: "max_stack must be at least 1".into(),
            });
        }
        Ok(())
    }
}
