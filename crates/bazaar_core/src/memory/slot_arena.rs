//! # Slot Arena
//!
//! Generational storage for objects that are inserted and removed individually.

/// Identifier for a value stored in a [`SlotArena`].
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the slot array
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SlotId(u64);

impl SlotId {
    /// Creates a new slot ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the slot ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the slot ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A growable arena with generation-checked handles.
///
/// Removing a value bumps the slot generation, so an old [`SlotId`] never
/// resolves to whatever is stored in the slot next.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one arena per owner.
///
/// # Example
///
/// ```
/// use bazaar_core::SlotArena;
///
/// let mut arena = SlotArena::new();
/// let id = arena.insert("gem");
/// assert_eq!(arena.get(id), Some(&"gem"));
///
/// arena.remove(id);
/// assert!(!arena.contains(id));
/// ```
#[derive(Debug)]
pub struct SlotArena<T> {
    /// The storage array.
    slots: Vec<Slot<T>>,
    /// Free list - indices of vacated slots.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` values before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of stored values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value and returns its ID.
    ///
    /// Vacated slots are reused before the arena grows.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` slots are ever allocated.
    pub fn insert(&mut self, value: T) -> SlotId {
        self.len += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotId::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).expect("slot arena exceeded u32::MAX slots");
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotId::new(index, 0)
    }

    /// Removes a value, returning it if the ID was live.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index());
        self.len -= 1;

        Some(value)
    }

    /// Returns true if the ID refers to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    /// Gets a reference to a live value.
    #[inline]
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&T> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to a live value.
    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Removes every value. Outstanding IDs become stale.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            // Indices always fit: `insert` refuses to grow past u32::MAX.
            #[allow(clippy::cast_possible_truncation)]
            let index = index as u32;
            self.free_list.push(index);
        }
        self.len = 0;
    }

    /// Iterates over all live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let id = SlotId::new(index as u32, slot.generation);
            slot.value.as_ref().map(|v| (id, v))
        })
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
