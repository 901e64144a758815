//! # Keyed Map
//!
//! Unique-key lookup built once from a list of catalog entries.
//!
//! Building fails fast on duplicate or missing keys. A broken catalog
//! can't safely serve queries, so the error is returned to whoever loads it.

use std::collections::hash_map::{self, HashMap};
use std::fmt::Display;
use std::hash::Hash;

use thiserror::Error;

/// Errors raised while building or strictly querying a [`KeyedMap`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyedMapError {
    /// An entry produced no key.
    #[error("entry at position {index} has no key")]
    NullEntry {
        /// Position of the entry in the source list.
        index: usize,
    },

    /// Two entries produced the same key.
    #[error("duplicate key found: {key}")]
    DuplicateKey {
        /// The conflicting key.
        key: String,
    },

    /// A strict lookup missed.
    #[error("key '{key}' not found in the mapped list")]
    KeyNotFound {
        /// The key that was requested.
        key: String,
    },
}

/// A map whose keys are derived from its values and guaranteed unique.
#[derive(Clone, Debug)]
pub struct KeyedMap<K, V> {
    lookup: HashMap<K, V>,
}

impl<K, V> KeyedMap<K, V>
where
    K: Eq + Hash + Display,
{
    /// Builds the map, deriving each entry's key with `key_fn`.
    ///
    /// `key_fn` returns `None` for an entry that has no usable key.
    ///
    /// # Errors
    ///
    /// - `NullEntry` if `key_fn` yields `None` for any entry
    /// - `DuplicateKey` if two entries share a key
    pub fn build<I, F>(entries: I, mut key_fn: F) -> Result<Self, KeyedMapError>
    where
        I: IntoIterator<Item = V>,
        F: FnMut(&V) -> Option<K>,
    {
        let entries = entries.into_iter();
        let mut lookup = HashMap::with_capacity(entries.size_hint().0);

        for (index, entry) in entries.enumerate() {
            let key = key_fn(&entry).ok_or(KeyedMapError::NullEntry { index })?;

            match lookup.entry(key) {
                hash_map::Entry::Occupied(occupied) => {
                    return Err(KeyedMapError::DuplicateKey {
                        key: occupied.key().to_string(),
                    });
                }
                hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(entry);
                }
            }
        }

        Ok(Self { lookup })
    }

    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lookup: HashMap::new(),
        }
    }

    /// Looks up a value. Absent keys are not an error.
    #[inline]
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lookup.get(key)
    }

    /// Looks up a value that must exist.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    pub fn require<Q>(&self, key: &Q) -> Result<&V, KeyedMapError>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + Display + ?Sized,
    {
        self.lookup.get(key).ok_or_else(|| KeyedMapError::KeyNotFound {
            key: key.to_string(),
        })
    }

    /// Returns true if the key is present.
    #[inline]
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lookup.contains_key(key)
    }

    /// Adds a new entry.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if the key already exists.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), KeyedMapError> {
        match self.lookup.entry(key) {
            hash_map::Entry::Occupied(occupied) => Err(KeyedMapError::DuplicateKey {
                key: occupied.key().to_string(),
            }),
            hash_map::Entry::Vacant(vacant) => {
                vacant.insert(value);
                Ok(())
            }
        }
    }

    /// Replaces the value of an existing entry, returning the old one.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    pub fn replace(&mut self, key: &K, value: V) -> Result<V, KeyedMapError> {
        match self.lookup.get_mut(key) {
            Some(slot) => Ok(std::mem::replace(slot, value)),
            None => Err(KeyedMapError::KeyNotFound {
                key: key.to_string(),
            }),
        }
    }

    /// Removes an entry, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lookup.remove(key)
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Returns true if the map holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Iterates over keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.lookup.keys()
    }

    /// Iterates over values in arbitrary order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.lookup.values()
    }

    /// Iterates over entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.lookup.iter()
    }
}

impl<K, V> Default for KeyedMap<K, V>
where
    K: Eq + Hash + Display,
{
    fn default() -> Self {
        Self::new()
    }
}
