//! # Economy Error Types
//!
//! All errors that can occur in the economy system.

use bazaar_core::{KeyedMapError, PersistError};
use thiserror::Error;

/// Errors that can occur in the economy system.
#[derive(Error, Debug)]
pub enum EconomyError {
    /// An argument was empty or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A catalog failed to build or a strict lookup missed.
    #[error("catalog error: {0}")]
    Catalog(#[from] KeyedMapError),

    /// An item or transaction definition is malformed.
    #[error("invalid definition for '{item_id}': {reason}")]
    InvalidDefinition {
        /// Id of the offending entry.
        item_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The handle does not refer to an item owned by this inventory.
    #[error("item {handle} is not owned by this inventory")]
    Ownership {
        /// The rejected handle.
        handle: String,
    },

    /// A trait payload does not match the item's declared trait kind.
    #[error("trait mismatch for '{item_id}': expected {expected}, found {found}")]
    TraitMismatch {
        /// The item whose traits were being set.
        item_id: String,
        /// Kind declared by the definition.
        expected: String,
        /// Kind of the supplied payload.
        found: String,
    },

    /// An inventory index lost track of an instance.
    #[error("item {handle} missing from the {index} index")]
    IndexCorrupted {
        /// The affected handle.
        handle: String,
        /// Which index was inconsistent.
        index: &'static str,
    },

    /// Saving or loading failed.
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
