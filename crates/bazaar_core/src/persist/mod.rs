//! # Persistence
//!
//! Versioned save payloads and the stores that hold them.
//!
//! ## Format
//!
//! ```text
//! Version: 1.0.0
//! { ...json body... }
//! ```
//!
//! Payloads without a header are read as version `0.0.0`.

mod store;
mod version;
mod versioned;

use thiserror::Error;

pub use store::{load, save, FileStore, MemoryStore, SaveStore};
pub use version::{split_header, VersionTag, HEADER_PREFIX};
pub use versioned::{decode, encode, Migrator, Versioned};

/// Errors raised while reading, writing or migrating saves.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The version header couldn't be parsed.
    #[error("invalid version string: '{0}'")]
    InvalidVersion(String),

    /// The payload was written by a newer build.
    #[error("save version {found} is newer than supported version {current}")]
    UnsupportedVersion {
        /// Version found in the payload.
        found: VersionTag,
        /// Version this build writes.
        current: VersionTag,
    },

    /// No migrator chain leads from the payload's version to the current one.
    #[error("no migration path from {from} to {to}")]
    MissingMigration {
        /// Version the chain stopped at.
        from: VersionTag,
        /// Version that was required.
        to: VersionTag,
    },

    /// A migrator rejected the payload.
    #[error("migration {from} -> {to} failed: {reason}")]
    MigrationFailed {
        /// Source version of the failed step.
        from: VersionTag,
        /// Target version of the failed step.
        to: VersionTag,
        /// What went wrong.
        reason: String,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend failed.
    #[error("i/o error for '{key}': {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The key can't be mapped to a storage location.
    #[error("invalid save key: '{0}'")]
    InvalidKey(String),
}
