//! # Versioned Payloads
//!
//! Every saved payload starts with a `Version: x.y.z` line followed by a
//! JSON body. Older payloads are brought up to date by a chain of
//! [`Migrator`]s before they are deserialized.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{split_header, PersistError, VersionTag};

/// One step of a save-format upgrade.
pub trait Migrator: Send + Sync {
    /// The version this step reads.
    fn source_version(&self) -> VersionTag;

    /// The version this step produces.
    fn target_version(&self) -> VersionTag;

    /// Rewrites a payload from the source to the target layout.
    ///
    /// # Errors
    ///
    /// Returns `MigrationFailed` if the payload doesn't match the source layout.
    fn migrate(&self, payload: Value) -> Result<Value, PersistError>;
}

/// A type that is persisted with a version header.
pub trait Versioned: Serialize + DeserializeOwned {
    /// The version written by the current build.
    const CURRENT_VERSION: VersionTag;

    /// Upgrade steps from older versions. Empty by default.
    #[must_use]
    fn migrators() -> Vec<Box<dyn Migrator>> {
        Vec::new()
    }
}

/// Serializes a value with its version header.
///
/// # Errors
///
/// Returns `Serialization` if the value can't be written as JSON.
pub fn encode<T: Versioned>(value: &T, pretty: bool) -> Result<String, PersistError> {
    let body = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(format!("{}\n{body}", T::CURRENT_VERSION.header()))
}

/// Parses a versioned payload, migrating it forward when needed.
///
/// Migrators run in order of source version. Each one applies only when its
/// source matches the payload's version at that point, then the payload's
/// version advances to the migrator's target.
///
/// # Errors
///
/// - `InvalidVersion` if the header is malformed
/// - `UnsupportedVersion` if the payload is newer than this build
/// - `MissingMigration` if no chain reaches the current version
/// - `MigrationFailed` / `Serialization` if a step or the final parse fails
pub fn decode<T: Versioned>(text: &str) -> Result<T, PersistError> {
    let (mut version, body) = split_header(text)?;
    let current = T::CURRENT_VERSION;

    if version > current {
        return Err(PersistError::UnsupportedVersion {
            found: version,
            current,
        });
    }

    let mut payload: Value = serde_json::from_str(body)?;

    if version < current {
        let mut migrators = T::migrators();
        migrators.sort_by_key(|m| m.source_version());

        for migrator in &migrators {
            if migrator.source_version() != version {
                continue;
            }
            let target = migrator.target_version();
            debug!("Migrating save payload {} -> {}", version, target);
            payload = migrator.migrate(payload)?;
            version = target;
        }

        if version != current {
            return Err(PersistError::MissingMigration {
                from: version,
                to: current,
            });
        }
        info!("Save payload migrated to {}", current);
    }

    Ok(serde_json::from_value(payload)?)
}
