//! Key/value stores for versioned payloads.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{info, warn};

use super::{decode, encode, PersistError, Versioned};

/// Backend that holds one text payload per key.
pub trait SaveStore {
    /// Reads a payload. `Ok(None)` means the key has never been written.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `InvalidKey` on backend failure.
    fn read(&self, key: &str) -> Result<Option<String>, PersistError>;

    /// Writes a payload, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `InvalidKey` on backend failure.
    fn write(&self, key: &str, payload: &str) -> Result<(), PersistError>;

    /// Returns true if the key has a payload.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `InvalidKey` on backend failure.
    fn exists(&self, key: &str) -> Result<bool, PersistError>;

    /// Deletes a payload. Returns true if something was removed.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `InvalidKey` on backend failure.
    fn delete(&self, key: &str) -> Result<bool, PersistError>;

    /// Whether payloads should be pretty-printed.
    fn pretty(&self) -> bool {
        false
    }
}

/// Serializes `value` and writes it under `key`.
///
/// # Errors
///
/// Propagates encoding and backend errors.
pub fn save<T, S>(store: &S, key: &str, value: &T) -> Result<(), PersistError>
where
    T: Versioned,
    S: SaveStore + ?Sized,
{
    let text = encode(value, store.pretty())?;
    store.write(key, &text)
}

/// Reads and decodes the payload under `key`.
///
/// A key that was never written yields `T::default()`.
///
/// # Errors
///
/// Propagates backend, version and decoding errors. A corrupt payload is an
/// error, not a silent reset.
pub fn load<T, S>(store: &S, key: &str) -> Result<T, PersistError>
where
    T: Versioned + Default,
    S: SaveStore + ?Sized,
{
    match store.read(key)? {
        Some(text) => decode(&text),
        None => {
            warn!("No saved data under '{}', starting fresh", key);
            Ok(T::default())
        }
    }
}

/// Saves each key to `<root>/<key>.json`.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    pretty: bool,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pretty: false,
        }
    }

    /// Enables pretty-printed JSON bodies.
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a key is stored at.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for empty keys or keys containing path separators.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, PersistError> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(PersistError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    fn io_error(key: &str, source: io::Error) -> PersistError {
        PersistError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl SaveStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn write(&self, key: &str, payload: &str) -> Result<(), PersistError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|e| Self::io_error(key, e))?;
        fs::write(&path, payload).map_err(|e| Self::io_error(key, e))?;
        info!("Saved '{}' to {}", key, path.display());
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, PersistError> {
        Ok(self.path_for(key)?.is_file())
    }

    fn delete(&self, key: &str) -> Result<bool, PersistError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    fn pretty(&self) -> bool {
        self.pretty
    }
}

/// In-process store, mostly for tests and tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SaveStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, payload: &str) -> Result<(), PersistError> {
        self.entries
            .lock()
            .insert(key.to_string(), payload.to_string());
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, PersistError> {
        Ok(self.entries.lock().contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<bool, PersistError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::VersionTag;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Wallet {
        coins: u32,
    }

    impl Versioned for Wallet {
        const CURRENT_VERSION: VersionTag = VersionTag::new(1, 0, 0);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        save(&store, "wallet", &Wallet { coins: 12 }).unwrap();

        assert!(store.exists("wallet").unwrap());
        let loaded: Wallet = load(&store, "wallet").unwrap();
        assert_eq!(loaded.coins, 12);

        assert!(store.delete("wallet").unwrap());
        assert!(!store.delete("wallet").unwrap());
    }

    #[test]
    fn test_missing_key_loads_default() {
        let store = MemoryStore::new();
        let loaded: Wallet = load(&store, "nothing").unwrap();
        assert_eq!(loaded, Wallet::default());
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        let store = MemoryStore::new();
        store.write("wallet", "Version: 1.0.0\n{not json").unwrap();
        assert!(load::<Wallet, _>(&store, "wallet").is_err());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("save_data")).with_pretty(true);

        assert!(store.read("wallet").unwrap().is_none());
        save(&store, "wallet", &Wallet { coins: 3 }).unwrap();

        let path = store.path_for("wallet").unwrap();
        assert!(path.ends_with("save_data/wallet.json"));
        let raw = std::fs::read_to_string(path).unwrap();
        assert!(raw.starts_with("Version: 1.0.0\n"));

        let loaded: Wallet = load(&store, "wallet").unwrap();
        assert_eq!(loaded.coins, 3);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let store = FileStore::new("unused");
        assert!(matches!(
            store.path_for("../escape"),
            Err(PersistError::InvalidKey(_))
        ));
        assert!(store.path_for("").is_err());
    }
}
