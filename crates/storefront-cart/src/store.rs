//! # Durable Client Store
//!
//! Key/value persistence for the cart identifier.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Durable Store                                        │
//! │                                                                         │
//! │  KeyValueStore (trait, local-storage semantics)                        │
//! │  ├── MemoryStore   - process lifetime (tests, embedded use)            │
//! │  └── FileStore     - <storage dir>/storage.json, survives restarts     │
//! │                                                                         │
//! │  CartIdSlot = store + ONE fixed key                                    │
//! │    load()  → Option<CartIdentifier>                                    │
//! │    save()  → overwrite (last write wins)                               │
//! │    clear() → purge on expiry                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One storage directory corresponds to one origin; two storefronts never
//! share a directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use storefront_core::CartIdentifier;

use crate::error::{StorageError, StorageResult};

/// Name of the JSON file a [`FileStore`] keeps inside its directory.
pub const STORAGE_FILE_NAME: &str = "storage.json";

// =============================================================================
// Store Trait
// =============================================================================

/// Synchronous string key/value store.
pub trait KeyValueStore: Send + Sync {
    /// Reads a key.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes a key, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes a key. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map still holds consistent strings.
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items().remove(key);
        Ok(())
    }
}

// =============================================================================
// File Store
// =============================================================================

/// Store backed by a single JSON map file.
///
/// Every call re-reads the file, so several processes pointed at the same
/// directory observe each other's writes (last write wins).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (without creating) the store in `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        FileStore {
            path: dir.as_ref().join(STORAGE_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the store in the platform data directory.
    pub fn in_default_location() -> StorageResult<Self> {
        directories::ProjectDirs::from("com", "storefront", "storefront")
            .map(|dirs| FileStore::new(dirs.data_dir()))
            .ok_or(StorageError::NoLocation)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StorageResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

// =============================================================================
// Cart Identifier Slot
// =============================================================================

/// The single persisted cart identifier.
///
/// ## Failure Policy
/// Storage faults are logged and never fail a cart operation: an unreadable
/// slot reads as "no cart yet", an unwritable one leaves the identifier
/// unpersisted (the next session starts a fresh cart).
#[derive(Clone)]
pub struct CartIdSlot {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl CartIdSlot {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        CartIdSlot {
            store,
            key: key.into(),
        }
    }

    /// Key this slot occupies.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the persisted identifier.
    pub fn load(&self) -> Option<CartIdentifier> {
        match self.store.get_item(&self.key) {
            Ok(Some(raw)) => match CartIdentifier::new(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(key = %self.key, "Ignoring empty persisted cart id");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read persisted cart id");
                None
            }
        }
    }

    /// Persists an identifier, replacing any previous one.
    pub fn save(&self, id: &CartIdentifier) {
        debug!(key = %self.key, cart_id = %id, "Persisting cart id");
        if let Err(e) = self.store.set_item(&self.key, id.as_str()) {
            warn!(key = %self.key, cart_id = %id, error = %e, "Failed to persist cart id");
        }
    }

    /// Forgets the persisted identifier.
    pub fn clear(&self) {
        debug!(key = %self.key, "Clearing persisted cart id");
        if let Err(e) = self.store.remove_item(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to clear persisted cart id");
        }
    }
}

impl std::fmt::Debug for CartIdSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartIdSlot").field("key", &self.key).finish()
    }
}
