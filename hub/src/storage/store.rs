//! Versioned key-value store
//!
//! Every persisted value lives under a [`StoreKey`] and is wrapped in an
//! envelope carrying [`SCHEMA_VERSION`]. A value that cannot be decoded, or
//! was written under another schema version, is logged, removed and read
//! back as absent.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::HubError;
use crate::filesys::dir::Dir;

/// Schema version written into every envelope
pub const SCHEMA_VERSION: u32 = 1;

/// The closed set of persisted keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Devices,
    Rooms,
    Suggestions,
    CurrentUser,
    CurrentMember,
    AccessToken,
    TokenType,
    PagesPreloaded,
}

impl StoreKey {
    pub const ALL: [StoreKey; 8] = [
        StoreKey::Devices,
        StoreKey::Rooms,
        StoreKey::Suggestions,
        StoreKey::CurrentUser,
        StoreKey::CurrentMember,
        StoreKey::AccessToken,
        StoreKey::TokenType,
        StoreKey::PagesPreloaded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Devices => "devices",
            StoreKey::Rooms => "rooms",
            StoreKey::Suggestions => "suggestions",
            StoreKey::CurrentUser => "currentUser",
            StoreKey::CurrentMember => "currentMember",
            StoreKey::AccessToken => "access_token",
            StoreKey::TokenType => "token_type",
            StoreKey::PagesPreloaded => "pagesPreloaded",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw string storage backend
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the raw value for `key`; `None` when absent
    async fn get_raw(&self, key: StoreKey) -> Result<Option<String>, HubError>;

    /// Replace the raw value for `key`
    async fn put_raw(&self, key: StoreKey, value: String) -> Result<(), HubError>;

    /// Remove `key`; removing an absent key is not an error
    async fn remove(&self, key: StoreKey) -> Result<(), HubError>;
}

/// One JSON file per key inside a directory
pub struct FileStore {
    dir: Dir,
}

impl FileStore {
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    fn file(&self, key: StoreKey) -> crate::filesys::file::File {
        self.dir.file(&format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get_raw(&self, key: StoreKey) -> Result<Option<String>, HubError> {
        self.file(key).read_string_opt().await
    }

    async fn put_raw(&self, key: StoreKey, value: String) -> Result<(), HubError> {
        self.file(key).write_atomic(value.as_bytes()).await
    }

    async fn remove(&self, key: StoreKey) -> Result<(), HubError> {
        self.file(key).delete().await
    }
}

/// Process-local store, used for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_raw(&self, key: StoreKey) -> Result<Option<String>, HubError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(&key).cloned())
    }

    async fn put_raw(&self, key: StoreKey, value: String) -> Result<(), HubError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: StoreKey) -> Result<(), HubError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&key);
        Ok(())
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Typed access to a [`KvStore`] with a single serialized writer
pub struct Store {
    backend: Arc<dyn KvStore>,
    writer: Mutex<()>,
}

impl Store {
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self {
            backend,
            writer: Mutex::new(()),
        }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Read and decode `key`.
    ///
    /// Corrupt or foreign-version values are cleared and reported as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>, HubError> {
        let Some(raw) = self.backend.get_raw(key).await? else {
            return Ok(None);
        };
        if let Ok(value) = decode::<T>(&raw) {
            return Ok(Some(value));
        }

        // a writer may have replaced the value since it was read
        let _guard = self.writer.lock().await;
        self.get_unlocked(key).await
    }

    /// Read `key` while already holding the writer lock
    async fn get_unlocked<T: DeserializeOwned>(
        &self,
        key: StoreKey,
    ) -> Result<Option<T>, HubError> {
        let Some(raw) = self.backend.get_raw(key).await? else {
            return Ok(None);
        };

        match decode::<T>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(reason) => {
                warn!(key = %key, "Clearing malformed stored value: {}", reason);
                self.backend.remove(key).await?;
                Ok(None)
            }
        }
    }

    /// Read `key`, substituting `T::default()` when absent
    pub async fn get_or_default<T: DeserializeOwned + Default>(
        &self,
        key: StoreKey,
    ) -> Result<T, HubError> {
        Ok(self.get(key).await?.unwrap_or_default())
    }

    /// Encode and write `value` under `key`
    pub async fn put<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<(), HubError> {
        let _guard = self.writer.lock().await;
        self.put_unlocked(key, value).await
    }

    pub async fn remove(&self, key: StoreKey) -> Result<(), HubError> {
        let _guard = self.writer.lock().await;
        debug!(key = %key, "Removing stored value");
        self.backend.remove(key).await
    }

    /// Read-modify-write `key` without interleaving another writer.
    ///
    /// The value is only written back when `f` succeeds.
    pub async fn update<T, R, F>(&self, key: StoreKey, f: F) -> Result<R, HubError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> Result<R, HubError>,
    {
        let _guard = self.writer.lock().await;
        let mut value: T = self.get_unlocked(key).await?.unwrap_or_default();
        let result = f(&mut value)?;
        self.put_unlocked(key, &value).await?;
        Ok(result)
    }

    async fn put_unlocked<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<(), HubError> {
        let raw = serde_json::to_string(&EnvelopeRef {
            version: SCHEMA_VERSION,
            data: value,
        })?;
        self.backend.put_raw(key, raw).await
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| format!("not a store envelope: {}", e))?;
    if envelope.version != SCHEMA_VERSION {
        return Err(format!(
            "schema version {} (expected {})",
            envelope.version, SCHEMA_VERSION
        ));
    }
    serde_json::from_value(envelope.data).map_err(|e| e.to_string())
}
