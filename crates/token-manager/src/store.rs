//! Durable key-value store contract and file-backed implementation
//!
//! The credential cache depends only on the `DurableStore` trait: an async
//! read/write/remove surface plus a change-notification channel that fires
//! for every mutation, including ones issued by other holders of the same
//! store. `FileStore` is the shipped implementation: a JSON file of
//! key → value, written atomically (temp file + rename) with 0600
//! permissions, writers serialized by a tokio Mutex.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Delivered to subscribers for every successful write or remove.
///
/// `value` is the new value, or `None` when the key was removed. Receivers
/// are expected to apply the event verbatim rather than re-reading storage.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub key: String,
    pub value: Option<serde_json::Value>,
}

/// Asynchronous durable key-value store with change notification.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn DurableStore>`).
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn read<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>>> + Send + 'a>>;

    /// Write `value` under `key`, replacing any previous value.
    fn write<'a>(
        &'a self,
        key: &'a str,
        value: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Remove the entry under `key`. Removing an absent key is not an error.
    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Subscribe to change events for all keys.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Capacity of the change-notification channel. A lagged receiver re-syncs
/// from the next event; see the cache's listener task.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// File-backed durable store.
///
/// The Mutex serializes all mutations; reads acquire the lock briefly to
/// clone the requested value, so readers don't block on in-flight writes.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, serde_json::Value>>,
    events: broadcast::Sender<StoreEvent>,
}

impl FileStore {
    /// Load the store from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` so future loads don't
    /// need the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Storage(format!("reading store file: {e}")))?;
            let entries: HashMap<String, serde_json::Value> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing store file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded durable store");
            entries
        } else {
            info!(path = %path.display(), "store file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            state: Mutex::new(state),
            events,
        })
    }

    fn publish(&self, key: &str, value: Option<serde_json::Value>) {
        // Send fails only when there are no subscribers, which is fine.
        let _ = self.events.send(StoreEvent {
            key: key.to_owned(),
            value,
        });
    }
}

impl DurableStore for FileStore {
    fn read<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.get(key).cloned())
        })
    }

    fn write<'a>(
        &'a self,
        key: &'a str,
        value: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(key.to_owned(), value.clone());
            write_atomic(&self.path, &state).await?;
            debug!(key, "store entry written");
            // Published under the lock so subscribers see events in write order
            self.publish(key, Some(value));
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(key).is_some() {
                write_atomic(&self.path, &state).await?;
                debug!(key, "store entry removed");
                self.publish(key, None);
            }
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Write store contents to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains token material.
async fn write_atomic(path: &Path, data: &HashMap<String, serde_json::Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("store path has no parent directory".into()))?;

    // Temp name carries the target filename so two stores sharing a
    // directory never race on the same temp file.
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Storage("store path has no file name".into()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp store file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting store file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp store file: {e}")))?;

    Ok(())
}
