//! Key-value storage for per-entity durable cells.
//!
//! Values are opaque strings. A TTL, when given, makes the entry invisible
//! once it has elapsed; absence of a TTL persists indefinitely.

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;

/// Trait for key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Gets a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores a value, replacing any previous one.
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>)
    -> Result<(), StorageError>;

    /// Lists all live entries whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError>;

    /// Deletes a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

fn expiry(ttl: Option<Duration>) -> Result<Option<DateTime<Utc>>, StorageError> {
    ttl.map(|ttl| {
        chrono::Duration::from_std(ttl)
            .map(|ttl| Utc::now() + ttl)
            .map_err(|e| StorageError::Backend {
                reason: format!("invalid ttl: {e}"),
            })
    })
    .transpose()
}

fn is_live(expires_at: Option<DateTime<Utc>>) -> bool {
    expires_at.is_none_or(|at| at > Utc::now())
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, MemoryEntry>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| is_live(entry.expires_at))
            .map(|entry| entry.value.clone()))
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let expires_at = expiry(ttl)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, entry)| is_live(entry.expires_at))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// On-disk envelope for one key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    value: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    expires_at: Option<DateTime<Utc>>,
}

const ENTRY_SUFFIX: &str = ".json";

/// File-per-key storage backend rooted at a directory.
///
/// Keys are percent-encoded into file names. Writes go to a temporary file
/// that is renamed over the target.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::Backend {
                reason: format!("create {}: {e}", root.display()),
            })?;
        Ok(Self { root })
    }

    /// The directory holding the entries.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{ENTRY_SUFFIX}", encode_key(key)))
    }

    async fn read_envelope(path: &Path) -> Result<Option<Envelope>, StorageError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Backend {
                    reason: format!("read {}: {e}", path.display()),
                });
            }
        };
        let envelope: Envelope =
            serde_json::from_str(&raw).map_err(|e| StorageError::Serialization {
                reason: format!("{}: {e}", path.display()),
            })?;
        Ok(is_live(envelope.expires_at).then_some(envelope))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(Self::read_envelope(&self.path_for(key))
            .await?
            .map(|envelope| envelope.value))
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let envelope = Envelope {
            value,
            expires_at: expiry(ttl)?,
        };
        let raw = serde_json::to_string(&envelope).map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })?;

        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| StorageError::Backend {
                reason: format!("write {}: {e}", tmp.display()),
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::Backend {
                reason: format!("rename {}: {e}", path.display()),
            })?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::Backend {
                reason: format!("list {}: {e}", self.root.display()),
            })?;

        let mut found = BTreeMap::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| StorageError::Backend {
            reason: e.to_string(),
        })? {
            let file_name = entry.file_name();
            let Some(key) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(ENTRY_SUFFIX))
                .and_then(decode_key)
            else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(envelope) = Self::read_envelope(&entry.path()).await? {
                found.insert(key, envelope.value);
            }
        }
        Ok(found.into_iter().collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Backend {
                reason: format!("delete {key}: {e}"),
            }),
        }
    }
}

/// Bytes escaped in file names: everything except ASCII alphanumerics, `-` and `_`.
const KEY_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ESCAPES).to_string()
}

fn decode_key(name: &str) -> Option<String> {
    percent_decode_str(name)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}
