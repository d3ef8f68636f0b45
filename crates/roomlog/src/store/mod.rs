use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{RoomError, RoomResult};

/// Durable keyed record store.
///
/// One JSON file per key under the data directory, fronted by an in-memory
/// cache. A successful [`put`](RecordStore::put) has been fsynced and
/// atomically renamed into place before it returns, so it survives a
/// process restart; a [`get`](RecordStore::get) never observes a
/// half-written record.
///
/// Keys are opaque to the store (callers choose them and the store does no
/// key parsing) but they must be valid file names.
pub struct RecordStore {
    dir: PathBuf,
    cache: DashMap<String, JsonValue>,
}

impl RecordStore {
    /// Open a store rooted at `dir`, creating the directory if needed and
    /// loading every record a previous process left behind.
    pub async fn open(dir: impl Into<PathBuf>) -> RoomResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let cache = DashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // stray .tmp files from an interrupted put are not records
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    cache.insert(key.to_string(), value);
                }
                Err(e) => warn!("skipping unreadable record {:?}: {}", path, e),
            }
        }

        info!("record store opened at {:?} ({} records)", dir, cache.len());
        Ok(RecordStore { dir, cache })
    }

    /// Durably write a record under `key`, replacing any previous value.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> RoomResult<()> {
        let json = serde_json::to_value(value).map_err(RoomError::store_serde)?;
        self.write_record(key, &json).await?;
        self.cache.insert(key.to_string(), json);
        debug!("put record {}", key);
        Ok(())
    }

    /// Durably write a record under `key` only if the key is unused.
    ///
    /// Returns `false` (and writes nothing durable) when the key already
    /// exists. The key is reserved in the cache before the write so two
    /// concurrent writers cannot both win it.
    pub async fn put_new<T: Serialize>(&self, key: &str, value: &T) -> RoomResult<bool> {
        let json = serde_json::to_value(value).map_err(RoomError::store_serde)?;
        match self.cache.entry(key.to_string()) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(json.clone());
            }
        }
        if let Err(e) = self.write_record(key, &json).await {
            self.cache.remove(key);
            return Err(e);
        }
        debug!("put new record {}", key);
        Ok(true)
    }

    /// Fetch the record under `key`, deserialized as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> RoomResult<T> {
        let value = match self.cache.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Err(RoomError::not_found(key)),
        };
        serde_json::from_value(value).map_err(RoomError::store_serde)
    }

    /// Whether a record exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// All records whose key starts with `prefix`, in no particular order.
    ///
    /// The prefix is supplied by the caller; the store itself attaches no
    /// meaning to key shapes.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, JsonValue)> {
        self.cache
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of records in the store.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Final durability pass: fsync the data directory so the renames from
    /// earlier puts are themselves on disk.
    pub async fn close(&self) -> RoomResult<()> {
        let file = tokio::fs::File::open(&self.dir).await?;
        file.sync_all().await?;
        info!("record store closed at {:?}", self.dir);
        Ok(())
    }

    /// Returns the path to the data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write_record(&self, key: &str, json: &JsonValue) -> RoomResult<()> {
        let path = self.record_path(key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(json).map_err(RoomError::store_serde)?;

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_data().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}
