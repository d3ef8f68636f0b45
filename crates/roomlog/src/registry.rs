use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::store::RecordStore;
use crate::{RoomError, RoomResult};

/// Key prefix for slug entries. No other key class may begin with this.
const SLUG_PREFIX: &str = "slug_";

/// A slug's registry record: the room it resolves to plus creation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugEntry {
    #[serde(rename = "rpid")]
    pub room_id: String,
    pub created_at: DateTime<Utc>,
}

/// One-time-written mapping from public slug to internal room id.
pub struct RoomRegistry {
    store: Arc<RecordStore>,
}

impl RoomRegistry {
    pub fn new(store: Arc<RecordStore>) -> Self {
        RoomRegistry { store }
    }

    /// Register `slug` as resolving to `room_id`.
    ///
    /// A slug is written exactly once; registering it again is a conflict,
    /// even from concurrent callers.
    pub async fn register(&self, slug: &str, room_id: &str) -> RoomResult<()> {
        let entry = SlugEntry {
            room_id: room_id.to_string(),
            created_at: Utc::now(),
        };
        let key = format!("{SLUG_PREFIX}{slug}");
        if !self.store.put_new(&key, &entry).await? {
            return Err(RoomError::conflict(slug));
        }
        info!("registered slug {} -> {}", slug, room_id);
        Ok(())
    }

    /// Resolve `slug` to its room id.
    pub async fn resolve(&self, slug: &str) -> RoomResult<String> {
        let key = format!("{SLUG_PREFIX}{slug}");
        match self.store.get::<SlugEntry>(&key).await {
            Ok(entry) => Ok(entry.room_id),
            // report the slug, not the prefixed storage key
            Err(RoomError::NotFound { .. }) => Err(RoomError::not_found(slug)),
            Err(e) => Err(e),
        }
    }
}
