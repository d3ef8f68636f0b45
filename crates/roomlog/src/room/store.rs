use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;

use super::log::{RoomLog, Updates};
use crate::document::{DocBody, Document};
use crate::store::RecordStore;
use crate::RoomResult;

/// Thread-safe map of resident room logs.
///
/// Logs are opened on demand: recovered from the record store on first
/// access, empty for rooms that have never stored a document. Operations on
/// different rooms proceed fully in parallel; there is no lock shared
/// across rooms.
pub struct RoomStore {
    store: Arc<RecordStore>,
    rooms: DashMap<String, Arc<RoomLog>>,
}

impl RoomStore {
    pub fn new(store: Arc<RecordStore>) -> Self {
        RoomStore {
            store,
            rooms: DashMap::new(),
        }
    }

    /// Handle for the given room, opening its log if it is not resident.
    pub fn open(&self, room_id: &str) -> RoomHandle {
        let log = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!("opening room log {}", room_id);
                Arc::new(RoomLog::open(room_id.to_string(), self.store.clone()))
            })
            .clone();
        RoomHandle::new(log)
    }

    /// Number of logs currently resident in memory.
    pub fn resident_count(&self) -> usize {
        self.rooms.len()
    }
}

/// A cloneable handle to a room's log.
#[derive(Clone)]
pub struct RoomHandle {
    inner: Arc<RoomLog>,
}

impl RoomHandle {
    fn new(inner: Arc<RoomLog>) -> Self {
        RoomHandle { inner }
    }

    /// The room this handle points at.
    pub fn room_id(&self) -> &str {
        self.inner.room_id()
    }

    /// Append a document to the room's log.
    pub async fn append(
        &self,
        body: DocBody,
        author_id: &str,
        source: IpAddr,
    ) -> RoomResult<Document> {
        self.inner.append(body, author_id, source).await
    }

    /// Every document in the room, ascending by sequence.
    pub async fn snapshot(&self) -> Vec<Document> {
        self.inner.snapshot().await
    }

    /// Documents newer than `since`, plus the room's current tail.
    pub async fn updates_since(&self, since: u64) -> Updates {
        self.inner.updates_since(since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MessageBody, MessageKind};
    use tempfile::tempdir;

    fn message(content: &str) -> DocBody {
        DocBody::Message(MessageBody {
            kind: MessageKind::Narrator,
            content: content.to_string(),
            chara_id: None,
        })
    }

    #[tokio::test]
    async fn open_is_idempotent_per_room() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
        let rooms = RoomStore::new(store);

        let a = rooms.open("rp_1");
        let b = rooms.open("rp_1");
        assert_eq!(rooms.resident_count(), 1);

        a.append(message("from a"), "tester", IpAddr::from([127, 0, 0, 1]))
            .await
            .unwrap();
        // both handles see the same log
        assert_eq!(b.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn rooms_are_independent() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
        let rooms = RoomStore::new(store);

        let first = rooms.open("rp_1");
        let second = rooms.open("rp_2");

        first
            .append(message("one"), "tester", IpAddr::from([127, 0, 0, 1]))
            .await
            .unwrap();

        // each room numbers its own log from 1
        let doc = second
            .append(message("two"), "tester", IpAddr::from([127, 0, 0, 1]))
            .await
            .unwrap();
        assert_eq!(doc.seq, 1);
        assert_eq!(rooms.resident_count(), 2);
    }
}
