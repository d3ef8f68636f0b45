use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{DocBody, Document};
use crate::ids;
use crate::store::RecordStore;
use crate::RoomResult;

/// Ordered index plus the sequence counter for one room.
struct LogState {
    /// Every published document, ascending by `seq`.
    docs: Vec<Document>,
    /// Highest sequence number ever assigned. Consumed even when the
    /// corresponding persist fails: a gap, never a duplicate.
    seq: u64,
}

/// The append-only document log of a single room.
///
/// Appends are serialized per room by the write half of the state lock, so
/// two concurrent appends to the same room can never observe or assign the
/// same sequence number. Readers take the read half and always see a clean
/// prefix of the log. Rooms are independent: two logs never share a lock.
pub struct RoomLog {
    room_id: String,
    store: Arc<RecordStore>,
    state: RwLock<LogState>,
}

/// Result of an incremental catch-up read.
#[derive(Debug, Clone, PartialEq)]
pub struct Updates {
    /// The room's current tail, even when `updates` is empty.
    pub last_seq: u64,
    /// Documents newer than the requested watermark, ascending by `seq`.
    pub updates: Vec<Document>,
}

impl RoomLog {
    /// Open a room's log, rebuilding it from the record store.
    ///
    /// Scans the room's key range, orders by sequence, and resumes the
    /// counter at the highest persisted sequence. A room with no stored
    /// documents yields an empty log with the counter at zero.
    pub(crate) fn open(room_id: String, store: Arc<RecordStore>) -> Self {
        let prefix = format!("{room_id}_");
        let head_key = format!("{room_id}_head");

        let mut docs: Vec<Document> = store
            .scan_prefix(&prefix)
            .into_iter()
            .filter(|(key, _)| key != &head_key)
            .filter_map(|(key, value)| match serde_json::from_value(value) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!("skipping undecodable document {}: {}", key, e);
                    None
                }
            })
            .collect();
        docs.sort_by_key(|doc: &Document| doc.seq);
        let seq = docs.last().map(|doc| doc.seq).unwrap_or(0);

        debug!(
            "opened room log {} ({} documents, seq {})",
            room_id,
            docs.len(),
            seq
        );
        RoomLog {
            room_id,
            store,
            state: RwLock::new(LogState { docs, seq }),
        }
    }

    /// The room this log belongs to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Append a document, assigning it the room's next sequence number.
    ///
    /// The sequence is consumed even if persistence fails afterwards; a
    /// failed append leaves a gap, never a duplicate, and the document is
    /// not published to readers. The returned record is re-read from the
    /// store, so callers observe exactly what the durability layer accepted.
    pub async fn append(
        &self,
        body: DocBody,
        author_id: &str,
        source: IpAddr,
    ) -> RoomResult<Document> {
        let mut state = self.state.write().await;

        state.seq += 1;
        let doc = Document {
            seq: state.seq,
            room_id: self.room_id.clone(),
            collection: body.collection(),
            ip: source,
            id: ids::new_doc_id(),
            revision: 0,
            timestamp: Utc::now(),
            author_id: author_id.to_string(),
            body,
        };

        let key = doc.key();
        self.store.put(&key, &doc).await?;
        let stored: Document = self.store.get(&key).await?;
        state.docs.push(stored.clone());

        info!(
            "appended {} seq {} to room {}",
            stored.collection, stored.seq, self.room_id
        );
        Ok(stored)
    }

    /// Every document in the room, ascending by sequence.
    pub async fn snapshot(&self) -> Vec<Document> {
        self.state.read().await.docs.clone()
    }

    /// Documents with sequence greater than `since`, ascending, plus the
    /// room's current tail (so a poller can advance its watermark even when
    /// nothing new arrived).
    pub async fn updates_since(&self, since: u64) -> Updates {
        let state = self.state.read().await;
        let start = state.docs.partition_point(|doc| doc.seq <= since);
        Updates {
            last_seq: state.seq,
            updates: state.docs[start..].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CharaBody, MessageBody, MessageKind};
    use tempfile::tempdir;

    fn source() -> IpAddr {
        IpAddr::from([127, 0, 0, 1])
    }

    fn message(content: &str) -> DocBody {
        DocBody::Message(MessageBody {
            kind: MessageKind::Narrator,
            content: content.to_string(),
            chara_id: None,
        })
    }

    fn chara(name: &str) -> DocBody {
        DocBody::Chara(CharaBody {
            name: name.to_string(),
            color: "#336699".to_string(),
            description: None,
        })
    }

    async fn open_log(dir: &std::path::Path, room_id: &str) -> RoomLog {
        let store = Arc::new(RecordStore::open(dir).await.unwrap());
        RoomLog::open(room_id.to_string(), store)
    }

    #[tokio::test]
    async fn sequences_start_at_one_and_increment() {
        let dir = tempdir().unwrap();
        let log = open_log(dir.path(), "rp_seq").await;

        let first = log.append(message("a"), "tester", source()).await.unwrap();
        let second = log.append(message("b"), "tester", source()).await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn concurrent_appends_assign_dense_sequences() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
        let log = Arc::new(RoomLog::open("rp_dense".to_string(), store));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32u32 {
            let log = log.clone();
            tasks.spawn(async move {
                log.append(message(&format!("m{i}")), "tester", source())
                    .await
                    .unwrap()
                    .seq
            });
        }

        let mut seqs = Vec::new();
        while let Some(result) = tasks.join_next().await {
            seqs.push(result.unwrap());
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=32).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn snapshots_are_clean_prefixes() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
        let log = Arc::new(RoomLog::open("rp_prefix".to_string(), store));

        let writer = {
            let log = log.clone();
            tokio::spawn(async move {
                for i in 0..20u32 {
                    log.append(message(&format!("m{i}")), "tester", source())
                        .await
                        .unwrap();
                }
            })
        };

        // Readers racing the writer must always see {1..K}, never a hole.
        for _ in 0..50 {
            let snap = log.snapshot().await;
            for (i, doc) in snap.iter().enumerate() {
                assert_eq!(doc.seq, i as u64 + 1);
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let snap = log.snapshot().await;
        assert_eq!(snap.len(), 20);
    }

    #[tokio::test]
    async fn updates_since_returns_the_open_range() {
        let dir = tempdir().unwrap();
        let log = open_log(dir.path(), "rp_upd").await;

        log.append(message("one"), "tester", source()).await.unwrap();
        log.append(chara("Ada"), "tester", source()).await.unwrap();
        log.append(message("three"), "tester", source()).await.unwrap();

        let updates = log.updates_since(1).await;
        assert_eq!(updates.last_seq, 3);
        assert_eq!(
            updates.updates.iter().map(|d| d.seq).collect::<Vec<_>>(),
            vec![2, 3]
        );

        // caught-up poller: empty updates, watermark confirmed
        let tail = log.updates_since(3).await;
        assert_eq!(tail.last_seq, 3);
        assert!(tail.updates.is_empty());

        let all = log.updates_since(0).await;
        assert_eq!(all.updates.len(), 3);
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let dir = tempdir().unwrap();
        let log = open_log(dir.path(), "rp_idem").await;

        log.append(message("only"), "tester", source()).await.unwrap();
        let first = log.snapshot().await;
        let second = log.snapshot().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn appended_document_round_trips_through_the_store() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
        let log = RoomLog::open("rp_rt".to_string(), store.clone());

        let body = DocBody::Message(MessageBody {
            kind: MessageKind::Chara,
            content: "hello there".to_string(),
            chara_id: Some("c42".to_string()),
        });
        let doc = log.append(body.clone(), "tester", source()).await.unwrap();

        let fetched: Document = store.get(&doc.key()).await.unwrap();
        assert_eq!(fetched.body, body);
        assert_eq!(fetched, doc);
    }

    #[tokio::test]
    async fn log_recovers_from_the_store_after_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
            let log = RoomLog::open("rp_rec".to_string(), store);
            log.append(message("persisted"), "tester", source())
                .await
                .unwrap();
            log.append(chara("Bob"), "tester", source()).await.unwrap();
        }

        let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
        let log = RoomLog::open("rp_rec".to_string(), store);

        let snap = log.snapshot().await;
        assert_eq!(snap.iter().map(|d| d.seq).collect::<Vec<_>>(), vec![1, 2]);

        // the counter resumes past the recovered tail
        let next = log.append(message("more"), "tester", source()).await.unwrap();
        assert_eq!(next.seq, 3);
    }

    #[tokio::test]
    async fn recovery_ignores_the_head_record() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path()).await.unwrap());
        store
            .put(
                "rp_h_head",
                &serde_json::json!({"title": "The Inn at the Crossroads"}),
            )
            .await
            .unwrap();

        let log = RoomLog::open("rp_h".to_string(), store);
        assert!(log.snapshot().await.is_empty());
    }
}
