use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::document::{Collection, DocBody, Document, PublicDocument};
use crate::ids;
use crate::registry::RoomRegistry;
use crate::room::RoomStore;
use crate::store::RecordStore;
use crate::{RoomError, RoomResult};

/// Author identity recorded on every document while authentication is
/// stubbed out.
pub const PLACEHOLDER_AUTHOR: &str = "nobody09c39024f1ef";

/// How many slug candidates room creation tries before giving up.
const SLUG_ATTEMPTS: usize = 10;

/// Room metadata, set once at creation and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomHeader {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Identity of a newly created room.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRoom {
    pub slug: String,
    pub room_id: String,
}

/// Full current state of a room, partitioned by collection.
#[derive(Debug, Clone, Serialize)]
pub struct RoomState {
    #[serde(flatten)]
    pub header: RoomHeader,
    pub msgs: Vec<PublicDocument>,
    pub charas: Vec<PublicDocument>,
    #[serde(rename = "lastSeq")]
    pub last_seq: u64,
}

/// Incremental catch-up response for a polling client.
#[derive(Debug, Clone, Serialize)]
pub struct RoomUpdates {
    #[serde(rename = "lastSeq")]
    pub last_seq: u64,
    pub updates: Vec<PublicDocument>,
}

/// Orchestrates the slug registry and the per-room logs.
///
/// This is the entry point embedding callers (and the HTTP adapter) work
/// against: create a room, append a document through its slug, read a full
/// snapshot, or catch up from a watermark.
pub struct RoomService {
    store: Arc<RecordStore>,
    registry: RoomRegistry,
    rooms: RoomStore,
}

impl RoomService {
    /// Open a service rooted at the given data directory.
    pub async fn open(dir: impl Into<PathBuf>) -> RoomResult<Self> {
        let store = Arc::new(RecordStore::open(dir).await?);
        Ok(Self::with_store(store))
    }

    /// Build a service over an already open record store.
    pub fn with_store(store: Arc<RecordStore>) -> Self {
        RoomService {
            registry: RoomRegistry::new(store.clone()),
            rooms: RoomStore::new(store.clone()),
            store,
        }
    }

    /// Create a room: store its header, then register a freshly generated
    /// slug, retrying generation if a candidate happens to be taken.
    pub async fn create_room(&self, header: RoomHeader) -> RoomResult<CreatedRoom> {
        let room_id = ids::new_room_id();
        self.store.put(&head_key(&room_id), &header).await?;

        let mut attempts = SLUG_ATTEMPTS;
        loop {
            let slug = ids::new_slug();
            match self.registry.register(&slug, &room_id).await {
                Ok(()) => {
                    info!("created room {} ({})", slug, room_id);
                    return Ok(CreatedRoom { slug, room_id });
                }
                Err(err @ RoomError::Conflict { .. }) => {
                    attempts -= 1;
                    if attempts == 0 {
                        return Err(err);
                    }
                    warn!("slug collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Append a document to the room behind `slug`.
    ///
    /// The collection name and payload are validated before the slug is
    /// resolved, so a malformed request never consumes a sequence number.
    pub async fn append_document(
        &self,
        slug: &str,
        collection_name: &str,
        payload: JsonValue,
        source: IpAddr,
    ) -> RoomResult<Document> {
        let collection: Collection = collection_name.parse()?;
        let body = DocBody::from_value(collection, payload)?;

        let room_id = self.registry.resolve(slug).await?;
        let room = self.rooms.open(&room_id);
        room.append(body, PLACEHOLDER_AUTHOR, source).await
    }

    /// Full current state of the room behind `slug`, partitioned by
    /// collection, each partition ascending by sequence.
    pub async fn snapshot(&self, slug: &str) -> RoomResult<RoomState> {
        let room_id = self.registry.resolve(slug).await?;
        let header: RoomHeader = self.store.get(&head_key(&room_id)).await?;
        let room = self.rooms.open(&room_id);

        // one consistent cut of the log: documents and tail together
        let all = room.updates_since(0).await;
        let mut msgs = Vec::new();
        let mut charas = Vec::new();
        for doc in &all.updates {
            match doc.collection {
                Collection::Message => msgs.push(doc.public()),
                Collection::Chara => charas.push(doc.public()),
            }
        }

        Ok(RoomState {
            header,
            msgs,
            charas,
            last_seq: all.last_seq,
        })
    }

    /// Documents newer than the `since` watermark for the room behind
    /// `slug`, in the public projection.
    pub async fn updates_since(&self, slug: &str, since: u64) -> RoomResult<RoomUpdates> {
        let room_id = self.registry.resolve(slug).await?;
        let room = self.rooms.open(&room_id);

        let updates = room.updates_since(since).await;
        Ok(RoomUpdates {
            last_seq: updates.last_seq,
            updates: updates.updates.iter().map(Document::public).collect(),
        })
    }

    /// Final step of the ordered shutdown. Callers stop accepting requests
    /// and drain in-flight operations first; this then closes the store.
    pub async fn close(&self) -> RoomResult<()> {
        info!("closing room service");
        self.store.close().await
    }

    /// The shared record store.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }
}

fn head_key(room_id: &str) -> String {
    format!("{room_id}_head")
}
