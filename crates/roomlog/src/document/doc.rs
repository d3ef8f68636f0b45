use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use super::DocBody;
use crate::RoomError;

/// The two kinds of document a room log accepts.
///
/// The wire names (`msgs`, `charas`) appear in stored keys, request paths,
/// and serialized records. Anything else is rejected as a validation error
/// before a sequence number is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "msgs")]
    Message,
    #[serde(rename = "charas")]
    Chara,
}

impl Collection {
    /// Wire name, as used in stored keys and request paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Message => "msgs",
            Collection::Chara => "charas",
        }
    }
}

impl FromStr for Collection {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "msgs" => Ok(Collection::Message),
            "charas" => Ok(Collection::Chara),
            other => Err(RoomError::validation(format!("invalid collection: {other}"))),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record in a room's log.
///
/// The serialized form is exactly what lands in the record store. Four
/// fields are internal bookkeeping (`event_id`, `namespace`, `collection`,
/// `ip`); [`Document::public`] projects the record down to the externally
/// visible subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Per-room sequence number, assigned exactly once at append time.
    #[serde(rename = "event_id")]
    pub seq: u64,
    /// Owning room.
    #[serde(rename = "namespace")]
    pub room_id: String,
    /// Which body variant this document carries.
    pub collection: Collection,
    /// Originating address, recorded for audit.
    pub ip: IpAddr,
    /// Stable document identifier, independent of `seq`.
    #[serde(rename = "_id")]
    pub id: String,
    /// Reserved for future in-place edits; 0 on creation, never mutated.
    pub revision: u64,
    /// Creation time, set by the store.
    pub timestamp: DateTime<Utc>,
    /// Contributor identity.
    #[serde(rename = "userid")]
    pub author_id: String,
    #[serde(flatten)]
    pub body: DocBody,
}

impl Document {
    /// Storage key: `{room}_{collection}_{id}`.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.room_id, self.collection.as_str(), self.id)
    }

    /// Project the externally visible subset of the record.
    pub fn public(&self) -> PublicDocument {
        PublicDocument {
            id: self.id.clone(),
            revision: self.revision,
            timestamp: self.timestamp,
            author_id: self.author_id.clone(),
            body: self.body.clone(),
        }
    }
}

/// The client-facing projection of a [`Document`].
///
/// Omits `event_id`, `namespace`, `collection`, and `ip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub revision: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "userid")]
    pub author_id: String,
    #[serde(flatten)]
    pub body: DocBody,
}
