use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::Collection;
use crate::{RoomError, RoomResult};

/// How a message is voiced in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Third-person narration, not attributed to a character.
    Narrator,
    /// Spoken in character; `chara_id` names the speaker.
    Chara,
    /// Out-of-character chatter.
    Ooc,
}

/// Conversational content of a `msgs` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(rename = "charaId", default, skip_serializing_if = "Option::is_none")]
    pub chara_id: Option<String>,
}

/// Profile content of a `charas` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharaBody {
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The payload of a document.
///
/// Exactly one variant per document; the envelope's `collection` field is
/// the discriminator, and [`DocBody::from_value`] ties the populated variant
/// to it. Serialized untagged and flattened into the envelope, so body
/// fields sit at the top level of the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocBody {
    Message(MessageBody),
    Chara(CharaBody),
}

impl DocBody {
    /// Parse a raw payload as the body shape the collection requires.
    pub fn from_value(collection: Collection, value: JsonValue) -> RoomResult<Self> {
        match collection {
            Collection::Message => serde_json::from_value(value)
                .map(DocBody::Message)
                .map_err(|e| RoomError::validation(format!("malformed message body: {e}"))),
            Collection::Chara => serde_json::from_value(value)
                .map(DocBody::Chara)
                .map_err(|e| RoomError::validation(format!("malformed character body: {e}"))),
        }
    }

    /// The collection this body belongs to.
    pub fn collection(&self) -> Collection {
        match self {
            DocBody::Message(_) => Collection::Message,
            DocBody::Chara(_) => Collection::Chara,
        }
    }
}
