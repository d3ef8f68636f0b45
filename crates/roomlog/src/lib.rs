//! # Roomlog
//!
//! A durable, append-only document feed for shared rooms.
//!
//! Each room is an ordered log of typed documents (chat messages, character
//! sheets) contributed by many concurrent participants. The log assigns a
//! gap-free, strictly increasing sequence to every accepted document,
//! persists it durably before acknowledging, and serves two read patterns:
//! a full snapshot of the room and an incremental catch-up against a
//! client-held watermark. Rooms are fully independent; appends to
//! different rooms never contend.

pub mod document;
pub mod error;
pub mod ids;
pub mod registry;
pub mod room;
pub mod service;
pub mod store;

#[cfg(feature = "axum")]
pub mod api;

// Re-exports for convenience
pub use document::{
    CharaBody, Collection, DocBody, Document, MessageBody, MessageKind, PublicDocument,
};
pub use error::{RoomError, RoomResult};
pub use registry::{RoomRegistry, SlugEntry};
pub use room::{RoomHandle, RoomLog, RoomStore, Updates};
pub use service::{
    CreatedRoom, RoomHeader, RoomService, RoomState, RoomUpdates, PLACEHOLDER_AUTHOR,
};
pub use store::RecordStore;

#[cfg(feature = "axum")]
pub use api::{ApiError, ApiState};
