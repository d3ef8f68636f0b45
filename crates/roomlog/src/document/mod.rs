pub mod body;
pub mod doc;

pub use body::{CharaBody, DocBody, MessageBody, MessageKind};
pub use doc::{Collection, Document, PublicDocument};
