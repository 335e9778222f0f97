pub mod blob_store;
pub mod chat_completion;
pub mod repository;
pub mod reveal;
pub mod session_store;

pub use blob_store::{BlobStore, FileUpload};
pub use chat_completion::{unescape_text, ChatCompletion};
pub use repository::{AuthApi, CommunityRepository, NotesRepository};
pub use reveal::{reveal_stream, reveal_tokens};
pub use session_store::SessionStore;
