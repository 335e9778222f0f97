pub mod backend_client;
pub mod blob_client;
pub mod gemini_client;

pub use backend_client::BackendClient;
pub use blob_client::CloudinaryClient;
pub use gemini_client::GeminiClient;
