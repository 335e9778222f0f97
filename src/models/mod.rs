pub mod auth;
pub mod chat;
pub mod community;
pub mod note;

pub use auth::{AuthResponse, LoginRequest, SignupRequest};
pub use chat::{
    ChatReply, ChatRequest, Completion, GenerateRequest, GenerateResponse, GenerationConfig,
    UploadReply,
};
pub use community::{Answer, NewAnswer, NewProblem, Problem};
pub use note::{Category, NewNote, Note, NoteField, NoteForm, StudyYear};
