pub mod auth_flow;
pub mod chat_session;
pub mod community_board;
pub mod note_submission;
pub mod notes_catalog;
pub mod notification;

pub use auth_flow::AuthFlow;
pub use chat_session::{ChatSession, RevealFrame};
pub use community_board::{
    AnswerLine, BoardView, CommunityBoard, CommunityFlow, ProblemCard, ANSWER_PAGE_SIZE,
    EMPTY_PROBLEMS_MESSAGE,
};
pub use note_submission::{NoteSubmission, NoteSubmissionFlow, UploadTicket};
pub use notes_catalog::{NotesCatalog, YearTab};
pub use notification::{Notification, NotificationKind};
