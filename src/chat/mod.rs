pub mod conversation;
pub mod directory;
pub mod gateway;
pub mod questions;

use thiserror::Error;

/// Synthetic assistant greeting shown in an empty session. Never persisted.
pub const GREETING: &str = "Hi! I'm Evolve, your AI assistant. How can I help you today? \
You can ask me anything, upload a file, or choose from the common questions below.";

/// Fixed assistant text substituted when the completion gateway fails, so the
/// transcript never carries a raw error.
pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble responding right now. \
Please try again later or contact our support team for immediate assistance.";

/// Stands in for the question when an assistant message has no preceding user
/// message to pair with.
pub const MISSING_QUESTION_PLACEHOLDER: &str = "Question not available";

pub const MIN_FEEDBACK_CHARS: usize = 10;
pub const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("file upload failed")]
    UploadFailed,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("session not found")]
    NotFound,
    #[error("a send is already in progress for this session")]
    SendInProgress,
}

impl From<duckdb::Error> for ChatError {
    fn from(e: duckdb::Error) -> Self {
        ChatError::Persistence(e.to_string())
    }
}
