use serde::{Deserialize, Serialize};

use crate::chat::conversation::Entry;
use crate::db::models::ChatSession;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    pub attachment: Option<AttachmentPayload>,
}

/// Attachment carried inline as base64; the conversation manager performs the
/// actual upload as part of the send.
#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub file_name: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameSessionRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub message_id: i64,
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatbotRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "hasFile")]
    pub has_file: bool,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatbotResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub question: String,
    pub category: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

/// An open session as the chat view needs it: transcript (with the synthetic
/// greeting when empty) plus suggestion-panel visibility.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session: ChatSession,
    pub messages: Vec<Entry>,
    pub suggestions_visible: bool,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub messages: Vec<Entry>,
    pub reply: String,
    /// Present when the reply is the fallback text; clients surface it as a
    /// transient notification.
    pub gateway_error: Option<String>,
}
