use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::chat::gateway::{CompletionGateway, CompletionRequest};
use crate::chat::{
    ChatError, FALLBACK_REPLY, GREETING, MAX_TITLE_CHARS, MIN_FEEDBACK_CHARS,
    MISSING_QUESTION_PLACEHOLDER,
};
use crate::db::models::{ChatMessage, ChatSession, FeedbackRecord};
use crate::db::{service::DbService, DbPool};
use crate::storage::FileStore;

/// Message identity. Locally generated ids never collide with persisted row
/// ids; an optimistic entry is replaced in place once its row comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    Local(u64),
    Persisted(i64),
}

impl MessageId {
    pub fn is_persisted(&self) -> bool {
        matches!(self, MessageId::Persisted(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub id: MessageId,
    pub is_user: bool,
    pub content: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    fn from_row(row: ChatMessage) -> Self {
        Self {
            id: MessageId::Persisted(row.id),
            is_user: row.is_user,
            content: row.content,
            file_url: row.file_url,
            file_name: row.file_name,
            created_at: row.created_at,
        }
    }
}

/// A file handed to `send_message` before it has been uploaded anywhere.
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Feedback capture sub-state-machine. The question/response pair is captured
/// at open time and echoed verbatim at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackDialog {
    Closed,
    Open { question: String, response: String },
    Submitting { question: String, response: String },
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub reply: String,
    /// Set when the gateway failed and `reply` is the fixed fallback text;
    /// callers surface it as a transient notification, never in the transcript.
    pub gateway_error: Option<String>,
}

/// Owns the in-memory message sequence for one open session and coordinates
/// sends, suggestion gating, feedback capture, and renames against the store
/// and the completion gateway.
#[derive(Debug)]
pub struct Conversation {
    pool: DbPool,
    user_id: Uuid,
    session: ChatSession,
    entries: Vec<Entry>,
    next_local: u64,
    awaiting_response: bool,
    suggestions_visible: bool,
    feedback: FeedbackDialog,
}

impl Conversation {
    /// Loads the session and its transcript. A session that does not exist or
    /// belongs to someone else is `NotFound`. An empty session is seeded with
    /// the synthetic greeting and shows the suggestion panel.
    pub fn open(pool: DbPool, user_id: Uuid, session_id: Uuid) -> Result<Self, ChatError> {
        let (session, rows) = {
            let conn = pool.lock().unwrap();
            let session = DbService::get_session(&conn, session_id)?
                .filter(|s| s.user_id == user_id)
                .ok_or(ChatError::NotFound)?;
            let rows = DbService::get_messages(&conn, session_id)?;
            (session, rows)
        };

        let mut conversation = Self {
            pool,
            user_id,
            session,
            entries: rows.into_iter().map(Entry::from_row).collect(),
            next_local: 0,
            awaiting_response: false,
            suggestions_visible: false,
            feedback: FeedbackDialog::Closed,
        };

        if conversation.entries.is_empty() {
            let id = conversation.next_local_id();
            conversation.entries.push(Entry {
                id,
                is_user: false,
                content: GREETING.to_string(),
                file_url: None,
                file_name: None,
                created_at: Utc::now(),
            });
            conversation.suggestions_visible = true;
        }

        Ok(conversation)
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn suggestions_visible(&self) -> bool {
        self.suggestions_visible
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn feedback(&self) -> &FeedbackDialog {
        &self.feedback
    }

    fn next_local_id(&mut self) -> MessageId {
        let id = MessageId::Local(self.next_local);
        self.next_local += 1;
        id
    }

    /// Sends a user message, optionally with an attachment. Returns `None`
    /// for the empty-send no-op. Sends are serialized per open session.
    pub async fn send_message(
        &mut self,
        store: &dyn FileStore,
        gateway: &dyn CompletionGateway,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<Option<SendOutcome>, ChatError> {
        if self.awaiting_response {
            return Err(ChatError::SendInProgress);
        }

        // Suggestions are hidden before validation, matching the UI: once a
        // send is attempted they never come back for this session.
        self.suggestions_visible = false;

        let text = text.trim().to_string();
        if text.is_empty() && attachment.is_none() {
            return Ok(None);
        }

        let mut file_url = None;
        let mut file_name = None;
        if let Some(att) = attachment {
            match store.store(self.user_id, &att.file_name, &att.bytes).await {
                Ok(stored) => {
                    file_url = Some(stored.url);
                    file_name = Some(stored.file_name);
                }
                Err(e) => {
                    warn!("Attachment upload failed: {}", e);
                    return Err(ChatError::UploadFailed);
                }
            }
        }

        // Optimistic append; reconciled in place with the persisted row below.
        let user_idx = self.entries.len();
        let local_id = self.next_local_id();
        self.entries.push(Entry {
            id: local_id,
            is_user: true,
            content: text.clone(),
            file_url: file_url.clone(),
            file_name: file_name.clone(),
            created_at: Utc::now(),
        });

        {
            let conn = self.pool.lock().unwrap();
            match DbService::insert_message(
                &conn,
                self.session.id,
                true,
                &text,
                file_url.as_deref(),
                file_name.as_deref(),
            ) {
                Ok(row) => self.entries[user_idx] = Entry::from_row(row),
                // The optimistic entry stays visible even though the row was
                // never stored; the user keeps what they typed.
                Err(e) => warn!("Failed to persist user message: {}", e),
            }
        }

        let prompt = if text.is_empty() {
            format!(
                "I've uploaded a file named {}. Can you help me with it?",
                file_name.as_deref().unwrap_or("attachment")
            )
        } else {
            text
        };

        self.awaiting_response = true;
        let result = gateway
            .complete(CompletionRequest {
                message: prompt,
                has_file: file_name.is_some(),
                file_name: file_name.clone(),
                user_id: Some(self.user_id),
            })
            .await;
        self.awaiting_response = false;

        let (reply, gateway_error) = match result {
            Ok(reply) => (reply, None),
            Err(e) => {
                warn!("Completion gateway failed: {}", e);
                (FALLBACK_REPLY.to_string(), Some(e.to_string()))
            }
        };

        let reply_idx = self.entries.len();
        let local_id = self.next_local_id();
        self.entries.push(Entry {
            id: local_id,
            is_user: false,
            content: reply.clone(),
            file_url: None,
            file_name: None,
            created_at: Utc::now(),
        });

        {
            let conn = self.pool.lock().unwrap();
            match DbService::insert_message(&conn, self.session.id, false, &reply, None, None) {
                Ok(row) => self.entries[reply_idx] = Entry::from_row(row),
                Err(e) => warn!("Failed to persist assistant message: {}", e),
            }
        }

        Ok(Some(SendOutcome {
            reply,
            gateway_error,
        }))
    }

    /// One-click conversation starter; only valid while the panel is visible.
    pub async fn select_suggestion(
        &mut self,
        store: &dyn FileStore,
        gateway: &dyn CompletionGateway,
        question: &str,
    ) -> Result<Option<SendOutcome>, ChatError> {
        if !self.suggestions_visible {
            return Err(ChatError::Validation(
                "Suggestions are no longer available for this session".to_string(),
            ));
        }
        self.suggestions_visible = false;
        self.send_message(store, gateway, question, None).await
    }

    /// Opens the feedback dialog for an assistant message, pairing it with
    /// the nearest preceding user message by sequence position.
    pub fn open_feedback(&mut self, target: MessageId) -> Result<(), ChatError> {
        let position = self
            .entries
            .iter()
            .position(|e| e.id == target)
            .ok_or(ChatError::NotFound)?;

        if self.entries[position].is_user {
            return Err(ChatError::Validation(
                "Feedback can only be given on assistant responses".to_string(),
            ));
        }

        let question = self.entries[..position]
            .iter()
            .rev()
            .find(|e| e.is_user)
            .map(|e| e.content.clone())
            .unwrap_or_else(|| MISSING_QUESTION_PLACEHOLDER.to_string());

        self.feedback = FeedbackDialog::Open {
            question,
            response: self.entries[position].content.clone(),
        };
        Ok(())
    }

    /// Persists a feedback record echoing the pair captured at open time. A
    /// validation or persistence failure leaves the dialog open so the typed
    /// text can be retried.
    pub fn submit_feedback(&mut self, text: &str) -> Result<FeedbackRecord, ChatError> {
        let (question, response) = match &self.feedback {
            FeedbackDialog::Open { question, response } => (question.clone(), response.clone()),
            _ => {
                return Err(ChatError::Validation(
                    "No feedback dialog is open".to_string(),
                ))
            }
        };

        let text = text.trim();
        if text.chars().count() < MIN_FEEDBACK_CHARS {
            return Err(ChatError::Validation(format!(
                "Please provide at least {} characters of feedback",
                MIN_FEEDBACK_CHARS
            )));
        }

        self.feedback = FeedbackDialog::Submitting {
            question: question.clone(),
            response: response.clone(),
        };

        let result = {
            let conn = self.pool.lock().unwrap();
            DbService::insert_feedback(&conn, self.user_id, &question, &response, text)
        };

        match result {
            Ok(record) => {
                self.feedback = FeedbackDialog::Closed;
                Ok(record)
            }
            Err(e) => {
                self.feedback = FeedbackDialog::Open { question, response };
                Err(ChatError::Persistence(e.to_string()))
            }
        }
    }

    /// Renames the session; the prior title stays in place on failure.
    pub fn rename_session(&mut self, new_title: &str) -> Result<(), ChatError> {
        let title = new_title.trim();
        let len = title.chars().count();
        if len == 0 {
            return Err(ChatError::Validation("Title is required".to_string()));
        }
        if len > MAX_TITLE_CHARS {
            return Err(ChatError::Validation(format!(
                "Title must be {} characters or less",
                MAX_TITLE_CHARS
            )));
        }

        {
            let conn = self.pool.lock().unwrap();
            DbService::rename_session(&conn, self.session.id, title)?;
        }
        self.session.title = title.to_string();
        Ok(())
    }
}
