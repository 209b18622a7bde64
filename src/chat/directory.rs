use chrono::Local;
use uuid::Uuid;

use crate::chat::ChatError;
use crate::db::models::{ChatSession, SessionSummary};
use crate::db::{service::DbService, DbPool};

/// Lists, creates, and deletes the caller's chat sessions. Sessions holding
/// only the synthetic greeting (which is never persisted) have no rows and so
/// never appear in the listing.
pub struct SessionDirectory {
    pool: DbPool,
    user_id: Uuid,
}

impl SessionDirectory {
    pub fn new(pool: DbPool, user_id: Uuid) -> Self {
        Self { pool, user_id }
    }

    pub fn list(&self) -> Result<Vec<SessionSummary>, ChatError> {
        let conn = self.pool.lock().unwrap();
        Ok(DbService::list_session_summaries(&conn, self.user_id)?)
    }

    /// Creates a session titled after the current local time, e.g.
    /// "Chat Mar 4, 2:15 PM".
    pub fn create(&self) -> Result<ChatSession, ChatError> {
        let title = format!("Chat {}", Local::now().format("%b %-d, %-I:%M %p"));
        let conn = self.pool.lock().unwrap();
        Ok(DbService::insert_session(&conn, self.user_id, &title)?)
    }

    /// Owner-checked delete; cascades the session's messages.
    pub fn delete(&self, session_id: Uuid) -> Result<(), ChatError> {
        let conn = self.pool.lock().unwrap();
        DbService::get_session(&conn, session_id)?
            .filter(|s| s.user_id == self.user_id)
            .ok_or(ChatError::NotFound)?;
        Ok(DbService::delete_session(&conn, session_id)?)
    }
}
