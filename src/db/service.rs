use crate::db::models::{
    ChatMessage, ChatSession, DomainQuestion, FeedbackRecord, Order, SessionSummary,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection, Result as DbResult, Row};
use uuid::Uuid;

pub struct DbService;

// DuckDB timestamps come back as driver-specific values unless we CAST them to
// VARCHAR in the SELECT, so every query below reads them as text and parses here.
fn parse_ts(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(|n| n.and_utc()))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_uuid(s: &str) -> Uuid {
    s.parse().unwrap_or_default()
}

impl DbService {
    fn row_to_session(row: &Row) -> DbResult<ChatSession> {
        Ok(ChatSession {
            id: parse_uuid(&row.get::<_, String>(0)?),
            user_id: parse_uuid(&row.get::<_, String>(1)?),
            title: row.get(2)?,
            created_at: parse_ts(&row.get::<_, String>(3)?),
            updated_at: parse_ts(&row.get::<_, String>(4)?),
        })
    }

    fn row_to_message(row: &Row) -> DbResult<ChatMessage> {
        Ok(ChatMessage {
            id: row.get(0)?,
            session_id: parse_uuid(&row.get::<_, String>(1)?),
            is_user: row.get(2)?,
            content: row.get(3)?,
            file_url: row.get(4)?,
            file_name: row.get(5)?,
            created_at: parse_ts(&row.get::<_, String>(6)?),
        })
    }

    fn row_to_question(row: &Row) -> DbResult<DomainQuestion> {
        Ok(DomainQuestion {
            id: parse_uuid(&row.get::<_, String>(0)?),
            question: row.get(1)?,
            category: row.get(2)?,
            is_active: row.get(3)?,
            created_at: parse_ts(&row.get::<_, String>(4)?),
            updated_at: parse_ts(&row.get::<_, String>(5)?),
        })
    }

    fn row_to_feedback(row: &Row) -> DbResult<FeedbackRecord> {
        Ok(FeedbackRecord {
            id: parse_uuid(&row.get::<_, String>(0)?),
            user_id: parse_uuid(&row.get::<_, String>(1)?),
            original_query: row.get(2)?,
            chatbot_response: row.get(3)?,
            user_feedback: row.get(4)?,
            status: row.get(5)?,
            created_at: parse_ts(&row.get::<_, String>(6)?),
            updated_at: parse_ts(&row.get::<_, String>(7)?),
        })
    }

    fn row_to_order(row: &Row) -> DbResult<Order> {
        Ok(Order {
            id: parse_uuid(&row.get::<_, String>(0)?),
            user_id: parse_uuid(&row.get::<_, String>(1)?),
            order_number: row.get(2)?,
            product_name: row.get(3)?,
            product_model: row.get(4)?,
            status: row.get(5)?,
            order_date: parse_ts(&row.get::<_, String>(6)?),
            delivery_date: row.get::<_, Option<String>>(7)?.map(|s| parse_ts(&s)),
            shipping_address: row.get(8)?,
            total_amount: row.get(9)?,
            created_at: parse_ts(&row.get::<_, String>(10)?),
        })
    }

    // --- Session Operations ---

    pub fn insert_session(conn: &Connection, user_id: Uuid, title: &str) -> DbResult<ChatSession> {
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO chat_sessions (id, user_id, title) VALUES (?, ?, ?)",
            params![id.to_string(), user_id.to_string(), title],
        )?;

        Self::get_session(conn, id).map(|s| s.unwrap())
    }

    pub fn get_session(conn: &Connection, id: Uuid) -> DbResult<Option<ChatSession>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)
             FROM chat_sessions WHERE id = ?",
        )?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_session)?;

        if let Some(row) = rows.next() {
            Ok(Some(row?))
        } else {
            Ok(None)
        }
    }

    /// Directory listing: only sessions with at least one user-authored
    /// message, newest activity first, annotated with count and preview.
    pub fn list_session_summaries(conn: &Connection, user_id: Uuid) -> DbResult<Vec<SessionSummary>> {
        let mut stmt = conn.prepare(
            "SELECT s.id, s.user_id, s.title,
                    CAST(s.created_at AS VARCHAR), CAST(s.updated_at AS VARCHAR),
                    (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id),
                    (SELECT m.content FROM chat_messages m WHERE m.session_id = s.id
                     ORDER BY m.created_at DESC, m.id DESC LIMIT 1)
             FROM chat_sessions s
             WHERE s.user_id = ?
               AND EXISTS (SELECT 1 FROM chat_messages m
                           WHERE m.session_id = s.id AND m.is_user)
             ORDER BY s.updated_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], |row| {
            Ok(SessionSummary {
                session: Self::row_to_session(row)?,
                message_count: row.get(5)?,
                last_message: row.get(6)?,
            })
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    pub fn rename_session(conn: &Connection, id: Uuid, title: &str) -> DbResult<()> {
        conn.execute(
            "UPDATE chat_sessions SET title = ? WHERE id = ?",
            params![title, id.to_string()],
        )?;
        Ok(())
    }

    pub fn delete_session(conn: &Connection, id: Uuid) -> DbResult<()> {
        conn.execute("BEGIN TRANSACTION", [])?;

        let id_str = id.to_string();

        // Messages first, then the session; deletion cascades in one transaction
        if let Err(e) = conn.execute(
            "DELETE FROM chat_messages WHERE session_id = ?",
            params![id_str],
        ) {
            let _ = conn.execute("ROLLBACK", []);
            return Err(e);
        }

        if let Err(e) = conn.execute("DELETE FROM chat_sessions WHERE id = ?", params![id_str]) {
            let _ = conn.execute("ROLLBACK", []);
            return Err(e);
        }

        conn.execute("COMMIT", [])?;
        Ok(())
    }

    // --- Message Operations ---

    pub fn insert_message(
        conn: &Connection,
        session_id: Uuid,
        is_user: bool,
        content: &str,
        file_url: Option<&str>,
        file_name: Option<&str>,
    ) -> DbResult<ChatMessage> {
        conn.execute(
            "INSERT INTO chat_messages (session_id, is_user, content, file_url, file_name)
             VALUES (?, ?, ?, ?, ?)",
            params![session_id.to_string(), is_user, content, file_url, file_name],
        )?;

        // Every append bumps the session's updated_at
        conn.execute(
            "UPDATE chat_sessions SET updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![session_id.to_string()],
        )?;

        // Fetch the message we just inserted (the id comes from the sequence)
        let mut stmt = conn.prepare(
            "SELECT id, session_id, is_user, content, file_url, file_name, CAST(created_at AS VARCHAR)
             FROM chat_messages
             WHERE session_id = ?
             ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![session_id.to_string()], Self::row_to_message)?;

        Ok(rows.next().unwrap()?)
    }

    /// Full transcript in render order. Timestamps tie for the user/assistant
    /// pair written by one send, so the sequence id breaks ties.
    pub fn get_messages(conn: &Connection, session_id: Uuid) -> DbResult<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, is_user, content, file_url, file_name, CAST(created_at AS VARCHAR)
             FROM chat_messages
             WHERE session_id = ?
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![session_id.to_string()], Self::row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    // --- Domain Questions ---

    pub fn insert_question(
        conn: &Connection,
        question: &str,
        category: Option<&str>,
        is_active: bool,
    ) -> DbResult<DomainQuestion> {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO domain_questions (id, question, category, is_active) VALUES (?, ?, ?, ?)",
            params![id.to_string(), question, category, is_active],
        )?;

        Self::get_question(conn, id).map(|q| q.unwrap())
    }

    pub fn get_question(conn: &Connection, id: Uuid) -> DbResult<Option<DomainQuestion>> {
        let mut stmt = conn.prepare(
            "SELECT id, question, category, is_active,
                    CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)
             FROM domain_questions WHERE id = ?",
        )?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_question)?;

        if let Some(row) = rows.next() {
            Ok(Some(row?))
        } else {
            Ok(None)
        }
    }

    pub fn list_questions(conn: &Connection, active_only: bool) -> DbResult<Vec<DomainQuestion>> {
        let sql = if active_only {
            "SELECT id, question, category, is_active,
                    CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)
             FROM domain_questions WHERE is_active ORDER BY created_at ASC"
        } else {
            "SELECT id, question, category, is_active,
                    CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)
             FROM domain_questions ORDER BY created_at ASC"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], Self::row_to_question)?;

        let mut questions = Vec::new();
        for row in rows {
            questions.push(row?);
        }
        Ok(questions)
    }

    pub fn update_question(
        conn: &Connection,
        id: Uuid,
        question: &str,
        category: Option<&str>,
        is_active: bool,
    ) -> DbResult<Option<DomainQuestion>> {
        conn.execute(
            "UPDATE domain_questions
             SET question = ?, category = ?, is_active = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![question, category, is_active, id.to_string()],
        )?;
        Self::get_question(conn, id)
    }

    pub fn set_question_active(
        conn: &Connection,
        id: Uuid,
        is_active: bool,
    ) -> DbResult<Option<DomainQuestion>> {
        conn.execute(
            "UPDATE domain_questions SET is_active = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![is_active, id.to_string()],
        )?;
        Self::get_question(conn, id)
    }

    pub fn delete_question(conn: &Connection, id: Uuid) -> DbResult<()> {
        conn.execute(
            "DELETE FROM domain_questions WHERE id = ?",
            params![id.to_string()],
        )?;
        Ok(())
    }

    // --- Feedback ---

    pub fn insert_feedback(
        conn: &Connection,
        user_id: Uuid,
        original_query: &str,
        chatbot_response: &str,
        user_feedback: &str,
    ) -> DbResult<FeedbackRecord> {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO user_queries (id, user_id, original_query, chatbot_response, user_feedback, status)
             VALUES (?, ?, ?, ?, ?, 'pending')",
            params![
                id.to_string(),
                user_id.to_string(),
                original_query,
                chatbot_response,
                user_feedback
            ],
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, original_query, chatbot_response, user_feedback, status,
                    CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)
             FROM user_queries WHERE id = ?",
        )?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_feedback)?;

        Ok(rows.next().unwrap()?)
    }

    pub fn list_feedback(conn: &Connection, user_id: Uuid) -> DbResult<Vec<FeedbackRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, original_query, chatbot_response, user_feedback, status,
                    CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)
             FROM user_queries WHERE user_id = ? ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], Self::row_to_feedback)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // --- Orders (read-only to the chat core) ---

    pub fn list_orders(conn: &Connection, user_id: Uuid) -> DbResult<Vec<Order>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, order_number, product_name, product_model, status,
                    CAST(order_date AS VARCHAR), CAST(delivery_date AS VARCHAR),
                    shipping_address, total_amount, CAST(created_at AS VARCHAR)
             FROM orders WHERE user_id = ? ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], Self::row_to_order)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?);
        }
        Ok(orders)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_order(
        conn: &Connection,
        user_id: Uuid,
        order_number: &str,
        product_name: &str,
        product_model: &str,
        status: &str,
        order_date: DateTime<Utc>,
        delivery_date: Option<DateTime<Utc>>,
        shipping_address: &str,
        total_amount: f64,
    ) -> DbResult<Uuid> {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO orders (id, user_id, order_number, product_name, product_model, status,
                                 order_date, delivery_date, shipping_address, total_amount)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id.to_string(),
                user_id.to_string(),
                order_number,
                product_name,
                product_model,
                status,
                order_date.naive_utc().to_string(),
                delivery_date.map(|d| d.naive_utc().to_string()),
                shipping_address,
                total_amount
            ],
        )?;
        Ok(id)
    }
}
