use tracing::warn;

use crate::db::models::DomainQuestion;
use crate::db::{service::DbService, DbPool};

/// Starter questions seeded by `questions seed`.
pub const SAMPLE_QUESTIONS: &[(&str, &str)] = &[
    ("What are the different scooter models available?", "Models"),
    ("How long does the battery last?", "Battery"),
    ("How do I charge my scooter?", "Battery"),
    ("What's the maximum speed and range?", "Models"),
    ("How do I troubleshoot if my scooter won't start?", "Troubleshooting"),
    ("What's covered under warranty?", "Warranty"),
    ("How do I check my order status?", "Orders"),
    ("What safety gear do you recommend?", "Safety"),
];

/// Active questions in creation order. A fetch failure degrades to an empty
/// list so the suggestion panel disappears instead of blocking the chat view.
pub fn active_questions(pool: &DbPool) -> Vec<DomainQuestion> {
    let conn = pool.lock().unwrap();
    match DbService::list_questions(&conn, true) {
        Ok(questions) => questions,
        Err(e) => {
            warn!("Failed to load domain questions: {}", e);
            Vec::new()
        }
    }
}

pub fn seed_samples(pool: &DbPool) -> Result<usize, duckdb::Error> {
    let conn = pool.lock().unwrap();
    for (question, category) in SAMPLE_QUESTIONS {
        DbService::insert_question(&conn, question, Some(category), true)?;
    }
    Ok(SAMPLE_QUESTIONS.len())
}
