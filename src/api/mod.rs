pub mod middleware;
pub mod models;
pub mod routes;
pub mod routes_admin;
pub mod routes_chatbot;

use actix_web::HttpResponse;
use serde_json::json;

use crate::chat::ChatError;

/// Maps chat-core failures onto HTTP responses. Validation failures block
/// with the inline message; everything else is a generic transient error.
pub fn chat_error_response(e: ChatError) -> HttpResponse {
    match e {
        ChatError::Validation(msg) => HttpResponse::BadRequest().json(json!({ "error": msg })),
        ChatError::NotFound => HttpResponse::NotFound().json(json!({ "error": "Session not found" })),
        ChatError::SendInProgress => {
            HttpResponse::Conflict().json(json!({ "error": e.to_string() }))
        }
        ChatError::UploadFailed => HttpResponse::InternalServerError()
            .json(json!({ "error": "Failed to upload file. Please try again." })),
        ChatError::Persistence(_) => HttpResponse::InternalServerError()
            .json(json!({ "error": "An unexpected error occurred" })),
    }
}
