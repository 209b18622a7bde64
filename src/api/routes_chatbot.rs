use actix_web::{post, web, HttpResponse, Result as WebResult};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::api::middleware::Identity;
use crate::api::models::{ChatbotRequest, ChatbotResponse};
use crate::chat::gateway::{CompletionGateway, CompletionRequest};

/// Stateless proxy: forwards one message to the completion gateway and
/// returns the text. Anonymous callers are answered too; order context is
/// folded in server-side only when the caller is identified and the message
/// looks order-related.
#[post("/api/chatbot")]
pub async fn chatbot(
    gateway: web::Data<Arc<dyn CompletionGateway>>,
    ident: Option<Identity>,
    req: web::Json<ChatbotRequest>,
) -> WebResult<HttpResponse> {
    let req = req.into_inner();

    if req.message.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "Message is required" })));
    }

    let request = CompletionRequest {
        message: req.message,
        has_file: req.has_file,
        file_name: req.file_name,
        user_id: ident.map(|i| i.user_id),
    };

    match gateway.complete(request).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ChatbotResponse { response })),
        Err(e) => {
            error!("Chatbot completion failed: {}", e);
            Ok(HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to get response from AI" })))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chatbot);
}
