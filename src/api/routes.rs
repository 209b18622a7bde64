use actix_web::{delete, get, post, put, web, HttpResponse, Result as WebResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::chat_error_response;
use crate::api::middleware::Identity;
use crate::api::models::{
    FeedbackRequest, RenameSessionRequest, SendMessageRequest, SendMessageResponse, SessionView,
};
use crate::chat::conversation::{Attachment, Conversation, MessageId};
use crate::chat::directory::SessionDirectory;
use crate::chat::gateway::CompletionGateway;
use crate::chat::{questions, ChatError};
use crate::config::AppConfig;
use crate::db::{service::DbService, DbPool};
use crate::storage::FileStore;

// --- Sessions ---

#[post("")]
pub async fn create_session(
    pool: web::Data<DbPool>,
    ident: Identity,
) -> WebResult<HttpResponse> {
    let directory = SessionDirectory::new(pool.get_ref().clone(), ident.user_id);

    match directory.create() {
        Ok(session) => Ok(HttpResponse::Created().json(session)),
        Err(e) => Ok(chat_error_response(e)),
    }
}

#[get("")]
pub async fn list_sessions(pool: web::Data<DbPool>, ident: Identity) -> WebResult<HttpResponse> {
    let directory = SessionDirectory::new(pool.get_ref().clone(), ident.user_id);

    match directory.list() {
        Ok(summaries) => Ok(HttpResponse::Ok().json(summaries)),
        Err(e) => Ok(chat_error_response(e)),
    }
}

#[get("/{id}")]
pub async fn get_session(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    match Conversation::open(pool.get_ref().clone(), ident.user_id, id.into_inner()) {
        Ok(conversation) => Ok(HttpResponse::Ok().json(SessionView {
            session: conversation.session().clone(),
            messages: conversation.entries().to_vec(),
            suggestions_visible: conversation.suggestions_visible(),
        })),
        Err(e) => Ok(chat_error_response(e)),
    }
}

#[delete("/{id}")]
pub async fn delete_session(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    let directory = SessionDirectory::new(pool.get_ref().clone(), ident.user_id);

    match directory.delete(id.into_inner()) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(chat_error_response(e)),
    }
}

#[put("/{id}/title")]
pub async fn rename_session(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
    req: web::Json<RenameSessionRequest>,
) -> WebResult<HttpResponse> {
    let mut conversation =
        match Conversation::open(pool.get_ref().clone(), ident.user_id, id.into_inner()) {
            Ok(c) => c,
            Err(e) => return Ok(chat_error_response(e)),
        };

    match conversation.rename_session(&req.title) {
        Ok(()) => Ok(HttpResponse::Ok().json(conversation.session())),
        Err(e) => Ok(chat_error_response(e)),
    }
}

// --- Messages ---

#[post("/{id}/messages")]
pub async fn send_message(
    pool: web::Data<DbPool>,
    gateway: web::Data<Arc<dyn CompletionGateway>>,
    store: web::Data<Arc<dyn FileStore>>,
    ident: Identity,
    id: web::Path<Uuid>,
    req: web::Json<SendMessageRequest>,
) -> WebResult<HttpResponse> {
    let mut conversation =
        match Conversation::open(pool.get_ref().clone(), ident.user_id, id.into_inner()) {
            Ok(c) => c,
            Err(e) => return Ok(chat_error_response(e)),
        };

    let req = req.into_inner();
    let attachment = match req.attachment {
        Some(payload) => match BASE64.decode(&payload.data) {
            Ok(bytes) => Some(Attachment {
                file_name: payload.file_name,
                bytes,
            }),
            Err(_) => {
                return Ok(chat_error_response(ChatError::Validation(
                    "Attachment data is not valid base64".to_string(),
                )))
            }
        },
        None => None,
    };

    match conversation
        .send_message(
            store.get_ref().as_ref(),
            gateway.get_ref().as_ref(),
            &req.content,
            attachment,
        )
        .await
    {
        Ok(Some(outcome)) => Ok(HttpResponse::Created().json(SendMessageResponse {
            messages: conversation.entries().to_vec(),
            reply: outcome.reply,
            gateway_error: outcome.gateway_error,
        })),
        Ok(None) => Ok(chat_error_response(ChatError::Validation(
            "Message or attachment is required".to_string(),
        ))),
        Err(e) => Ok(chat_error_response(e)),
    }
}

#[get("/{id}/messages")]
pub async fn get_messages(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    let id = id.into_inner();
    let conn = pool.lock().unwrap();

    // Owner check mirrors Conversation::open
    let session = match DbService::get_session(&conn, id) {
        Ok(session) => session,
        Err(e) => return Ok(chat_error_response(e.into())),
    };
    if session.filter(|s| s.user_id == ident.user_id).is_none() {
        return Ok(chat_error_response(ChatError::NotFound));
    }

    match DbService::get_messages(&conn, id) {
        Ok(messages) => Ok(HttpResponse::Ok().json(messages)),
        Err(e) => Ok(chat_error_response(e.into())),
    }
}

// --- Feedback ---

#[post("/{id}/feedback")]
pub async fn submit_feedback(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
    req: web::Json<FeedbackRequest>,
) -> WebResult<HttpResponse> {
    let mut conversation =
        match Conversation::open(pool.get_ref().clone(), ident.user_id, id.into_inner()) {
            Ok(c) => c,
            Err(e) => return Ok(chat_error_response(e)),
        };

    if let Err(e) = conversation.open_feedback(MessageId::Persisted(req.message_id)) {
        return Ok(chat_error_response(e));
    }

    match conversation.submit_feedback(&req.feedback) {
        Ok(record) => Ok(HttpResponse::Created().json(record)),
        Err(e) => Ok(chat_error_response(e)),
    }
}

#[get("/queries")]
pub async fn list_queries(pool: web::Data<DbPool>, ident: Identity) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();

    match DbService::list_feedback(&conn, ident.user_id) {
        Ok(records) => Ok(HttpResponse::Ok().json(records)),
        Err(e) => Ok(chat_error_response(e.into())),
    }
}

// --- Questions & Orders ---

#[get("/questions")]
pub async fn active_questions(pool: web::Data<DbPool>, _ident: Identity) -> WebResult<HttpResponse> {
    // Degrades to an empty list on fetch failure so the chat view never blocks
    Ok(HttpResponse::Ok().json(questions::active_questions(pool.get_ref())))
}

#[get("/orders")]
pub async fn list_orders(pool: web::Data<DbPool>, ident: Identity) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap();

    match DbService::list_orders(&conn, ident.user_id) {
        Ok(orders) => Ok(HttpResponse::Ok().json(orders)),
        Err(e) => Ok(chat_error_response(e.into())),
    }
}

// --- Public file serving ---

#[get("/files/{user_id}/{name}")]
pub async fn serve_file(
    config: web::Data<AppConfig>,
    path: web::Path<(Uuid, String)>,
) -> WebResult<HttpResponse> {
    let (user_id, name) = path.into_inner();

    if name.contains('/') || name.contains("..") {
        return Ok(HttpResponse::NotFound().finish());
    }

    let file_path = std::path::Path::new(&config.storage.upload_dir)
        .join(user_id.to_string())
        .join(&name);

    match tokio::fs::read(&file_path).await {
        Ok(bytes) => Ok(HttpResponse::Ok()
            .content_type("application/octet-stream")
            .body(bytes)),
        Err(_) => Ok(HttpResponse::NotFound().json(json!({ "error": "File not found" }))),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/sessions")
            .service(create_session)
            .service(list_sessions)
            .service(get_session)
            .service(delete_session)
            .service(rename_session)
            .service(send_message)
            .service(get_messages)
            .service(submit_feedback),
    )
    .service(
        web::scope("/api")
            .service(list_queries)
            .service(active_questions)
            .service(list_orders),
    );
}
