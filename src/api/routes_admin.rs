use actix_web::{delete, get, post, put, web, HttpResponse, Result as WebResult};
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::Identity;
use crate::api::models::{CreateQuestionRequest, UpdateQuestionRequest};
use crate::chat::questions;
use crate::db::{service::DbService, DbPool};

fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({ "error": "Admin access required" }))
}

#[get("")]
pub async fn list_questions(pool: web::Data<DbPool>, ident: Identity) -> WebResult<HttpResponse> {
    if !ident.is_admin() {
        return Ok(forbidden());
    }
    let conn = pool.lock().unwrap();

    // Admins see every question, active or not
    match DbService::list_questions(&conn, false) {
        Ok(list) => Ok(HttpResponse::Ok().json(list)),
        Err(e) => Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))),
    }
}

#[post("")]
pub async fn create_question(
    pool: web::Data<DbPool>,
    ident: Identity,
    req: web::Json<CreateQuestionRequest>,
) -> WebResult<HttpResponse> {
    if !ident.is_admin() {
        return Ok(forbidden());
    }
    let req = req.into_inner();
    if req.question.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "error": "Question is required" })));
    }

    let conn = pool.lock().unwrap();
    match DbService::insert_question(
        &conn,
        req.question.trim(),
        req.category.as_deref().filter(|c| !c.trim().is_empty()),
        req.is_active,
    ) {
        Ok(question) => Ok(HttpResponse::Created().json(question)),
        Err(e) => Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))),
    }
}

#[put("/{id}")]
pub async fn update_question(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
    req: web::Json<UpdateQuestionRequest>,
) -> WebResult<HttpResponse> {
    if !ident.is_admin() {
        return Ok(forbidden());
    }
    let id = id.into_inner();
    let req = req.into_inner();
    let conn = pool.lock().unwrap();

    let existing = match DbService::get_question(&conn, id) {
        Ok(Some(q)) => q,
        Ok(None) => return Ok(HttpResponse::NotFound().finish()),
        Err(e) => {
            return Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() })))
        }
    };

    let question = req.question.unwrap_or(existing.question);
    let category = req.category.or(existing.category);
    let is_active = req.is_active.unwrap_or(existing.is_active);

    match DbService::update_question(&conn, id, &question, category.as_deref(), is_active) {
        Ok(Some(updated)) => Ok(HttpResponse::Ok().json(updated)),
        Ok(None) => Ok(HttpResponse::NotFound().finish()),
        Err(e) => Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))),
    }
}

#[put("/{id}/active")]
pub async fn toggle_question(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    if !ident.is_admin() {
        return Ok(forbidden());
    }
    let id = id.into_inner();
    let conn = pool.lock().unwrap();

    let existing = match DbService::get_question(&conn, id) {
        Ok(Some(q)) => q,
        Ok(None) => return Ok(HttpResponse::NotFound().finish()),
        Err(e) => {
            return Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() })))
        }
    };

    match DbService::set_question_active(&conn, id, !existing.is_active) {
        Ok(Some(updated)) => Ok(HttpResponse::Ok().json(updated)),
        Ok(None) => Ok(HttpResponse::NotFound().finish()),
        Err(e) => Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))),
    }
}

#[delete("/{id}")]
pub async fn delete_question(
    pool: web::Data<DbPool>,
    ident: Identity,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    if !ident.is_admin() {
        return Ok(forbidden());
    }
    let id = id.into_inner();
    let conn = pool.lock().unwrap();

    if DbService::get_question(&conn, id).unwrap_or(None).is_none() {
        return Ok(HttpResponse::NotFound().finish());
    }

    match DbService::delete_question(&conn, id) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))),
    }
}

#[post("/seed")]
pub async fn seed_questions(pool: web::Data<DbPool>, ident: Identity) -> WebResult<HttpResponse> {
    if !ident.is_admin() {
        return Ok(forbidden());
    }

    match questions::seed_samples(pool.get_ref()) {
        Ok(count) => Ok(HttpResponse::Created().json(json!({ "seeded": count }))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin/questions")
            .service(list_questions)
            .service(create_question)
            .service(seed_questions)
            .service(update_question)
            .service(toggle_question)
            .service(delete_question),
    );
}
