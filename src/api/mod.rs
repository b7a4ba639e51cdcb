pub mod models;
pub mod models_ws;
pub mod routes;
pub mod routes_chat;
pub mod websocket;

use actix_web::{web, HttpResponse, Responder};

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

/// Registers every route on an app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .configure(routes::configure)
        .configure(websocket::configure);
}
