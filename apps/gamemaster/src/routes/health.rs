use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_version: &'static str,
    coordination: &'static str,
    workers: usize,
    pending_handoffs: usize,
}

async fn health(app_state: web::Data<AppState>) -> HttpResponse {
    let (workers, pending_handoffs) = app_state.read(|manager| {
        (manager.workers().len(), manager.pending_handoffs().len())
    });
    let coordination = if app_state.gate().is_open() {
        "connected"
    } else {
        "suspended"
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        app_version: env!("CARGO_PKG_VERSION"),
        coordination,
        workers,
        pending_handoffs,
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
