use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_version: &'static str,
    identity: String,
    session: String,
    session_dir: Option<String>,
    hosted_plays: usize,
}

async fn health(app_state: web::Data<AppState>) -> HttpResponse {
    let host = app_state.host();
    let session = host.session();
    let status = if host.is_active() { "ok" } else { "starting" };

    HttpResponse::Ok().json(HealthResponse {
        status,
        app_version: env!("CARGO_PKG_VERSION"),
        identity: session.identity().to_string(),
        session: format!("{:?}", session.phase()),
        session_dir: session.session_dir(),
        hosted_plays: host.hosted_plays().len(),
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
