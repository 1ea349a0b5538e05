use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, HttpRequest};

pub mod games;
pub mod health;

/// Registers every playmaster route. `main.rs` mounts this under
/// `/playmaster`; tests mount it at the root.
pub fn configure(cfg: &mut web::ServiceConfig) {
    service_support::extract::configure_extractors(cfg);
    cfg.configure(health::configure_routes)
        .service(web::scope("/games").configure(games::configure_routes));
}

/// The caller's `Authorization` header, forwarded verbatim to UI services.
pub(crate) fn forwarded_authorization(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
