use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, HttpRequest};

pub mod health;
pub mod plays;
pub mod practice;
pub mod tournaments;

/// Registers every gamemaster route. `main.rs` mounts this under
/// `/gamemaster`; tests mount it at the root.
pub fn configure(cfg: &mut web::ServiceConfig) {
    service_support::extract::configure_extractors(cfg);
    cfg.configure(health::configure_routes)
        .service(web::scope("/practice").configure(practice::configure_routes))
        .service(web::scope("/tournaments").configure(tournaments::configure_routes))
        .service(web::scope("/plays").configure(plays::configure_routes));
}

/// The caller's `Authorization` header, forwarded verbatim with hand-offs.
pub(crate) fn forwarded_authorization(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
