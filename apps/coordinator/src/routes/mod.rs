use actix_web::web;

pub mod health;
pub mod sessions;

/// Registers every coordinator route at the root.
pub fn configure(cfg: &mut web::ServiceConfig) {
    service_support::extract::configure_extractors(cfg);
    cfg.configure(health::configure_routes)
        .service(web::scope("/sessions").configure(sessions::configure_routes));
}
