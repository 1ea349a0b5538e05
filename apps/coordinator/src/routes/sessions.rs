//! Session endpoints used by `RemoteCoordinator`.
//!
//! Coordination failures of an operation travel inside a 200
//! [`OperationReply`]; only an unknown session is an HTTP error.

use std::time::Duration;

use actix_web::{web, HttpResponse};
use coordination::remote::wire::{
    EventBatch, OpenSessionRequest, OpenSessionResponse, Operation, OperationReply,
};
use coordination::{CoordError, RemoteHost, SessionId};
use serde::Deserialize;
use service_support::error::AppError;
use service_support::error_code::ErrorCode;
use tracing::debug;

const DEFAULT_WAIT: Duration = Duration::from_secs(5);
const MAX_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct EventsQuery {
    wait_ms: Option<u64>,
}

impl EventsQuery {
    fn wait(&self) -> Duration {
        self.wait_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_WAIT)
            .min(MAX_WAIT)
    }
}

fn unknown_session(id: SessionId) -> AppError {
    AppError::not_found(ErrorCode::SessionNotFound, format!("session {id} is not open"))
}

async fn open_session(
    host: web::Data<RemoteHost>,
    body: Option<web::Json<OpenSessionRequest>>,
) -> HttpResponse {
    let requested = body
        .and_then(|body| body.into_inner().timeout_ms)
        .map(Duration::from_millis);
    let (session_id, timeout) = host.open(requested);
    HttpResponse::Created().json(OpenSessionResponse {
        session_id,
        timeout_ms: timeout.as_millis() as u64,
    })
}

async fn execute(
    host: web::Data<RemoteHost>,
    path: web::Path<SessionId>,
    body: web::Json<Operation>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    match host.execute(id, body.into_inner()).await {
        Err(CoordError::SessionExpired) => Err(unknown_session(id)),
        result => {
            if let Err(e) = &result {
                debug!(session = id, error = %e, "operation refused");
            }
            Ok(HttpResponse::Ok().json(OperationReply::from(result)))
        }
    }
}

async fn events(
    host: web::Data<RemoteHost>,
    path: web::Path<SessionId>,
    query: web::Query<EventsQuery>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    match host.poll(id, query.wait()).await {
        Ok(events) => Ok(HttpResponse::Ok().json(EventBatch { events })),
        Err(_) => Err(unknown_session(id)),
    }
}

async fn close_session(
    host: web::Data<RemoteHost>,
    path: web::Path<SessionId>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if host.close(id) {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(unknown_session(id))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(open_session))
        .route("/{session_id}", web::delete().to(close_session))
        .route("/{session_id}/ops", web::post().to(execute))
        .route("/{session_id}/events", web::get().to(events));
}
