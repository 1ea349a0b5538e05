//! Routes used by workers (confirmation, results, host ownership) and by
//! clients looking up where a play lives.

use actix_web::{web, HttpResponse};
use protocol::{ConfirmPlay, HostOwnership, MessageResponse, PlayId, PlayResultReport, PlayerId};
use serde::Serialize;
use service_support::{AppError, ErrorCode};

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HostResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct OwnershipResponse {
    moved: usize,
}

/// POST /plays/confirm
async fn confirm(
    body: web::Json<ConfirmPlay>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let play_id = body.play_id;
    app_state.mutate(|manager| manager.confirm_play_created(play_id))?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(format!("play {play_id} confirmed"))))
}

/// POST /plays/result
async fn result(
    body: web::Json<PlayResultReport>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let report = body.into_inner();
    app_state.mutate(|manager| manager.record_result(report))?;
    Ok(HttpResponse::Created().json(MessageResponse::new(format!(
        "result of play {} recorded",
        report.play_id
    ))))
}

/// POST /plays/host
async fn host_ownership(
    body: web::Json<HostOwnership>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let moved = app_state.mutate(|manager| manager.record_host_ownership(&body.url, &body.play_ids));
    Ok(HttpResponse::Ok().json(OwnershipResponse { moved }))
}

/// GET /plays/active
async fn active(app_state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.read(|manager| manager.active_plays()))
}

/// GET /plays/{play_id}/host
async fn play_host(
    path: web::Path<PlayId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let play_id = path.into_inner();
    let url = app_state
        .read(|manager| manager.host_of_play(play_id).map(str::to_owned))
        .ok_or_else(|| {
            AppError::not_found(ErrorCode::HostNotFound, format!("no worker hosts play {play_id}"))
        })?;
    Ok(HttpResponse::Ok().json(HostResponse { url }))
}

/// GET /plays/player/{player_id}/host
async fn player_host(
    path: web::Path<PlayerId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let player_id = path.into_inner();
    let url = app_state
        .read(|manager| manager.host_of_player_play(player_id).map(str::to_owned))
        .ok_or_else(|| {
            AppError::not_found(
                ErrorCode::HostNotFound,
                format!("player {player_id} is not in a hosted play"),
            )
        })?;
    Ok(HttpResponse::Ok().json(HostResponse { url }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/confirm", web::post().to(confirm))
        .route("/result", web::post().to(result))
        .route("/host", web::post().to(host_ownership))
        .route("/active", web::get().to(active))
        .route("/player/{player_id}/host", web::get().to(player_host))
        .route("/{play_id}/host", web::get().to(play_host));
}
