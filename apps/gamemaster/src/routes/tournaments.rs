//! Tournament lifecycle routes.

use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use protocol::{CreateTournament, GameType, MessageResponse, PlayerRequest, TournamentRegistration};
use serde::Deserialize;
use service_support::{AppError, ErrorCode};

use super::forwarded_authorization;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct OpenQuery {
    gametype: Option<String>,
}

/// GET /tournaments/open?gametype=
async fn open(
    query: web::Query<OpenQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let game_type = query
        .gametype
        .as_deref()
        .map(GameType::from_str)
        .transpose()
        .map_err(|e| AppError::invalid(ErrorCode::InvalidGameType, e.to_string()))?;

    let open = app_state.read(|manager| manager.open_tournaments(game_type));
    Ok(HttpResponse::Ok().json(open))
}

/// POST /tournaments
async fn create(
    body: web::Json<CreateTournament>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let info = app_state.mutate(|manager| manager.create_tournament(body.into_inner()))?;
    Ok(HttpResponse::Created().json(info))
}

/// POST /tournaments/register
///
/// Filling the last seat starts the bracket; its first round is handed
/// off in the background.
async fn register(
    req: HttpRequest,
    body: web::Json<TournamentRegistration>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let registration = body.into_inner();
    let (player_id, tournament_id) = (registration.player_id, registration.tournament_id);
    let authorization = forwarded_authorization(&req);

    app_state.mutate(|manager| manager.register_in_tournament(registration, authorization))?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "player {player_id} registered in tournament {tournament_id}"
    ))))
}

/// POST /tournaments/unregister
async fn unregister(
    body: web::Json<PlayerRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let player_id = body.player_id;
    let tournament_id = app_state.mutate(|manager| manager.unregister_from_tournament(player_id))?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "player {player_id} left tournament {tournament_id}"
    ))))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::post().to(create)))
        .route("/open", web::get().to(open))
        .route("/register", web::post().to(register))
        .route("/unregister", web::post().to(unregister));
}
