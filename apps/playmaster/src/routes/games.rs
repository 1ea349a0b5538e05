//! Routes used by the gamemaster (play creation) and by UI services
//! (board views, moves, spectating).

use actix_web::{web, HttpRequest, HttpResponse};
use protocol::{CreatePlayRequest, GameType, PlayId, PlayerId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service_support::{AppError, ErrorCode};

use super::forwarded_authorization;
use crate::services::MoveCommand;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct CreatedResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct RemovedResponse {
    removed: bool,
}

/// A move: the mover plus whatever fields the game's rules read,
/// e.g. `{"player_id": 3, "square_to_play": 4}` for tic-tac-toe.
#[derive(Debug, Deserialize)]
struct MoveRequest {
    player_id: PlayerId,
    #[serde(default)]
    ui_url: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SpectatorRequest {
    ui_url: String,
}

fn parse_game_type(raw: &str) -> Result<GameType, AppError> {
    raw.parse()
        .map_err(|e: protocol::UnknownGameType| AppError::invalid(ErrorCode::InvalidGameType, e.to_string()))
}

/// POST /games/{gametype}/register
async fn register(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<CreatePlayRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let game_type = parse_game_type(&path)?;
    let url = app_state.host().register(
        game_type,
        body.into_inner(),
        forwarded_authorization(&req),
    )?;
    Ok(HttpResponse::Created().json(CreatedResponse { url }))
}

/// GET /games/{play_id}
async fn game(
    path: web::Path<PlayId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let view = app_state.host().game_view(path.into_inner())?;
    Ok(HttpResponse::Ok().json(view))
}

/// GET /games/player/{player_id}
async fn player_game(
    path: web::Path<PlayerId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let view = app_state.host().player_game_view(path.into_inner())?;
    Ok(HttpResponse::Ok().json(view))
}

/// POST /games/{play_id}/moves
async fn play_move(
    req: HttpRequest,
    path: web::Path<PlayId>,
    body: web::Json<MoveRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let MoveRequest {
        player_id,
        ui_url,
        fields,
    } = body.into_inner();
    let view = app_state.host().play_move(MoveCommand {
        play_id: path.into_inner(),
        player_id,
        mv: Value::Object(fields),
        ui_url,
        authorization: forwarded_authorization(&req),
    })?;
    Ok(HttpResponse::Ok().json(view))
}

/// POST /games/{play_id}/spectators
async fn add_spectator(
    path: web::Path<PlayId>,
    body: web::Json<SpectatorRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let view = app_state
        .host()
        .add_spectator(path.into_inner(), &body.ui_url)?;
    Ok(HttpResponse::Ok().json(view))
}

/// POST /games/{play_id}/spectators/remove
async fn remove_spectator(
    path: web::Path<PlayId>,
    body: web::Json<SpectatorRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let removed = app_state
        .host()
        .remove_spectator(path.into_inner(), &body.ui_url)?;
    Ok(HttpResponse::Ok().json(RemovedResponse { removed }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/player/{player_id}", web::get().to(player_game))
        .route("/{gametype}/register", web::post().to(register))
        .route("/{play_id}", web::get().to(game))
        .route("/{play_id}/moves", web::post().to(play_move))
        .route("/{play_id}/spectators", web::post().to(add_spectator))
        .route("/{play_id}/spectators/remove", web::post().to(remove_spectator));
}
