//! Practice queue routes.

use actix_web::{web, HttpRequest, HttpResponse};
use protocol::{MessageResponse, PlayerRequest, PracticeJoin};
use service_support::AppError;
use tracing::info;

use super::forwarded_authorization;
use crate::state::AppState;

/// POST /practice/join
///
/// Queues the player for a practice play. Two waiting players of the same
/// game type are paired straight away; the play is handed to a worker in
/// the background.
async fn join(
    req: HttpRequest,
    body: web::Json<PracticeJoin>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let join = body.into_inner();
    let player_id = join.player_id;
    let game_type = join.game_type;
    let authorization = forwarded_authorization(&req);

    let paired = app_state.mutate(|manager| manager.join_practice(join, authorization))?;
    info!(player_id, gametype = %game_type, paired = paired.len(), "practice join accepted");

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "player {player_id} is waiting for a {game_type} practice play"
    ))))
}

/// POST /practice/leave
async fn leave(
    body: web::Json<PlayerRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let player_id = body.player_id;
    app_state.mutate(|manager| manager.leave_practice(player_id))?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "player {player_id} left the practice queue"
    ))))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/join", web::post().to(join))
        .route("/leave", web::post().to(leave));
}
