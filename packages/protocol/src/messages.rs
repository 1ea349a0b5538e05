use serde::{Deserialize, Serialize};

use crate::game::{GameType, Phase};
use crate::{PlayId, PlayerId, TournamentId};

/// Body of `POST games/{gametype}/register` sent by the gamemaster to a playmaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePlayRequest {
    pub play_id: PlayId,
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    #[serde(default)]
    pub player1_username: Option<String>,
    #[serde(default)]
    pub player2_username: Option<String>,
    #[serde(default)]
    pub tournament_id: Option<TournamentId>,
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub player1_ui_url: Option<String>,
    #[serde(default)]
    pub player2_ui_url: Option<String>,
}

/// Acknowledgement that a worker has created a play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPlay {
    pub play_id: PlayId,
}

/// Final outcome of a play as reported by the hosting worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayResultReport {
    pub play_id: PlayId,
    #[serde(default)]
    pub winner_id: Option<PlayerId>,
    #[serde(default, alias = "isADraw")]
    pub is_draw: bool,
}

/// Sent by a playmaster after recovering a session so that player traffic for
/// the listed plays is routed to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOwnership {
    pub url: String,
    pub play_ids: Vec<PlayId>,
}

/// A player asking to be paired for a practice game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeJoin {
    pub player_id: PlayerId,
    pub username: String,
    pub game_type: GameType,
    #[serde(default)]
    pub ui_url: Option<String>,
}

/// Request that only names a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTournament {
    pub creator_id: PlayerId,
    pub game_type: GameType,
    pub max_players: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentRegistration {
    pub tournament_id: TournamentId,
    pub player_id: PlayerId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub ui_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
