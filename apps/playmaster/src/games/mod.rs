//! Rule engines for the hosted games.
//!
//! Every game type implements [`Game`]; the [`RuleBook`] creates new games
//! from a gamemaster hand-off and rebuilds them from their persisted JSON.

use std::fmt;

use protocol::{GameType, PlayId, PlayerId, TournamentId};
use serde_json::Value;
use thiserror::Error;

pub mod rulebook;
pub mod tic_tac_toe;

pub use rulebook::{RuleBook, RuleSet};
pub use tic_tac_toe::{TicTacToe, TicTacToeRules};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("player {player_id} is not playing in game {play_id}")]
    NotAParticipant { play_id: PlayId, player_id: PlayerId },
    #[error("it is not player {player_id}'s turn in game {play_id}")]
    NotYourTurn { play_id: PlayId, player_id: PlayerId },
    #[error("invalid move in game {play_id}: {reason}")]
    Invalid { play_id: PlayId, reason: String },
    #[error("game {0} is already over")]
    GameOver(PlayId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game type {0} is not hosted here")]
    Unsupported(String),
    #[error("persisted game is unreadable: {0}")]
    Corrupt(String),
}

/// A single hosted play.
pub trait Game: fmt::Debug + Send + Sync {
    fn play_id(&self) -> PlayId;

    fn game_type(&self) -> GameType;

    fn players(&self) -> [PlayerId; 2];

    fn tournament_id(&self) -> Option<TournamentId>;

    /// Applies `mv` on behalf of `player_id`. A rejected move leaves the
    /// game untouched.
    fn apply_move(&mut self, player_id: PlayerId, mv: &Value) -> Result<(), MoveError>;

    fn is_over(&self) -> bool;

    fn winner(&self) -> Option<PlayerId>;

    fn is_draw(&self) -> bool;

    /// Persisted form, tagged with `gametype`.
    fn to_state(&self) -> Value;

    /// Client-facing view of the board.
    fn view(&self) -> Value;

    fn has_player(&self, player_id: PlayerId) -> bool {
        self.players().contains(&player_id)
    }
}
