use protocol::{GameType, PlayId, PlayerId, TournamentId};
use thiserror::Error;

use crate::domain::{PlayError, TournamentError};

/// Rejections raised by the registers and the game manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("no playmaster hosts {0} games")]
    UnsupportedGameType(GameType),
    #[error("player {0} is already queued, registered or playing")]
    PlayerBusy(PlayerId),
    #[error("player {0} is not waiting in a practice queue")]
    NotQueued(PlayerId),
    #[error("player {0} is not registered in any tournament")]
    NotInTournament(PlayerId),
    #[error("tournament {0} is not open for registration")]
    TournamentNotOpen(TournamentId),
    #[error("play {0} is not known to the orchestrator")]
    UnknownPlay(PlayId),
    #[error("play {0} is not awaiting confirmation")]
    NotAwaitingConfirmation(PlayId),
    #[error("play {0} has not been confirmed by a worker yet")]
    NotConfirmed(PlayId),
    #[error(transparent)]
    Tournament(#[from] TournamentError),
    #[error(transparent)]
    Play(#[from] PlayError),
}
