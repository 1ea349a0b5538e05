use protocol::{PlayId, PlayerId, TournamentId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    #[error("play {0} already has a result")]
    AlreadyResolved(PlayId),
    #[error("player {player_id} is not part of play {play_id}")]
    NotAParticipant { play_id: PlayId, player_id: PlayerId },
    #[error("play {0} is not a draw but no winner was given")]
    MissingWinner(PlayId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TournamentError {
    #[error("tournament size {0} is not a power of two of at least 4")]
    InvalidSize(usize),
    #[error("player {player_id} is already registered in tournament {tournament_id}")]
    AlreadyRegistered {
        tournament_id: TournamentId,
        player_id: PlayerId,
    },
    #[error("player {player_id} is not registered in tournament {tournament_id}")]
    NotRegistered {
        tournament_id: TournamentId,
        player_id: PlayerId,
    },
    #[error("tournament {0} is full")]
    Full(TournamentId),
    #[error("tournament {0} has already started")]
    RegistrationClosed(TournamentId),
    #[error("play {0} is not awaiting creation")]
    NotPending(PlayId),
    #[error("play {0} has not been confirmed yet")]
    NotConfirmed(PlayId),
    #[error("play {0} does not belong to this tournament")]
    UnknownPlay(PlayId),
    #[error(transparent)]
    Play(#[from] PlayError),
}
