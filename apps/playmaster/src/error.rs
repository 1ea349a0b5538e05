//! Conversion of hosting rejections into HTTP problem details.

use service_support::{AppError, ErrorCode};

use crate::games::{GameError, MoveError};
use crate::services::{HostError, PlayManagerError};

impl From<MoveError> for AppError {
    fn from(e: MoveError) -> Self {
        let detail = e.to_string();
        match e {
            MoveError::NotAParticipant { .. } => AppError::invalid(ErrorCode::NotAParticipant, detail),
            MoveError::NotYourTurn { .. } => AppError::precondition(ErrorCode::NotYourTurn, detail),
            MoveError::Invalid { .. } => AppError::invalid(ErrorCode::InvalidMove, detail),
            MoveError::GameOver(_) => AppError::precondition(ErrorCode::GameOver, detail),
        }
    }
}

impl From<GameError> for AppError {
    fn from(e: GameError) -> Self {
        match e {
            GameError::Unsupported(_) => {
                AppError::invalid(ErrorCode::UnsupportedGameType, e.to_string())
            }
            GameError::Corrupt(_) => AppError::internal(e.to_string()),
        }
    }
}

impl From<PlayManagerError> for AppError {
    fn from(e: PlayManagerError) -> Self {
        let detail = e.to_string();
        match e {
            PlayManagerError::PlayExists(_) => AppError::conflict(ErrorCode::PlayAlreadyExists, detail),
            PlayManagerError::PlayerBusy { .. } => AppError::conflict(ErrorCode::PlayerInGame, detail),
            PlayManagerError::UnknownPlay(_) => AppError::not_found(ErrorCode::GameNotFound, detail),
            PlayManagerError::NoCurrentGame(_) => {
                AppError::not_found(ErrorCode::PlayerNotFound, detail)
            }
        }
    }
}

impl From<HostError> for AppError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::NotActive => AppError::unavailable(ErrorCode::SessionNotActive, e.to_string()),
            HostError::Game(inner) => inner.into(),
            HostError::Move(inner) => inner.into(),
            HostError::Registry(inner) => inner.into(),
            HostError::Persist(inner) => AppError::internal(inner.to_string()),
        }
    }
}
