//! Conversion of orchestration rejections into HTTP problem details.

use service_support::{AppError, ErrorCode};

use crate::domain::{PlayError, TournamentError};
use crate::services::RegisterError;

impl From<PlayError> for AppError {
    fn from(e: PlayError) -> Self {
        let detail = e.to_string();
        match e {
            PlayError::AlreadyResolved(_) => AppError::conflict(ErrorCode::PlayAlreadyResolved, detail),
            PlayError::NotAParticipant { .. } | PlayError::MissingWinner(_) => {
                AppError::invalid(ErrorCode::InvalidWinner, detail)
            }
        }
    }
}

impl From<TournamentError> for AppError {
    fn from(e: TournamentError) -> Self {
        let detail = e.to_string();
        match e {
            TournamentError::InvalidSize(_) => {
                AppError::invalid(ErrorCode::InvalidTournamentSize, detail)
            }
            TournamentError::AlreadyRegistered { .. } => {
                AppError::conflict(ErrorCode::PlayerAlreadyRegistered, detail)
            }
            TournamentError::NotRegistered { .. } => {
                AppError::not_found(ErrorCode::PlayerNotFound, detail)
            }
            TournamentError::Full(_) => AppError::conflict(ErrorCode::TournamentFull, detail),
            TournamentError::RegistrationClosed(_) => {
                AppError::precondition(ErrorCode::TournamentStarted, detail)
            }
            TournamentError::NotPending(_) | TournamentError::UnknownPlay(_) => {
                AppError::not_found(ErrorCode::PlayNotFound, detail)
            }
            TournamentError::NotConfirmed(_) => {
                AppError::precondition(ErrorCode::PlayNotConfirmed, detail)
            }
            TournamentError::Play(inner) => inner.into(),
        }
    }
}

impl From<RegisterError> for AppError {
    fn from(e: RegisterError) -> Self {
        let detail = e.to_string();
        match e {
            RegisterError::UnsupportedGameType(_) => {
                AppError::invalid(ErrorCode::UnsupportedGameType, detail)
            }
            RegisterError::PlayerBusy(_) => AppError::precondition(ErrorCode::PlayerInGame, detail),
            RegisterError::NotQueued(_) | RegisterError::NotInTournament(_) => {
                AppError::not_found(ErrorCode::PlayerNotFound, detail)
            }
            RegisterError::TournamentNotOpen(_) => {
                AppError::precondition(ErrorCode::TournamentNotFound, detail)
            }
            RegisterError::UnknownPlay(_) | RegisterError::NotAwaitingConfirmation(_) => {
                AppError::not_found(ErrorCode::PlayNotFound, detail)
            }
            RegisterError::NotConfirmed(_) => {
                AppError::precondition(ErrorCode::PlayNotConfirmed, detail)
            }
            RegisterError::Tournament(inner) => inner.into(),
            RegisterError::Play(inner) => inner.into(),
        }
    }
}
