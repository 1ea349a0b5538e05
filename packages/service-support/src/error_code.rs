//! Error codes returned in problem-details bodies.
//!
//! Every code is SCREAMING_SNAKE_CASE and appears verbatim on the wire.
//! Add new codes here rather than passing ad-hoc strings.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Request validation
    ValidationError,
    BadRequest,
    InvalidGameType,
    UnsupportedGameType,
    InvalidTournamentSize,
    InvalidWinner,
    InvalidMove,
    NotAParticipant,

    // Missing resources
    NotFound,
    PlayNotFound,
    TournamentNotFound,
    PlayerNotFound,
    GameNotFound,
    HostNotFound,
    SessionNotFound,

    // Conflicts with current state
    Conflict,
    PlayerAlreadyRegistered,
    PlayerInGame,
    TournamentFull,
    TournamentStarted,
    PlayAlreadyExists,
    PlayAlreadyResolved,

    // Preconditions
    PlayNotConfirmed,
    NotYourTurn,
    GameOver,

    // Availability
    SessionNotActive,
    CoordinationUnavailable,

    Internal,
    ConfigError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::InvalidGameType => "INVALID_GAME_TYPE",
            Self::UnsupportedGameType => "UNSUPPORTED_GAME_TYPE",
            Self::InvalidTournamentSize => "INVALID_TOURNAMENT_SIZE",
            Self::InvalidWinner => "INVALID_WINNER",
            Self::InvalidMove => "INVALID_MOVE",
            Self::NotAParticipant => "NOT_A_PARTICIPANT",

            Self::NotFound => "NOT_FOUND",
            Self::PlayNotFound => "PLAY_NOT_FOUND",
            Self::TournamentNotFound => "TOURNAMENT_NOT_FOUND",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::GameNotFound => "GAME_NOT_FOUND",
            Self::HostNotFound => "HOST_NOT_FOUND",
            Self::SessionNotFound => "SESSION_NOT_FOUND",

            Self::Conflict => "CONFLICT",
            Self::PlayerAlreadyRegistered => "PLAYER_ALREADY_REGISTERED",
            Self::PlayerInGame => "PLAYER_IN_GAME",
            Self::TournamentFull => "TOURNAMENT_FULL",
            Self::TournamentStarted => "TOURNAMENT_STARTED",
            Self::PlayAlreadyExists => "PLAY_ALREADY_EXISTS",
            Self::PlayAlreadyResolved => "PLAY_ALREADY_RESOLVED",

            Self::PlayNotConfirmed => "PLAY_NOT_CONFIRMED",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::GameOver => "GAME_OVER",

            Self::SessionNotActive => "SESSION_NOT_ACTIVE",
            Self::CoordinationUnavailable => "COORDINATION_UNAVAILABLE",

            Self::Internal => "INTERNAL",
            Self::ConfigError => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
