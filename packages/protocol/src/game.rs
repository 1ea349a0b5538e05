use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Game types the platform knows how to orchestrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameType {
    TicTacToe,
    Chess,
}

impl GameType {
    pub const ALL: [GameType; 2] = [GameType::TicTacToe, GameType::Chess];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TicTacToe => "tic-tac-toe",
            Self::Chess => "chess",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game type: {0}")]
pub struct UnknownGameType(pub String);

impl FromStr for GameType {
    type Err = UnknownGameType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|game| game.as_str() == s)
            .ok_or_else(|| UnknownGameType(s.to_string()))
    }
}

/// Bracket tag carried by tournament plays.
///
/// Serialised as its integer value. `Semifinal` is only a hint for clients;
/// the bracket itself keys off `Final` and `ThirdPlace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    Final = 1,
    ThirdPlace = 2,
    Semifinal = 4,
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase as u8
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Final),
            2 => Ok(Self::ThirdPlace),
            4 => Ok(Self::Semifinal),
            other => Err(format!("unknown phase tag {other}")),
        }
    }
}
