//! Wire vocabulary shared by the gamemaster, the playmasters and their tests.
//!
//! Everything here is plain data: identifiers, the game catalogue, bracket
//! phase tags and the JSON bodies exchanged over HTTP between services.

pub mod game;
pub mod messages;

pub use game::{GameType, Phase, UnknownGameType};
pub use messages::{
    ConfirmPlay, CreatePlayRequest, CreateTournament, HostOwnership, MessageResponse,
    PlayResultReport, PlayerRequest, PracticeJoin, TournamentRegistration,
};

/// Opaque player identifier issued by the authentication tier.
pub type PlayerId = i64;

/// Globally unique play identifier issued by the gamemaster.
pub type PlayId = i64;

/// Tournament identifier issued by the gamemaster.
pub type TournamentId = i64;

/// Service category under which playmaster workers register.
pub const PLAYMASTER_CATEGORY: &str = "playmaster";

/// Service category under which the (singleton) gamemaster registers.
pub const GAMEMASTER_CATEGORY: &str = "gamemaster";

/// Fixed instance name of the gamemaster singleton node.
pub const GAMEMASTER_INSTANCE: &str = "gamemaster";
