//! Pure orchestration domain: plays, tournament brackets and id issuing.
//! Nothing in here performs I/O.

pub mod errors;
pub mod ids;
pub mod play;
pub mod tournament;

#[cfg(test)]
mod tests_tournament;

pub use errors::{PlayError, TournamentError};
pub use ids::{IdIssuer, SequentialIds};
pub use play::{Play, PlayOutcome, PlayRecord};
pub use tournament::{Tournament, TournamentInfo, TournamentState};
