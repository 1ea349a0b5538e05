use std::time::{SystemTime, UNIX_EPOCH};

use protocol::{GameType, PlayId, TournamentId};

/// Source of play and tournament identifiers.
pub trait IdIssuer: Send {
    fn next_play_id(&mut self, game_type: GameType) -> PlayId;
    fn next_tournament_id(&mut self) -> TournamentId;
}

/// Monotonic in-memory issuer.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next_play: PlayId,
    next_tournament: TournamentId,
}

impl SequentialIds {
    pub fn starting_at(first_play: PlayId, first_tournament: TournamentId) -> Self {
        Self {
            next_play: first_play,
            next_tournament: first_tournament,
        }
    }

    /// Seeds both counters from the wall clock so that ids keep increasing
    /// across restarts of a single gamemaster.
    pub fn seeded_from_clock() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(1);
        Self::starting_at(millis, millis)
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(1, 1)
    }
}

impl IdIssuer for SequentialIds {
    fn next_play_id(&mut self, _game_type: GameType) -> PlayId {
        let id = self.next_play;
        self.next_play += 1;
        id
    }

    fn next_tournament_id(&mut self) -> TournamentId {
        let id = self.next_tournament;
        self.next_tournament += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent_and_monotonic() {
        let mut ids = SequentialIds::starting_at(10, 500);
        assert_eq!(ids.next_play_id(GameType::Chess), 10);
        assert_eq!(ids.next_tournament_id(), 500);
        assert_eq!(ids.next_play_id(GameType::TicTacToe), 11);
        assert_eq!(ids.next_tournament_id(), 501);
    }
}
