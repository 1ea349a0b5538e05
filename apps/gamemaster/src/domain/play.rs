use protocol::{GameType, Phase, PlayId, PlayerId, TournamentId};
use serde::Serialize;

use super::errors::PlayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Won(PlayerId),
    Draw,
}

/// One game between two players, practice or tournament.
///
/// The outcome is set exactly once; a winner and a draw cannot coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Play {
    pub id: PlayId,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub game_type: GameType,
    pub tournament_id: Option<TournamentId>,
    pub phase: Option<Phase>,
    pub player1_username: Option<String>,
    pub player2_username: Option<String>,
    outcome: Option<PlayOutcome>,
}

impl Play {
    pub fn practice(id: PlayId, player1: PlayerId, player2: PlayerId, game_type: GameType) -> Self {
        Self {
            id,
            player1,
            player2,
            game_type,
            tournament_id: None,
            phase: None,
            player1_username: None,
            player2_username: None,
            outcome: None,
        }
    }

    pub fn in_tournament(
        id: PlayId,
        player1: PlayerId,
        player2: PlayerId,
        game_type: GameType,
        tournament_id: TournamentId,
        phase: Option<Phase>,
    ) -> Self {
        Self {
            tournament_id: Some(tournament_id),
            phase,
            ..Self::practice(id, player1, player2, game_type)
        }
    }

    pub fn is_in_tournament(&self) -> bool {
        self.tournament_id.is_some()
    }

    pub fn involves(&self, player: PlayerId) -> bool {
        self.player1 == player || self.player2 == player
    }

    pub fn players(&self) -> [PlayerId; 2] {
        [self.player1, self.player2]
    }

    pub fn outcome(&self) -> Option<PlayOutcome> {
        self.outcome
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn is_draw(&self) -> bool {
        self.outcome == Some(PlayOutcome::Draw)
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self.outcome {
            Some(PlayOutcome::Won(winner)) => Some(winner),
            _ => None,
        }
    }

    pub fn loser(&self) -> Option<PlayerId> {
        self.winner()
            .map(|winner| if winner == self.player1 { self.player2 } else { self.player1 })
    }

    /// Resolves the play. A draw ignores `winner`.
    pub fn record_result(&mut self, winner: Option<PlayerId>, is_draw: bool) -> Result<(), PlayError> {
        if self.outcome.is_some() {
            return Err(PlayError::AlreadyResolved(self.id));
        }
        let outcome = if is_draw {
            PlayOutcome::Draw
        } else {
            let winner = winner.ok_or(PlayError::MissingWinner(self.id))?;
            if !self.involves(winner) {
                return Err(PlayError::NotAParticipant {
                    play_id: self.id,
                    player_id: winner,
                });
            }
            PlayOutcome::Won(winner)
        };
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn set_usernames(&mut self, player1: Option<String>, player2: Option<String>) {
        self.player1_username = player1;
        self.player2_username = player2;
    }

    pub fn record(&self) -> PlayRecord {
        PlayRecord {
            play_id: self.id,
            player1_id: self.player1,
            player2_id: self.player2,
            gametype: self.game_type,
            tournament_id: self.tournament_id,
            phase: self.phase,
            is_draw: self.is_resolved().then(|| self.is_draw()),
            winner_id: self.winner(),
            player1_username: self.player1_username.clone(),
            player2_username: self.player2_username.clone(),
        }
    }
}

/// JSON projection of a play for listings and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRecord {
    pub play_id: PlayId,
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,
    pub gametype: GameType,
    pub tournament_id: Option<TournamentId>,
    pub phase: Option<Phase>,
    pub is_draw: Option<bool>,
    pub winner_id: Option<PlayerId>,
    pub player1_username: Option<String>,
    pub player2_username: Option<String>,
}
