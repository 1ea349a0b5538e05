//! Open, started and finished tournaments, plus the player → tournament
//! index used for the cross-register busy check.

use std::collections::{BTreeMap, HashMap};

use protocol::{GameType, PlayId, PlayerId, TournamentId};
use tracing::info;

use super::errors::RegisterError;
use crate::domain::{IdIssuer, Play, Tournament, TournamentInfo};

/// A retired bracket handed to the history sink.
#[derive(Debug, Clone)]
pub struct FinishedTournament {
    pub info: TournamentInfo,
    pub plays: Vec<Play>,
}

#[derive(Debug, Default)]
pub struct TournamentRegister {
    open: BTreeMap<TournamentId, Tournament>,
    started: BTreeMap<TournamentId, Tournament>,
    finished: BTreeMap<TournamentId, Tournament>,
    players: HashMap<PlayerId, TournamentId>,
}

impl TournamentRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered in an open tournament or still active in a started one.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }

    pub fn tournament_of(&self, player: PlayerId) -> Option<TournamentId> {
        self.players.get(&player).copied()
    }

    pub fn create(
        &mut self,
        max_players: usize,
        game_type: GameType,
        creator: PlayerId,
        ids: &mut dyn IdIssuer,
    ) -> Result<TournamentInfo, RegisterError> {
        let id = ids.next_tournament_id();
        let tournament = Tournament::new(id, max_players, game_type, creator)?;
        let info = tournament.info();
        self.open.insert(id, tournament);
        info!(tournament_id = id, max_players, %game_type, creator_id = creator, "tournament created");
        Ok(info)
    }

    pub fn register(
        &mut self,
        player: PlayerId,
        tournament_id: TournamentId,
        ids: &mut dyn IdIssuer,
    ) -> Result<(), RegisterError> {
        if self.contains(player) {
            return Err(RegisterError::PlayerBusy(player));
        }
        let tournament = self
            .open
            .get_mut(&tournament_id)
            .ok_or(RegisterError::TournamentNotOpen(tournament_id))?;
        tournament.register_player(player, ids)?;
        self.players.insert(player, tournament_id);

        if tournament.started() {
            if let Some(tournament) = self.open.remove(&tournament_id) {
                self.started.insert(tournament_id, tournament);
            }
        }
        Ok(())
    }

    pub fn unregister(&mut self, player: PlayerId) -> Result<TournamentId, RegisterError> {
        let tournament_id = self
            .tournament_of(player)
            .ok_or(RegisterError::NotInTournament(player))?;
        match self.open.get_mut(&tournament_id) {
            Some(tournament) => tournament.unregister_player(player)?,
            None => {
                return Err(RegisterError::Tournament(
                    crate::domain::TournamentError::RegistrationClosed(tournament_id),
                ))
            }
        }
        self.players.remove(&player);
        Ok(tournament_id)
    }

    pub fn open_infos(&self, game_type: Option<GameType>) -> Vec<TournamentInfo> {
        self.open
            .values()
            .filter(|t| game_type.map_or(true, |wanted| wanted == t.game_type()))
            .map(Tournament::info)
            .collect()
    }

    pub fn plays_to_create(&self) -> Vec<Play> {
        self.started
            .values()
            .flat_map(Tournament::plays_to_create)
            .collect()
    }

    pub fn awaiting_confirmation(&self, play_id: PlayId) -> bool {
        self.started
            .values()
            .any(|t| t.awaiting_confirmation(play_id))
    }

    pub fn confirm_play_created(&mut self, play_id: PlayId) -> Result<(), RegisterError> {
        let tournament = self
            .started
            .values_mut()
            .find(|t| t.awaiting_confirmation(play_id))
            .ok_or(RegisterError::NotAwaitingConfirmation(play_id))?;
        tournament.confirm_play_created(play_id)?;
        Ok(())
    }

    /// Applies a result; returns the players who left their bracket.
    pub fn record_result(
        &mut self,
        tournament_id: TournamentId,
        play_id: PlayId,
        winner: Option<PlayerId>,
        is_draw: bool,
        ids: &mut dyn IdIssuer,
    ) -> Result<Vec<PlayerId>, RegisterError> {
        let tournament = self
            .started
            .get_mut(&tournament_id)
            .ok_or(RegisterError::UnknownPlay(play_id))?;
        let eliminated = tournament.report_result(play_id, winner, is_draw, ids)?;
        for player in &eliminated {
            self.players.remove(player);
        }

        if tournament.is_over() {
            if let Some(tournament) = self.started.remove(&tournament_id) {
                self.finished.insert(tournament_id, tournament);
            }
        }
        Ok(eliminated)
    }

    pub fn active_plays(&self) -> Vec<Play> {
        self.started
            .values()
            .flat_map(Tournament::active_plays)
            .collect()
    }

    pub fn find_active_play(&self, play_id: PlayId) -> Option<&Play> {
        self.started
            .values()
            .find_map(|t| t.find_active_play(play_id))
    }

    pub fn current_play_of(&self, player: PlayerId) -> Option<&Play> {
        let tournament_id = self.tournament_of(player)?;
        self.started.get(&tournament_id)?.current_play_of(player)
    }

    pub fn has_finished(&self) -> bool {
        !self.finished.is_empty()
    }

    pub fn take_finished(&mut self) -> Vec<FinishedTournament> {
        std::mem::take(&mut self.finished)
            .into_values()
            .map(|mut tournament| FinishedTournament {
                info: tournament.info(),
                plays: tournament.take_completed_plays(),
            })
            .collect()
    }
}
