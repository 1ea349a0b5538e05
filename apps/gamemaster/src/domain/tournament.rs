//! Single-elimination bracket with a third-place play.
//!
//! Registration fills the bracket; once full, registrants are shuffled and
//! paired. Every play must be confirmed by a worker before its result is
//! accepted. Draws are re-paired on the spot. A round is complete when none
//! of its plays are pending or active; with two winners left the bracket
//! enters its finals, where the two previous losers play for third place.

use std::collections::BTreeMap;

use protocol::{GameType, Phase, PlayId, PlayerId, TournamentId};
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info};

use super::errors::TournamentError;
use super::ids::IdIssuer;
use super::play::Play;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    WaitingForPlayers,
    BeforeRoundStart,
    RoundInProgress,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TournamentInfo {
    pub id: TournamentId,
    pub registered_players_count: usize,
    #[serde(rename = "participants_num")]
    pub max_players: usize,
    pub gametype: GameType,
    pub creator_id: PlayerId,
}

#[derive(Debug, Clone)]
pub struct Tournament {
    id: TournamentId,
    max_players: usize,
    game_type: GameType,
    creator_id: PlayerId,
    state: TournamentState,

    player_ids: Vec<PlayerId>,
    active_players: Vec<PlayerId>,

    pending: BTreeMap<PlayId, Play>,
    active: BTreeMap<PlayId, Play>,
    completed: Vec<Play>,

    round_winners: Vec<PlayerId>,
    round_losers: Vec<PlayerId>,
    draw_pool: Vec<Play>,

    is_finals: bool,
    resolving_draws: bool,
}

fn valid_size(max_players: usize) -> bool {
    max_players >= 4 && max_players.is_power_of_two()
}

impl Tournament {
    pub fn new(
        id: TournamentId,
        max_players: usize,
        game_type: GameType,
        creator_id: PlayerId,
    ) -> Result<Self, TournamentError> {
        if !valid_size(max_players) {
            return Err(TournamentError::InvalidSize(max_players));
        }
        Ok(Self {
            id,
            max_players,
            game_type,
            creator_id,
            state: TournamentState::WaitingForPlayers,
            player_ids: Vec::with_capacity(max_players),
            active_players: Vec::new(),
            pending: BTreeMap::new(),
            active: BTreeMap::new(),
            completed: Vec::new(),
            round_winners: Vec::new(),
            round_losers: Vec::new(),
            draw_pool: Vec::new(),
            is_finals: false,
            resolving_draws: false,
        })
    }

    pub fn id(&self) -> TournamentId {
        self.id
    }

    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    pub fn info(&self) -> TournamentInfo {
        TournamentInfo {
            id: self.id,
            registered_players_count: self.player_ids.len(),
            max_players: self.max_players,
            gametype: self.game_type,
            creator_id: self.creator_id,
        }
    }

    pub fn state(&self) -> TournamentState {
        self.state
    }

    pub fn is_full(&self) -> bool {
        self.player_ids.len() == self.max_players
    }

    pub fn started(&self) -> bool {
        self.state != TournamentState::WaitingForPlayers
    }

    pub fn is_over(&self) -> bool {
        self.state == TournamentState::Finished
    }

    pub fn is_finals(&self) -> bool {
        self.is_finals
    }

    /// True while rematches of drawn plays are outstanding.
    pub fn resolving_draws(&self) -> bool {
        self.resolving_draws
    }

    pub fn is_registered(&self, player: PlayerId) -> bool {
        self.player_ids.contains(&player)
    }

    pub fn plays_to_create(&self) -> Vec<Play> {
        self.pending.values().cloned().collect()
    }

    pub fn awaiting_confirmation(&self, play_id: PlayId) -> bool {
        self.pending.contains_key(&play_id)
    }

    pub fn active_plays(&self) -> Vec<Play> {
        self.active.values().cloned().collect()
    }

    pub fn completed_plays(&self) -> &[Play] {
        &self.completed
    }

    pub fn take_completed_plays(&mut self) -> Vec<Play> {
        std::mem::take(&mut self.completed)
    }

    pub fn active_players(&self) -> &[PlayerId] {
        &self.active_players
    }

    pub fn current_play_of(&self, player: PlayerId) -> Option<&Play> {
        self.active.values().find(|play| play.involves(player))
    }

    pub fn find_active_play(&self, play_id: PlayId) -> Option<&Play> {
        self.active.get(&play_id)
    }

    /// Registers `player`; filling the last seat starts the bracket.
    pub fn register_player(
        &mut self,
        player: PlayerId,
        ids: &mut dyn IdIssuer,
    ) -> Result<(), TournamentError> {
        if self.is_registered(player) {
            return Err(TournamentError::AlreadyRegistered {
                tournament_id: self.id,
                player_id: player,
            });
        }
        if self.is_full() {
            return Err(TournamentError::Full(self.id));
        }
        self.player_ids.push(player);
        debug!(tournament_id = self.id, player_id = player, registered = self.player_ids.len(), "player registered");

        if self.is_full() {
            self.start(ids);
        }
        Ok(())
    }

    pub fn unregister_player(&mut self, player: PlayerId) -> Result<(), TournamentError> {
        if self.started() {
            return Err(TournamentError::RegistrationClosed(self.id));
        }
        let Some(index) = self.player_ids.iter().position(|p| *p == player) else {
            return Err(TournamentError::NotRegistered {
                tournament_id: self.id,
                player_id: player,
            });
        };
        self.player_ids.remove(index);
        Ok(())
    }

    /// A worker has created `play_id`.
    pub fn confirm_play_created(&mut self, play_id: PlayId) -> Result<(), TournamentError> {
        let play = self
            .pending
            .remove(&play_id)
            .ok_or(TournamentError::NotPending(play_id))?;
        self.active.insert(play_id, play);

        if self.pending.is_empty() {
            self.resolving_draws = false;
            if self.state == TournamentState::BeforeRoundStart {
                self.state = TournamentState::RoundInProgress;
            }
        }
        Ok(())
    }

    /// Applies the result of a confirmed play. Returns the players who left
    /// the bracket as a consequence.
    pub fn report_result(
        &mut self,
        play_id: PlayId,
        winner: Option<PlayerId>,
        is_draw: bool,
        ids: &mut dyn IdIssuer,
    ) -> Result<Vec<PlayerId>, TournamentError> {
        let Some(play) = self.active.get_mut(&play_id) else {
            return Err(if self.pending.contains_key(&play_id) {
                TournamentError::NotConfirmed(play_id)
            } else if self.completed.iter().any(|p| p.id == play_id) {
                TournamentError::Play(super::errors::PlayError::AlreadyResolved(play_id))
            } else {
                TournamentError::UnknownPlay(play_id)
            });
        };
        play.record_result(winner, is_draw)?;
        let Some(play) = self.active.remove(&play_id) else {
            return Err(TournamentError::UnknownPlay(play_id));
        };

        let mut eliminated = Vec::new();
        if play.is_draw() {
            debug!(tournament_id = self.id, play_id, "draw, re-pairing the same players");
            self.draw_pool.push(play.clone());
            self.resolving_draws = true;
            self.pair_draws(ids);
        } else if let (Some(winner), Some(loser)) = (play.winner(), play.loser()) {
            self.round_winners.push(winner);
            self.round_losers.push(loser);

            // Semifinal losers stay in for the third-place play.
            let keep_loser = self.active_players.len() == 4 && !self.is_finals;
            if !keep_loser {
                self.eliminate(loser, &mut eliminated);
            }
            if self.is_finals {
                self.eliminate(winner, &mut eliminated);
            }
        }
        self.completed.push(play);

        if self.pending.is_empty() && self.active.is_empty() {
            self.complete_round(ids);
        } else if !self.pending.is_empty() {
            self.state = TournamentState::BeforeRoundStart;
        }
        Ok(eliminated)
    }

    fn eliminate(&mut self, player: PlayerId, eliminated: &mut Vec<PlayerId>) {
        if let Some(index) = self.active_players.iter().position(|p| *p == player) {
            self.active_players.remove(index);
            eliminated.push(player);
        }
    }

    fn start(&mut self, ids: &mut dyn IdIssuer) {
        self.round_winners = self.player_ids.clone();
        self.active_players = self.player_ids.clone();
        self.pair_round(ids);
        self.state = TournamentState::BeforeRoundStart;
        info!(tournament_id = self.id, players = self.max_players, "tournament full, bracket started");
    }

    fn complete_round(&mut self, ids: &mut dyn IdIssuer) {
        self.resolving_draws = false;
        if self.is_finals {
            debug_assert_eq!(self.round_winners.len(), 2);
            self.state = TournamentState::Finished;
            info!(tournament_id = self.id, plays = self.completed.len(), "tournament finished");
            return;
        }
        self.is_finals = self.round_winners.len() == 2;
        self.pair_round(ids);
        self.state = TournamentState::BeforeRoundStart;
        debug!(tournament_id = self.id, finals = self.is_finals, "round complete, next round paired");
    }

    fn new_play(&self, ids: &mut dyn IdIssuer, player1: PlayerId, player2: PlayerId, phase: Option<Phase>) -> Play {
        let id = ids.next_play_id(self.game_type);
        Play::in_tournament(id, player1, player2, self.game_type, self.id, phase)
    }

    fn pair_round(&mut self, ids: &mut dyn IdIssuer) {
        let mut winners = std::mem::take(&mut self.round_winners);
        winners.shuffle(&mut rand::rng());

        let mut phase = None;
        if self.is_finals {
            let losers = std::mem::take(&mut self.round_losers);
            debug_assert_eq!(losers.len(), 2);
            if let [first, second] = losers[..] {
                let play = self.new_play(ids, first, second, Some(Phase::ThirdPlace));
                self.pending.insert(play.id, play);
            }
            phase = Some(Phase::Final);
        }
        if winners.len() == 4 {
            phase = Some(Phase::Semifinal);
        }

        for pair in winners.chunks_exact(2) {
            let play = self.new_play(ids, pair[0], pair[1], phase);
            self.pending.insert(play.id, play);
        }
        self.round_losers.clear();
    }

    /// Rematches keep the phase of the drawn play.
    fn pair_draws(&mut self, ids: &mut dyn IdIssuer) {
        for drawn in std::mem::take(&mut self.draw_pool) {
            let play = self.new_play(ids, drawn.player1, drawn.player2, drawn.phase);
            self.pending.insert(play.id, play);
        }
    }
}
