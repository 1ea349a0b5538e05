//! The single orchestration object of a gamemaster process.
//!
//! Owns both registers and every piece of per-player bookkeeping. All
//! mutation happens through `&mut self`; the web layer keeps it behind one
//! mutex and never holds that lock across an await.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use protocol::{
    CreatePlayRequest, CreateTournament, GameType, PlayId, PlayResultReport, PlayerId,
    PracticeJoin, TournamentId, TournamentRegistration,
};
use tracing::{debug, info, warn};

use super::errors::RegisterError;
use super::history::HistorySink;
use super::practice_register::PracticeRegister;
use super::tournament_register::TournamentRegister;
use crate::domain::{IdIssuer, Play, PlayRecord, TournamentInfo};

/// What the orchestrator remembers about a player between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerSession {
    pub username: Option<String>,
    /// `Authorization` header forwarded with the hand-off request.
    pub authorization: Option<String>,
    pub ui_url: Option<String>,
}

/// A play waiting to be pushed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHandoff {
    pub game_type: GameType,
    pub request: CreatePlayRequest,
    pub authorization: Option<String>,
}

impl PendingHandoff {
    pub fn play_id(&self) -> PlayId {
        self.request.play_id
    }
}

/// Result of [`GameManager::drain_finished`].
#[derive(Debug, Default, Clone)]
pub struct Retired {
    pub tournaments: Vec<TournamentInfo>,
    pub plays: Vec<Play>,
}

/// Game types the bundled playmaster rule book can host.
pub const DEFAULT_HOSTED_GAME_TYPES: [GameType; 1] = [GameType::TicTacToe];

pub struct GameManager {
    hosted: BTreeSet<GameType>,
    practice: PracticeRegister,
    tournaments: TournamentRegister,
    sessions: HashMap<PlayerId, PlayerSession>,
    player_play: HashMap<PlayerId, PlayId>,
    play_host: HashMap<PlayId, String>,
    workers: Vec<String>,
    ids: Box<dyn IdIssuer>,
    history: Arc<dyn HistorySink>,
}

impl GameManager {
    pub fn new(ids: Box<dyn IdIssuer>, history: Arc<dyn HistorySink>) -> Self {
        Self {
            hosted: DEFAULT_HOSTED_GAME_TYPES.into_iter().collect(),
            practice: PracticeRegister::new(),
            tournaments: TournamentRegister::new(),
            sessions: HashMap::new(),
            player_play: HashMap::new(),
            play_host: HashMap::new(),
            workers: Vec::new(),
            ids,
            history,
        }
    }

    /// Replaces the set of game types workers are able to host.
    pub fn with_hosted_game_types(mut self, hosted: impl IntoIterator<Item = GameType>) -> Self {
        self.hosted = hosted.into_iter().collect();
        self
    }

    pub fn hosts(&self, game_type: GameType) -> bool {
        self.hosted.contains(&game_type)
    }

    // A play of an unhosted type would never be accepted by a worker and
    // would pin both players in the pending set.
    fn ensure_hosted(&self, game_type: GameType) -> Result<(), RegisterError> {
        if self.hosts(game_type) {
            Ok(())
        } else {
            Err(RegisterError::UnsupportedGameType(game_type))
        }
    }

    pub fn set_workers(&mut self, urls: Vec<String>) {
        info!(workers = urls.len(), "playmaster membership changed");
        self.workers = urls;
    }

    pub fn workers(&self) -> &[String] {
        &self.workers
    }

    pub fn session(&self, player: PlayerId) -> Option<&PlayerSession> {
        self.sessions.get(&player)
    }

    /// Queued or registered anywhere, or in an unfinished play.
    pub fn player_exists(&self, player: PlayerId) -> bool {
        self.practice.contains(player) || self.tournaments.contains(player)
    }

    fn remember(&mut self, player: PlayerId, username: Option<String>, authorization: Option<String>, ui_url: Option<String>) {
        self.sessions.insert(
            player,
            PlayerSession {
                username,
                authorization,
                ui_url,
            },
        );
    }

    pub fn join_practice(
        &mut self,
        join: PracticeJoin,
        authorization: Option<String>,
    ) -> Result<Vec<PlayId>, RegisterError> {
        self.ensure_hosted(join.game_type)?;
        if self.player_exists(join.player_id) {
            return Err(RegisterError::PlayerBusy(join.player_id));
        }
        self.practice.enqueue(join.player_id, join.game_type)?;
        self.remember(join.player_id, Some(join.username), authorization, join.ui_url);
        debug!(player_id = join.player_id, gametype = %join.game_type, "joined practice queue");
        Ok(self.practice.pair_waiting(self.ids.as_mut()))
    }

    pub fn leave_practice(&mut self, player: PlayerId) -> Result<(), RegisterError> {
        self.practice.leave(player)?;
        self.sessions.remove(&player);
        Ok(())
    }

    pub fn create_tournament(
        &mut self,
        request: CreateTournament,
    ) -> Result<TournamentInfo, RegisterError> {
        self.ensure_hosted(request.game_type)?;
        self.tournaments.create(
            request.max_players,
            request.game_type,
            request.creator_id,
            self.ids.as_mut(),
        )
    }

    pub fn register_in_tournament(
        &mut self,
        registration: TournamentRegistration,
        authorization: Option<String>,
    ) -> Result<(), RegisterError> {
        let player = registration.player_id;
        if self.player_exists(player) {
            return Err(RegisterError::PlayerBusy(player));
        }
        // Cached first: filling the bracket produces plays that need it.
        self.remember(player, registration.username, authorization, registration.ui_url);
        if let Err(e) = self
            .tournaments
            .register(player, registration.tournament_id, self.ids.as_mut())
        {
            self.sessions.remove(&player);
            return Err(e);
        }
        Ok(())
    }

    pub fn unregister_from_tournament(
        &mut self,
        player: PlayerId,
    ) -> Result<TournamentId, RegisterError> {
        let tournament_id = self.tournaments.unregister(player)?;
        self.sessions.remove(&player);
        Ok(tournament_id)
    }

    pub fn open_tournaments(&self, game_type: Option<GameType>) -> Vec<TournamentInfo> {
        self.tournaments.open_infos(game_type)
    }

    /// Every play still waiting for a worker, with the hand-off body built.
    pub fn pending_handoffs(&self) -> Vec<PendingHandoff> {
        self.practice
            .plays_to_create()
            .into_iter()
            .chain(self.tournaments.plays_to_create())
            .map(|play| self.handoff_for(&play))
            .collect()
    }

    fn handoff_for(&self, play: &Play) -> PendingHandoff {
        let first = self.sessions.get(&play.player1);
        let second = self.sessions.get(&play.player2);
        PendingHandoff {
            game_type: play.game_type,
            request: CreatePlayRequest {
                play_id: play.id,
                player1_id: play.player1,
                player2_id: play.player2,
                player1_username: first.and_then(|s| s.username.clone()),
                player2_username: second.and_then(|s| s.username.clone()),
                tournament_id: play.tournament_id,
                phase: play.phase,
                player1_ui_url: first.and_then(|s| s.ui_url.clone()),
                player2_ui_url: second.and_then(|s| s.ui_url.clone()),
            },
            authorization: first.and_then(|s| s.authorization.clone()),
        }
    }

    pub fn awaiting_confirmation(&self, play_id: PlayId) -> bool {
        self.practice.awaiting_confirmation(play_id) || self.tournaments.awaiting_confirmation(play_id)
    }

    /// Marks a play as created on some worker.
    pub fn confirm_play_created(&mut self, play_id: PlayId) -> Result<(), RegisterError> {
        if self.practice.awaiting_confirmation(play_id) {
            let play = self.practice.confirm_play_created(play_id)?;
            let players = play.players();
            // Practice plays need no forwarded credentials after creation.
            for player in players {
                if let Some(session) = self.sessions.get_mut(&player) {
                    session.authorization = None;
                }
            }
            Ok(())
        } else {
            self.tournaments.confirm_play_created(play_id)
        }
    }

    /// A worker at `worker_url` answered the hand-off with `201 Created`.
    pub fn confirm_handoff(&mut self, play_id: PlayId, worker_url: &str) -> Result<(), RegisterError> {
        match self.confirm_play_created(play_id) {
            Ok(()) => {}
            Err(RegisterError::NotAwaitingConfirmation(_)) if self.find_active_play(play_id).is_some() => {
                debug!(play_id, "play was already confirmed by the worker");
            }
            Err(e) => return Err(e),
        }
        let Some(players) = self.find_active_play(play_id).map(Play::players) else {
            return Err(RegisterError::UnknownPlay(play_id));
        };
        for player in players {
            self.player_play.insert(player, play_id);
        }
        self.play_host.insert(play_id, worker_url.to_string());
        info!(play_id, worker = %worker_url, "play handed off");
        Ok(())
    }

    /// Ingests a finished play reported by its worker.
    pub fn record_result(&mut self, report: PlayResultReport) -> Result<Retired, RegisterError> {
        let play_id = report.play_id;
        let Some(play) = self.find_active_play(play_id).cloned() else {
            return Err(if self.awaiting_confirmation(play_id) {
                RegisterError::NotConfirmed(play_id)
            } else {
                RegisterError::UnknownPlay(play_id)
            });
        };

        match play.tournament_id {
            None => {
                self.practice
                    .record_result(play_id, report.winner_id, report.is_draw)?;
                for player in play.players() {
                    if let Some(session) = self.sessions.get_mut(&player) {
                        session.ui_url = None;
                    }
                }
            }
            Some(tournament_id) => {
                let eliminated = self.tournaments.record_result(
                    tournament_id,
                    play_id,
                    report.winner_id,
                    report.is_draw,
                    self.ids.as_mut(),
                )?;
                for player in eliminated {
                    debug!(player_id = player, tournament_id, "player left the bracket");
                    self.sessions.remove(&player);
                }
            }
        }

        for player in play.players() {
            if self.player_play.get(&player) == Some(&play_id) {
                self.player_play.remove(&player);
            }
        }
        self.play_host.remove(&play_id);
        info!(play_id, winner_id = report.winner_id, is_draw = report.is_draw, "play result recorded");

        Ok(self.drain_finished())
    }

    /// Removes finished tournaments and practice plays from memory and
    /// hands them to the history sink.
    pub fn drain_finished(&mut self) -> Retired {
        let mut retired = Retired::default();
        for finished in self.tournaments.take_finished() {
            retired.tournaments.push(finished.info);
            retired.plays.extend(finished.plays);
        }
        let practice = self.practice.take_finished();
        for play in &practice {
            for player in play.players() {
                if !self.player_exists(player) {
                    self.sessions.remove(&player);
                }
            }
        }
        retired.plays.extend(practice);

        if !retired.tournaments.is_empty() || !retired.plays.is_empty() {
            self.history.record(&retired.tournaments, &retired.plays);
        }
        retired
    }

    pub fn find_active_play(&self, play_id: PlayId) -> Option<&Play> {
        self.practice
            .find_active_play(play_id)
            .or_else(|| self.tournaments.find_active_play(play_id))
    }

    pub fn current_play_of(&self, player: PlayerId) -> Option<&Play> {
        self.practice
            .current_play_of(player)
            .or_else(|| self.tournaments.current_play_of(player))
    }

    /// Active plays with cached usernames filled in.
    pub fn active_plays(&self) -> Vec<PlayRecord> {
        self.practice
            .active_plays()
            .into_iter()
            .chain(self.tournaments.active_plays())
            .map(|mut play| {
                let username = |p: PlayerId| self.sessions.get(&p).and_then(|s| s.username.clone());
                play.set_usernames(username(play.player1), username(play.player2));
                play.record()
            })
            .collect()
    }

    pub fn host_of_play(&self, play_id: PlayId) -> Option<&str> {
        self.play_host.get(&play_id).map(String::as_str)
    }

    pub fn host_of_player_play(&self, player: PlayerId) -> Option<&str> {
        let play_id = self.player_play.get(&player)?;
        self.host_of_play(*play_id)
    }

    /// Re-points known plays at `url` after a worker took over a session.
    /// Unknown play ids are ignored. Returns how many plays moved.
    pub fn record_host_ownership(&mut self, url: &str, play_ids: &[PlayId]) -> usize {
        let mut moved = 0;
        for play_id in play_ids {
            match self.play_host.get_mut(play_id) {
                Some(host) => {
                    *host = url.to_string();
                    moved += 1;
                }
                None => warn!(play_id, worker = %url, "host ownership for an unknown play"),
            }
        }
        info!(worker = %url, moved, "host ownership recorded");
        moved
    }
}
