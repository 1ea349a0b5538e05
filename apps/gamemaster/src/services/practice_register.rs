//! Per-game-type practice queues paired two at a time.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use protocol::{GameType, PlayId, PlayerId};
use tracing::debug;

use super::errors::RegisterError;
use crate::domain::{IdIssuer, Play};

#[derive(Debug, Default)]
pub struct PracticeRegister {
    queues: BTreeMap<GameType, VecDeque<PlayerId>>,
    queued: HashMap<PlayerId, GameType>,
    playing: HashSet<PlayerId>,
    pending: BTreeMap<PlayId, Play>,
    active: BTreeMap<PlayId, Play>,
    finished: Vec<Play>,
}

impl PracticeRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued, or in a practice play that has not finished yet.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.queued.contains_key(&player) || self.playing.contains(&player)
    }

    pub fn queue_len(&self, game_type: GameType) -> usize {
        self.queues.get(&game_type).map_or(0, VecDeque::len)
    }

    pub fn enqueue(&mut self, player: PlayerId, game_type: GameType) -> Result<(), RegisterError> {
        if self.contains(player) {
            return Err(RegisterError::PlayerBusy(player));
        }
        self.queued.insert(player, game_type);
        self.queues.entry(game_type).or_default().push_back(player);
        Ok(())
    }

    /// Takes a waiting player out of its queue. Players already paired
    /// cannot leave.
    pub fn leave(&mut self, player: PlayerId) -> Result<GameType, RegisterError> {
        let game_type = self
            .queued
            .remove(&player)
            .ok_or(RegisterError::NotQueued(player))?;
        if let Some(queue) = self.queues.get_mut(&game_type) {
            queue.retain(|p| *p != player);
        }
        Ok(game_type)
    }

    /// Drains every queue by twos. Returns the ids of the new plays.
    pub fn pair_waiting(&mut self, ids: &mut dyn IdIssuer) -> Vec<PlayId> {
        let mut created = Vec::new();
        for (game_type, queue) in self.queues.iter_mut() {
            while queue.len() >= 2 {
                let (Some(player1), Some(player2)) = (queue.pop_front(), queue.pop_front()) else {
                    break;
                };
                self.queued.remove(&player1);
                self.queued.remove(&player2);
                self.playing.insert(player1);
                self.playing.insert(player2);

                let play = Play::practice(ids.next_play_id(*game_type), player1, player2, *game_type);
                debug!(play_id = play.id, player1, player2, %game_type, "practice pair formed");
                created.push(play.id);
                self.pending.insert(play.id, play);
            }
        }
        created
    }

    pub fn plays_to_create(&self) -> Vec<Play> {
        self.pending.values().cloned().collect()
    }

    pub fn awaiting_confirmation(&self, play_id: PlayId) -> bool {
        self.pending.contains_key(&play_id)
    }

    pub fn confirm_play_created(&mut self, play_id: PlayId) -> Result<&Play, RegisterError> {
        let play = self
            .pending
            .remove(&play_id)
            .ok_or(RegisterError::NotAwaitingConfirmation(play_id))?;
        Ok(self.active.entry(play_id).or_insert(play))
    }

    pub fn record_result(
        &mut self,
        play_id: PlayId,
        winner: Option<PlayerId>,
        is_draw: bool,
    ) -> Result<Play, RegisterError> {
        let play = self
            .active
            .get_mut(&play_id)
            .ok_or(RegisterError::UnknownPlay(play_id))?;
        play.record_result(winner, is_draw)?;
        let Some(play) = self.active.remove(&play_id) else {
            return Err(RegisterError::UnknownPlay(play_id));
        };
        for player in play.players() {
            self.playing.remove(&player);
        }
        self.finished.push(play.clone());
        Ok(play)
    }

    pub fn active_plays(&self) -> Vec<Play> {
        self.active.values().cloned().collect()
    }

    pub fn find_active_play(&self, play_id: PlayId) -> Option<&Play> {
        self.active.get(&play_id)
    }

    pub fn current_play_of(&self, player: PlayerId) -> Option<&Play> {
        if !self.playing.contains(&player) {
            return None;
        }
        self.active.values().find(|play| play.involves(player))
    }

    pub fn has_finished(&self) -> bool {
        !self.finished.is_empty()
    }

    pub fn take_finished(&mut self) -> Vec<Play> {
        std::mem::take(&mut self.finished)
    }
}
