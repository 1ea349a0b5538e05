//! In-memory registry of the games hosted by this worker.

use std::collections::{BTreeMap, BTreeSet};

use protocol::{PlayId, PlayerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::games::Game;

/// Persisted form of the registry maps. Games are persisted separately,
/// one node per play.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayManagerState {
    #[serde(default)]
    pub player_current_game: BTreeMap<PlayerId, PlayId>,
    #[serde(default)]
    pub player_ui_url: BTreeMap<PlayerId, String>,
    #[serde(default, rename = "player_spectators")]
    pub play_spectators: BTreeMap<PlayId, BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayManagerError {
    #[error("game with id {0} already exists")]
    PlayExists(PlayId),
    #[error("player {player_id} is playing game {play_id} at the moment")]
    PlayerBusy { player_id: PlayerId, play_id: PlayId },
    #[error("game with id {0} does not exist")]
    UnknownPlay(PlayId),
    #[error("player {0} is not in any game")]
    NoCurrentGame(PlayerId),
}

#[derive(Debug, Default)]
pub struct PlayManager {
    games: BTreeMap<PlayId, Box<dyn Game>>,
    state: PlayManagerState,
}

impl PlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new game. Rejects a known play id or a player who is
    /// already in another game; nothing changes on rejection.
    pub fn register(
        &mut self,
        game: Box<dyn Game>,
        ui_urls: [Option<String>; 2],
    ) -> Result<(), PlayManagerError> {
        let play_id = game.play_id();
        if self.games.contains_key(&play_id) {
            return Err(PlayManagerError::PlayExists(play_id));
        }
        for player_id in game.players() {
            if let Some(&current) = self.state.player_current_game.get(&player_id) {
                return Err(PlayManagerError::PlayerBusy {
                    player_id,
                    play_id: current,
                });
            }
        }

        for (player_id, ui_url) in game.players().into_iter().zip(ui_urls) {
            self.state.player_current_game.insert(player_id, play_id);
            match ui_url {
                Some(url) => self.state.player_ui_url.insert(player_id, url),
                None => self.state.player_ui_url.remove(&player_id),
            };
        }
        self.games.insert(play_id, game);
        Ok(())
    }

    pub fn contains(&self, play_id: PlayId) -> bool {
        self.games.contains_key(&play_id)
    }

    pub fn game(&self, play_id: PlayId) -> Result<&dyn Game, PlayManagerError> {
        self.games
            .get(&play_id)
            .map(|game| &**game)
            .ok_or(PlayManagerError::UnknownPlay(play_id))
    }

    pub fn game_mut(&mut self, play_id: PlayId) -> Result<&mut Box<dyn Game>, PlayManagerError> {
        self.games
            .get_mut(&play_id)
            .ok_or(PlayManagerError::UnknownPlay(play_id))
    }

    pub fn game_of_player(&self, player_id: PlayerId) -> Result<&dyn Game, PlayManagerError> {
        let play_id = self
            .state
            .player_current_game
            .get(&player_id)
            .ok_or(PlayManagerError::NoCurrentGame(player_id))?;
        self.game(*play_id)
    }

    /// Drops a game together with its players and spectators.
    pub fn remove(&mut self, play_id: PlayId) -> Option<Box<dyn Game>> {
        let game = self.games.remove(&play_id)?;
        for player_id in game.players() {
            if self.state.player_current_game.get(&player_id) == Some(&play_id) {
                self.state.player_current_game.remove(&player_id);
                self.state.player_ui_url.remove(&player_id);
            }
        }
        self.state.play_spectators.remove(&play_id);
        Some(game)
    }

    pub fn player_ui_url(&self, player_id: PlayerId) -> Option<&str> {
        self.state.player_ui_url.get(&player_id).map(String::as_str)
    }

    /// Returns true when the stored URL changed.
    pub fn set_player_ui_url(&mut self, player_id: PlayerId, ui_url: &str) -> bool {
        if self.player_ui_url(player_id) == Some(ui_url) {
            return false;
        }
        self.state.player_ui_url.insert(player_id, ui_url.to_string());
        true
    }

    /// Returns true when the spectator was not yet registered.
    pub fn add_spectator(&mut self, play_id: PlayId, ui_url: &str) -> Result<bool, PlayManagerError> {
        if !self.contains(play_id) {
            return Err(PlayManagerError::UnknownPlay(play_id));
        }
        Ok(self
            .state
            .play_spectators
            .entry(play_id)
            .or_default()
            .insert(ui_url.to_string()))
    }

    /// Returns true when the spectator was registered.
    pub fn remove_spectator(&mut self, play_id: PlayId, ui_url: &str) -> bool {
        let Some(spectators) = self.state.play_spectators.get_mut(&play_id) else {
            return false;
        };
        let removed = spectators.remove(ui_url);
        if spectators.is_empty() {
            self.state.play_spectators.remove(&play_id);
        }
        removed
    }

    /// UI services to notify about a play: both players' and every spectator's.
    pub fn recipients(&self, play_id: PlayId) -> BTreeSet<String> {
        let Some(game) = self.games.get(&play_id) else {
            return BTreeSet::new();
        };
        let mut recipients: BTreeSet<String> = game
            .players()
            .iter()
            .filter_map(|player| self.state.player_ui_url.get(player).cloned())
            .collect();
        if let Some(spectators) = self.state.play_spectators.get(&play_id) {
            recipients.extend(spectators.iter().cloned());
        }
        recipients
    }

    pub fn play_ids(&self) -> Vec<PlayId> {
        self.games.keys().copied().collect()
    }

    pub fn snapshot(&self) -> PlayManagerState {
        self.state.clone()
    }

    /// Replaces everything with a recovered session. Map entries that point
    /// at games which are not hosted any more are dropped.
    pub fn restore(&mut self, mut state: PlayManagerState, games: Vec<Box<dyn Game>>) {
        let games: BTreeMap<PlayId, Box<dyn Game>> =
            games.into_iter().map(|game| (game.play_id(), game)).collect();

        state.player_current_game.retain(|player_id, play_id| {
            let hosted = games
                .get(play_id)
                .is_some_and(|game| game.has_player(*player_id));
            if !hosted {
                warn!(player_id = *player_id, play_id = *play_id, "dropping stale player entry from recovered session");
            }
            hosted
        });
        let current = &state.player_current_game;
        state.player_ui_url.retain(|player_id, _| current.contains_key(player_id));
        state.play_spectators.retain(|play_id, _| games.contains_key(play_id));

        self.games = games;
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use protocol::{CreatePlayRequest, GameType};
    use serde_json::json;

    use super::*;
    use crate::games::RuleBook;

    fn game(play_id: PlayId, p1: PlayerId, p2: PlayerId) -> Box<dyn Game> {
        RuleBook::default()
            .create(
                GameType::TicTacToe,
                &CreatePlayRequest {
                    play_id,
                    player1_id: p1,
                    player2_id: p2,
                    player1_username: None,
                    player2_username: None,
                    tournament_id: None,
                    phase: None,
                    player1_ui_url: None,
                    player2_ui_url: None,
                },
            )
            .unwrap()
    }

    fn urls(a: &str, b: &str) -> [Option<String>; 2] {
        [Some(a.to_string()), Some(b.to_string())]
    }

    #[test]
    fn registration_rejects_duplicates_and_busy_players() {
        let mut manager = PlayManager::new();
        manager.register(game(1, 10, 11), urls("http://ui-a/", "http://ui-b/")).unwrap();

        assert_eq!(
            manager.register(game(1, 20, 21), [None, None]).unwrap_err(),
            PlayManagerError::PlayExists(1)
        );
        assert_eq!(
            manager.register(game(2, 20, 11), [None, None]).unwrap_err(),
            PlayManagerError::PlayerBusy { player_id: 11, play_id: 1 }
        );
        assert!(!manager.contains(2));
        assert!(manager.game_of_player(20).is_err());
        assert_eq!(manager.game_of_player(11).unwrap().play_id(), 1);
    }

    #[test]
    fn recipients_cover_players_and_spectators() {
        let mut manager = PlayManager::new();
        manager.register(game(1, 10, 11), [Some("http://ui-a/".into()), None]).unwrap();
        assert!(manager.add_spectator(1, "http://ui-c/").unwrap());
        assert!(!manager.add_spectator(1, "http://ui-c/").unwrap());
        assert_eq!(
            manager.add_spectator(9, "http://ui-c/").unwrap_err(),
            PlayManagerError::UnknownPlay(9)
        );

        let recipients: Vec<String> = manager.recipients(1).into_iter().collect();
        assert_eq!(recipients, vec!["http://ui-a/", "http://ui-c/"]);

        assert!(manager.remove_spectator(1, "http://ui-c/"));
        assert!(!manager.remove_spectator(1, "http://ui-c/"));
        assert!(manager.snapshot().play_spectators.is_empty());
    }

    #[test]
    fn removing_a_game_frees_its_players() {
        let mut manager = PlayManager::new();
        manager.register(game(1, 10, 11), urls("http://ui-a/", "http://ui-b/")).unwrap();
        manager.add_spectator(1, "http://ui-c/").unwrap();

        assert!(manager.remove(1).is_some());
        assert!(manager.remove(1).is_none());
        assert_eq!(manager.snapshot(), PlayManagerState::default());
        manager.register(game(2, 10, 11), [None, None]).unwrap();
    }

    #[test]
    fn snapshot_serializes_with_string_keys() {
        let mut manager = PlayManager::new();
        manager.register(game(4, 10, 11), urls("http://ui-a/", "http://ui-b/")).unwrap();
        manager.add_spectator(4, "http://ui-c/").unwrap();

        let value = serde_json::to_value(manager.snapshot()).unwrap();
        assert_eq!(value["player_current_game"], json!({"10": 4, "11": 4}));
        assert_eq!(value["player_spectators"], json!({"4": ["http://ui-c/"]}));

        let back: PlayManagerState = serde_json::from_value(value).unwrap();
        assert_eq!(back, manager.snapshot());
    }

    #[test]
    fn restore_drops_entries_without_a_hosted_game() {
        let mut state = PlayManagerState::default();
        state.player_current_game.insert(10, 1);
        state.player_current_game.insert(11, 1);
        state.player_current_game.insert(12, 2);
        state.player_ui_url.insert(12, "http://ui-x/".into());
        state.play_spectators.insert(2, BTreeSet::from(["http://ui-y/".to_string()]));

        let mut manager = PlayManager::new();
        manager.restore(state, vec![game(1, 10, 11)]);

        assert_eq!(manager.play_ids(), vec![1]);
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.player_current_game.len(), 2);
        assert!(snapshot.player_ui_url.is_empty());
        assert!(snapshot.play_spectators.is_empty());
        assert!(matches!(
            manager.game_of_player(12),
            Err(PlayManagerError::NoCurrentGame(12))
        ));
    }
}
