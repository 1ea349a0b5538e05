//! Hosting of plays: registration, moves, spectators, persistence into the
//! held session and reporting back to the gamemaster.
//!
//! Session writes are submitted while the registry lock is held so that
//! the persisted order matches the in-memory order. Network calls never
//! run under the lock.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use coordination::retry::retry_delay;
use coordination::{PersistError, SessionCoordinator, SessionSnapshot, SessionStore};
use futures::future::join_all;
use parking_lot::Mutex;
use protocol::{CreatePlayRequest, GameType, HostOwnership, PlayId, PlayResultReport, PlayerId};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::gamemaster_client::{GamemasterClient, ReportError};
use super::play_manager::{PlayManager, PlayManagerError, PlayManagerState};
use super::ui_notifier::UiNotifier;
use crate::games::{Game, GameError, MoveError, RuleBook};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("play session is not active yet")]
    NotActive,
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error(transparent)]
    Registry(#[from] PlayManagerError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// A move request after routing.
#[derive(Debug, Clone)]
pub struct MoveCommand {
    pub play_id: PlayId,
    pub player_id: PlayerId,
    pub mv: Value,
    /// UI service the mover is using now, when it changed.
    pub ui_url: Option<String>,
    pub authorization: Option<String>,
}

pub struct GameHost {
    manager: Mutex<PlayManager>,
    rules: RuleBook,
    session: Arc<SessionCoordinator>,
    store: SessionStore,
    gamemaster: Arc<dyn GamemasterClient>,
    notifier: Arc<dyn UiNotifier>,
    /// Directory URL of this worker, reported after recovering a session.
    self_url: String,
}

impl GameHost {
    /// Must be called inside a Tokio runtime; the session writer is spawned here.
    pub fn new(
        session: Arc<SessionCoordinator>,
        rules: RuleBook,
        gamemaster: Arc<dyn GamemasterClient>,
        notifier: Arc<dyn UiNotifier>,
        self_url: impl Into<String>,
    ) -> Self {
        Self {
            manager: Mutex::new(PlayManager::new()),
            rules,
            store: session.store(),
            session,
            gamemaster,
            notifier,
            self_url: self_url.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn session(&self) -> &SessionCoordinator {
        &self.session
    }

    fn ensure_active(&self) -> Result<(), HostError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(HostError::NotActive)
        }
    }

    pub fn hosted_plays(&self) -> Vec<PlayId> {
        self.manager.lock().play_ids()
    }

    /// Waits until every session write submitted so far has been applied.
    pub async fn flush(&self) -> Result<(), HostError> {
        Ok(self.store.flush().await?)
    }

    /// Creates a play handed off by the gamemaster and returns its path.
    pub fn register(
        &self,
        game_type: GameType,
        request: CreatePlayRequest,
        authorization: Option<String>,
    ) -> Result<String, HostError> {
        self.ensure_active()?;
        let play_id = request.play_id;
        let game = self.rules.create(game_type, &request)?;
        let state = game.to_state();
        let view = game.view();

        let recipients = {
            let mut manager = self.manager.lock();
            manager.register(game, [request.player1_ui_url, request.player2_ui_url])?;
            self.store.create_game(play_id, &state)?;
            self.store.update_play_manager(&manager.snapshot())?;
            manager.recipients(play_id)
        };

        info!(
            play_id,
            %game_type,
            player1_id = request.player1_id,
            player2_id = request.player2_id,
            "play registered"
        );
        self.broadcast(view, true, recipients, authorization);
        Ok(format!("/playmaster/games/{play_id}"))
    }

    pub fn game_view(&self, play_id: PlayId) -> Result<Value, HostError> {
        self.ensure_active()?;
        Ok(self.manager.lock().game(play_id)?.view())
    }

    pub fn player_game_view(&self, player_id: PlayerId) -> Result<Value, HostError> {
        self.ensure_active()?;
        Ok(self.manager.lock().game_of_player(player_id)?.view())
    }

    /// Applies a move and returns the new view. A finishing move frees the
    /// players at once; the result is reported in the background.
    pub fn play_move(&self, command: MoveCommand) -> Result<Value, HostError> {
        self.ensure_active()?;
        let MoveCommand {
            play_id,
            player_id,
            mv,
            ui_url,
            authorization,
        } = command;

        let (view, recipients, outcome) = {
            let mut manager = self.manager.lock();
            let game = manager.game_mut(play_id)?;
            game.apply_move(player_id, &mv)?;
            let view = game.view();
            let outcome = game.is_over().then(|| result_of(&**game));
            self.store.update_game(play_id, &game.to_state())?;

            let url_changed = ui_url
                .as_deref()
                .is_some_and(|url| manager.set_player_ui_url(player_id, url));
            let recipients = manager.recipients(play_id);
            if outcome.is_some() {
                manager.remove(play_id);
            }
            if outcome.is_some() || url_changed {
                self.store.update_play_manager(&manager.snapshot())?;
            }
            (view, recipients, outcome)
        };

        self.broadcast(view.clone(), false, recipients, authorization);
        if let Some(report) = outcome {
            info!(
                play_id,
                winner_id = ?report.winner_id,
                is_draw = report.is_draw,
                "play finished"
            );
            self.spawn_result_report(report);
        }
        Ok(view)
    }

    /// Registers a spectating UI and returns the current view.
    pub fn add_spectator(&self, play_id: PlayId, ui_url: &str) -> Result<Value, HostError> {
        self.ensure_active()?;
        let mut manager = self.manager.lock();
        if manager.add_spectator(play_id, ui_url)? {
            self.store.update_play_manager(&manager.snapshot())?;
        }
        Ok(manager.game(play_id)?.view())
    }

    pub fn remove_spectator(&self, play_id: PlayId, ui_url: &str) -> Result<bool, HostError> {
        self.ensure_active()?;
        let mut manager = self.manager.lock();
        let removed = manager.remove_spectator(play_id, ui_url);
        if removed {
            self.store.update_play_manager(&manager.snapshot())?;
        }
        Ok(removed)
    }

    /// Replaces the registry with a claimed session. Games that finished
    /// before the previous owner could report them are reported again; a
    /// recovered session is announced to the gamemaster.
    pub fn load(&self, snapshot: SessionSnapshot<PlayManagerState>) -> Result<Vec<PlayId>, HostError> {
        let SessionSnapshot {
            session_dir,
            state,
            games,
            recovered,
        } = snapshot;

        let mut hosted: Vec<Box<dyn Game>> = Vec::new();
        let mut finished = Vec::new();
        for (node, persisted) in &games {
            match self.rules.restore(persisted) {
                Ok(game) if game.is_over() => finished.push(result_of(&*game)),
                Ok(game) => hosted.push(game),
                Err(e) => warn!(node = %node, error = %e, "skipping unreadable game"),
            }
        }

        let play_ids = {
            let mut manager = self.manager.lock();
            manager.restore(state, hosted);
            if recovered {
                self.store.update_play_manager(&manager.snapshot())?;
            }
            manager.play_ids()
        };

        info!(
            session_dir = %session_dir,
            recovered,
            plays = play_ids.len(),
            unreported = finished.len(),
            "session state loaded"
        );
        for report in finished {
            self.spawn_result_report(report);
        }
        if recovered {
            self.spawn_ownership_report(play_ids.clone());
        }
        Ok(play_ids)
    }

    fn broadcast(
        &self,
        mut view: Value,
        is_new: bool,
        recipients: BTreeSet<String>,
        authorization: Option<String>,
    ) {
        if recipients.is_empty() {
            return;
        }
        if let Some(fields) = view.as_object_mut() {
            fields.insert("isNew".to_string(), Value::Bool(is_new));
        }
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let sends = recipients
                .iter()
                .map(|url| notifier.notify(url, &view, authorization.as_deref()));
            join_all(sends).await;
        });
    }

    fn spawn_result_report(&self, report: PlayResultReport) {
        let gamemaster = self.gamemaster.clone();
        let session = self.session.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let delivered = deliver("play result", &session, || gamemaster.report_result(&report)).await;
            match delivered {
                Ok(()) => {}
                Err(e) if e.is_retryable() => {
                    warn!(play_id = report.play_id, error = %e, "result left in the session for the next owner");
                    return;
                }
                Err(e) => {
                    error!(play_id = report.play_id, error = %e, "gamemaster refused play result");
                }
            }
            if let Err(e) = store.remove_game(report.play_id) {
                error!(play_id = report.play_id, error = %e, "could not remove finished game");
            }
        });
    }

    fn spawn_ownership_report(&self, play_ids: Vec<PlayId>) {
        let gamemaster = self.gamemaster.clone();
        let session = self.session.clone();
        let ownership = HostOwnership {
            url: self.self_url.clone(),
            play_ids,
        };
        tokio::spawn(async move {
            if let Err(e) = deliver("host ownership", &session, || {
                gamemaster.report_host_ownership(&ownership)
            })
            .await
            {
                warn!(error = %e, "host ownership not delivered");
            }
        });
    }
}

fn result_of(game: &dyn Game) -> PlayResultReport {
    PlayResultReport {
        play_id: game.play_id(),
        winner_id: game.winner(),
        is_draw: game.is_draw(),
    }
}

/// Retries `send` with backoff while the failure is retryable and the
/// session is still ours.
async fn deliver<F, Fut>(what: &str, session: &SessionCoordinator, mut send: F) -> Result<(), ReportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ReportError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match send().await {
            Ok(()) => {
                info!(what, attempt, "delivered to gamemaster");
                return Ok(());
            }
            Err(e) if e.is_retryable() && session.is_active() => {
                let delay = retry_delay(attempt);
                warn!(
                    what,
                    error = %e,
                    attempt,
                    retry_delay_ms = delay.as_millis() as u64,
                    "gamemaster delivery failed, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
