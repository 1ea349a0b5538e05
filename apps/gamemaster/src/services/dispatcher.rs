//! Background hand-off of pending plays to workers.
//!
//! One task per process. It wakes on every manager change and on a retry
//! tick, snapshots the pending plays under the manager lock, offers them to
//! workers concurrently without the lock, then re-locks to record
//! confirmations.

use std::sync::Arc;
use std::time::Duration;

use coordination::ConnectionGate;
use futures::future::join_all;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::game_manager::{GameManager, PendingHandoff};
use super::handoff::{HandoffError, WorkerClient};

/// Outcome of one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub confirmed: usize,
    pub deferred: usize,
}

#[derive(Clone)]
pub struct Dispatcher {
    manager: Arc<Mutex<GameManager>>,
    client: Arc<dyn WorkerClient>,
    gate: ConnectionGate,
    wake: Arc<Notify>,
    retry_every: Duration,
}

fn pick_worker(workers: &[String]) -> Option<&str> {
    if workers.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..workers.len());
    workers.get(index).map(String::as_str)
}

impl Dispatcher {
    pub fn new(
        manager: Arc<Mutex<GameManager>>,
        client: Arc<dyn WorkerClient>,
        gate: ConnectionGate,
        wake: Arc<Notify>,
        retry_every: Duration,
    ) -> Self {
        Self {
            manager,
            client,
            gate,
            wake,
            retry_every,
        }
    }

    /// Tries to hand off every pending play once.
    pub async fn dispatch_once(&self) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !self.gate.is_open() {
            debug!("coordination connection down, hand-off deferred");
            return report;
        }

        let (pending, workers): (Vec<PendingHandoff>, Vec<String>) = {
            let manager = self.manager.lock();
            (manager.pending_handoffs(), manager.workers().to_vec())
        };
        if pending.is_empty() {
            return report;
        }

        let mut sends = Vec::with_capacity(pending.len());
        for handoff in pending {
            match pick_worker(&workers).map(str::to_owned) {
                Some(worker) => sends.push(self.send(handoff, worker)),
                None => {
                    debug!(play_id = handoff.play_id(), "no playmaster available, play stays pending");
                    report.deferred += 1;
                }
            }
        }

        for (handoff, worker, sent) in join_all(sends).await {
            match sent {
                Ok(()) => match self.manager.lock().confirm_handoff(handoff.play_id(), &worker) {
                    Ok(()) => report.confirmed += 1,
                    Err(e) => {
                        warn!(play_id = handoff.play_id(), error = %e, "hand-off confirmed for a play no longer tracked");
                        report.deferred += 1;
                    }
                },
                Err(e) => {
                    warn!(play_id = handoff.play_id(), worker = %worker, error = %e, "hand-off failed, will retry");
                    report.deferred += 1;
                }
            }
        }

        if report.confirmed > 0 || report.deferred > 0 {
            info!(confirmed = report.confirmed, deferred = report.deferred, "hand-off pass finished");
        }
        report
    }

    async fn send(
        &self,
        handoff: PendingHandoff,
        worker: String,
    ) -> (PendingHandoff, String, Result<(), HandoffError>) {
        let sent = self
            .client
            .create_play(
                &worker,
                handoff.game_type,
                &handoff.request,
                handoff.authorization.as_deref(),
            )
            .await;
        (handoff, worker, sent)
    }

    /// Runs until the task is aborted.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.retry_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = ticker.tick() => {}
            }
            self.dispatch_once().await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use protocol::{CreatePlayRequest, GameType, PracticeJoin};
    use test_support::scripted::Script;

    use super::*;
    use crate::domain::SequentialIds;
    use crate::services::history::LogHistory;

    type Call = (String, GameType, CreatePlayRequest, Option<String>);

    struct ScriptedWorkers(Script<Call, Result<(), HandoffError>>);

    #[async_trait]
    impl WorkerClient for ScriptedWorkers {
        async fn create_play(
            &self,
            worker_url: &str,
            game_type: GameType,
            request: &CreatePlayRequest,
            authorization: Option<&str>,
        ) -> Result<(), HandoffError> {
            self.0.respond((
                worker_url.to_string(),
                game_type,
                request.clone(),
                authorization.map(str::to_owned),
            ))
        }
    }

    fn setup(
        workers: &[&str],
    ) -> (Arc<Mutex<GameManager>>, Arc<ScriptedWorkers>, Dispatcher) {
        let mut manager = GameManager::new(Box::new(SequentialIds::starting_at(10, 1)), Arc::new(LogHistory));
        manager.set_workers(workers.iter().map(|w| w.to_string()).collect());
        for player in [1, 2] {
            manager
                .join_practice(
                    PracticeJoin {
                        player_id: player,
                        username: format!("p{player}"),
                        game_type: GameType::TicTacToe,
                        ui_url: None,
                    },
                    Some(format!("Bearer {player}")),
                )
                .unwrap();
        }
        let manager = Arc::new(Mutex::new(manager));
        let client = Arc::new(ScriptedWorkers(Script::new(Ok(()))));
        let dispatcher = Dispatcher::new(
            manager.clone(),
            client.clone(),
            ConnectionGate::always_open(),
            Arc::new(Notify::new()),
            Duration::from_millis(50),
        );
        (manager, client, dispatcher)
    }

    #[tokio::test]
    async fn created_plays_are_confirmed_and_routed() {
        let (manager, client, dispatcher) = setup(&["http://pm-a/playmaster/"]);

        let report = dispatcher.dispatch_once().await;
        assert_eq!(report, DispatchReport { confirmed: 1, deferred: 0 });

        let calls = client.0.calls();
        assert_eq!(calls.len(), 1);
        let (url, game_type, request, auth) = &calls[0];
        assert_eq!(url, "http://pm-a/playmaster/");
        assert_eq!(*game_type, GameType::TicTacToe);
        assert_eq!((request.player1_id, request.player2_id), (1, 2));
        assert_eq!(auth.as_deref(), Some("Bearer 1"));

        let manager = manager.lock();
        assert!(manager.pending_handoffs().is_empty());
        assert_eq!(manager.host_of_play(10), Some("http://pm-a/playmaster/"));
    }

    #[tokio::test]
    async fn rejected_plays_stay_pending_until_a_later_pass() {
        let (manager, client, dispatcher) = setup(&["http://pm-a/playmaster/"]);
        client.0.push_reply(Err(HandoffError::Rejected {
            status: 409,
            body: "busy".into(),
        }));

        assert_eq!(dispatcher.dispatch_once().await.deferred, 1);
        assert_eq!(manager.lock().pending_handoffs().len(), 1);

        assert_eq!(dispatcher.dispatch_once().await.confirmed, 1);
        assert_eq!(client.0.call_count(), 2);
        assert!(manager.lock().pending_handoffs().is_empty());
    }

    #[tokio::test]
    async fn nothing_is_sent_without_workers() {
        let (manager, client, dispatcher) = setup(&[]);
        assert_eq!(dispatcher.dispatch_once().await.deferred, 1);
        assert_eq!(client.0.call_count(), 0);

        manager.lock().set_workers(vec!["http://pm-b/playmaster/".into()]);
        assert_eq!(dispatcher.dispatch_once().await.confirmed, 1);
    }

    #[tokio::test]
    async fn a_closed_gate_holds_everything_back() {
        let ensemble = coordination::MemoryEnsemble::new();
        let session = ensemble.connect();
        let (manager, client, dispatcher) = setup(&["http://pm-a/playmaster/"]);
        let dispatcher = Dispatcher {
            gate: ConnectionGate::track(&session),
            ..dispatcher
        };

        session.suspend();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(dispatcher.dispatch_once().await, DispatchReport::default());
        assert_eq!(client.0.call_count(), 0);

        session.resume();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(dispatcher.dispatch_once().await.confirmed, 1);
        assert!(manager.lock().pending_handoffs().is_empty());
    }

    #[tokio::test]
    async fn run_loop_wakes_on_notify() {
        let (manager, _client, dispatcher) = setup(&["http://pm-a/playmaster/"]);
        let wake = dispatcher.wake.clone();
        let dispatcher = Dispatcher {
            retry_every: Duration::from_secs(3600),
            ..dispatcher
        };
        let task = dispatcher.spawn();
        // The first interval tick fires immediately; give it a moment.
        tokio::time::sleep(Duration::from_millis(20)).await;
        wake.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.lock().pending_handoffs().is_empty());
        task.abort();
    }
}
