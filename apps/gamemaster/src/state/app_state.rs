use std::sync::Arc;

use coordination::ConnectionGate;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::services::GameManager;

/// Shared handles given to every request handler.
#[derive(Clone)]
pub struct AppState {
    manager: Arc<Mutex<GameManager>>,
    /// Wakes the hand-off dispatcher.
    wake: Arc<Notify>,
    gate: ConnectionGate,
}

impl AppState {
    pub fn new(manager: GameManager, gate: ConnectionGate) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            wake: Arc::new(Notify::new()),
            gate,
        }
    }

    pub fn manager(&self) -> Arc<Mutex<GameManager>> {
        self.manager.clone()
    }

    pub fn wake(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    pub fn read<R>(&self, f: impl FnOnce(&GameManager) -> R) -> R {
        f(&self.manager.lock())
    }

    /// Runs `f` under the manager lock, then wakes the dispatcher.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut GameManager) -> R) -> R {
        let result = f(&mut self.manager.lock());
        self.wake.notify_one();
        result
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        use crate::domain::SequentialIds;
        use crate::services::LogHistory;

        Self::new(
            GameManager::new(Box::new(SequentialIds::default()), Arc::new(LogHistory)),
            ConnectionGate::always_open(),
        )
    }
}
