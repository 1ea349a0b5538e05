//! Drives session ownership for the lifetime of the process.
//!
//! Each pass waits for the gamemaster, claims (or keeps) a session, loads
//! it into the host, publishes this worker in the directory and then
//! follows the gamemaster's location. Passes are restarted from the top
//! after every reconnection.

use std::sync::Arc;

use coordination::{
    spawn_supervised, Acquisition, ConnectionState, CoordError, Coordinator, Registration,
    ServiceDirectory, ServiceRecord, SessionCoordinator,
};
use protocol::{GAMEMASTER_CATEGORY, GAMEMASTER_INSTANCE, PLAYMASTER_CATEGORY};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::game_host::GameHost;
use super::gamemaster_client::GamemasterUrl;
use super::play_manager::PlayManagerState;

pub struct SessionRunner {
    host: Arc<GameHost>,
    session: Arc<SessionCoordinator>,
    directory: ServiceDirectory,
    gamemaster_url: GamemasterUrl,
    record: ServiceRecord,
    instance: String,
}

impl SessionRunner {
    pub fn new(
        host: Arc<GameHost>,
        session: Arc<SessionCoordinator>,
        directory: ServiceDirectory,
        gamemaster_url: GamemasterUrl,
        record: ServiceRecord,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            host,
            session,
            directory,
            gamemaster_url,
            record,
            instance: instance.into(),
        }
    }

    /// One pass. Only returns on error.
    pub async fn run(&self) -> Result<(), CoordError> {
        let directory = self.directory.clone();
        let gamemaster_url = self.gamemaster_url.clone();
        let gamemaster_known = async move {
            let record = directory
                .await_singleton(GAMEMASTER_CATEGORY, GAMEMASTER_INSTANCE)
                .await?;
            info!(url = %record.url, "gamemaster located");
            gamemaster_url.set(Some(record.url));
            Ok(())
        };

        match self.session.acquire::<PlayManagerState, _>(gamemaster_known).await? {
            Acquisition::Retained { session_dir } => {
                info!(session_dir = %session_dir, "continuing with the held session");
            }
            Acquisition::Claimed(snapshot) => {
                if let Err(e) = self.host.load(snapshot) {
                    error!(error = %e, "could not load the claimed session");
                }
            }
        }

        self.directory
            .register_self(
                PLAYMASTER_CATEGORY,
                &self.instance,
                &self.record,
                Registration::Sequential,
            )
            .await?;

        let gamemaster_url = self.gamemaster_url.clone();
        self.directory
            .follow_singleton(GAMEMASTER_CATEGORY, GAMEMASTER_INSTANCE, move |url| {
                if url.is_none() {
                    warn!("gamemaster left the directory");
                }
                gamemaster_url.set(url);
            })
            .await
    }

    /// Runs passes under connection supervision. Requests are refused from
    /// the moment the connection is interrupted until the next pass
    /// reactivates the session.
    pub fn spawn(self, coordinator: Arc<dyn Coordinator>) -> JoinHandle<()> {
        spawn_suspension_watch(coordinator.as_ref(), self.session.clone());
        let runner = Arc::new(self);
        spawn_supervised(coordinator, "playmaster-session", move || {
            let runner = runner.clone();
            async move { runner.run().await }
        })
    }
}

fn spawn_suspension_watch(coordinator: &dyn Coordinator, session: Arc<SessionCoordinator>) {
    let mut events = coordinator.connection_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConnectionState::Suspended | ConnectionState::Lost) => {
                    if session.is_active() {
                        warn!("coordination connection interrupted, refusing play requests");
                    }
                    session.suspend();
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return,
            }
        }
    });
}
