//! Exclusive ownership of a recoverable session directory.
//!
//! Layout under [`SESSION_ROOT`]:
//!
//! ```text
//! /pm_session/session-0000000003/lock          ephemeral, owner identity
//! /pm_session/session-0000000003/play_manager  JSON snapshot of the manager state
//! /pm_session/session-0000000003/<play_id>     JSON state of one hosted game
//! ```
//!
//! A session whose `lock` is missing was abandoned by a dead owner and can be
//! claimed by any peer, which then resumes from the persisted nodes.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::{Coordinator, CreateMode, SessionId};
use crate::error::CoordError;
use crate::paths;
use crate::retry::{retry_delay, retry_transient};

pub const SESSION_ROOT: &str = "/pm_session";
pub const LOCK_NODE: &str = "lock";
pub const STATE_NODE: &str = "play_manager";
const SESSION_PREFIX: &str = "session-";

/// Progress of session acquisition, observable while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    DiscoveringPeerService,
    EnumeratingSessions,
    AcquiringLock,
    LoadingState,
    InitializingFresh,
    Active,
}

/// Persisted state handed back after acquiring a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot<S> {
    pub session_dir: String,
    pub state: S,
    /// Game nodes keyed by node name (the play id).
    pub games: BTreeMap<String, Value>,
    /// True when an abandoned session was claimed; false for a fresh one.
    pub recovered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition<S> {
    /// The lock from an earlier acquisition is still ours; in-memory state stands.
    Retained { session_dir: String },
    /// A session was claimed and its state loaded (or freshly initialised).
    Claimed(SessionSnapshot<S>),
}

enum Claim {
    Existing(String),
    Fresh(String),
}

/// Drives the claim protocol for one game-hosting instance.
pub struct SessionCoordinator {
    coordinator: Arc<dyn Coordinator>,
    identity: String,
    phase: Mutex<SessionPhase>,
    session_dir: Arc<RwLock<Option<String>>>,
}

impl SessionCoordinator {
    pub fn new(coordinator: Arc<dyn Coordinator>, instance_name: &str) -> Self {
        Self {
            coordinator,
            identity: format!("playmaster-{instance_name}"),
            phase: Mutex::new(SessionPhase::DiscoveringPeerService),
            session_dir: Arc::new(RwLock::new(None)),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock()
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    /// Directory of the currently held session, if any.
    pub fn session_dir(&self) -> Option<String> {
        self.session_dir.read().clone()
    }

    fn set_phase(&self, phase: SessionPhase) {
        let mut current = self.phase.lock();
        if *current != phase {
            debug!(from = ?*current, to = ?phase, "session phase transition");
            *current = phase;
        }
    }

    /// Handle that persists mutations into whichever session is held.
    pub fn store(&self) -> SessionStore {
        SessionStore::spawn(self.coordinator.clone(), self.session_dir.clone())
    }

    /// Runs the full acquisition sequence. `discover_peer` completes once the
    /// peer service this tier reports to is known.
    pub async fn acquire<S, P>(&self, discover_peer: P) -> Result<Acquisition<S>, CoordError>
    where
        S: Serialize + DeserializeOwned + Default,
        P: Future<Output = Result<(), CoordError>>,
    {
        self.set_phase(SessionPhase::DiscoveringPeerService);
        discover_peer.await?;

        if let Some(session_dir) = self.still_owned().await? {
            info!(session_dir = %session_dir, "session lock still held, keeping in-memory state");
            self.set_phase(SessionPhase::Active);
            return Ok(Acquisition::Retained { session_dir });
        }

        self.coordinator.ensure_path(SESSION_ROOT).await?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let claim = match self.claim_session().await {
                Ok(claim) => claim,
                Err(e) if e.is_transient() || e.is_benign_exists() || e.is_benign_missing() => {
                    let delay = retry_delay(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        retry_delay_ms = delay.as_millis() as u64,
                        "session claim interrupted, restarting enumeration"
                    );
                    sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let snapshot = match claim {
                Claim::Existing(session_dir) => {
                    self.set_phase(SessionPhase::LoadingState);
                    let (state, games) = self.load(&session_dir).await?;
                    info!(
                        session_dir = %session_dir,
                        games = games.len(),
                        "recovered abandoned session"
                    );
                    SessionSnapshot {
                        session_dir,
                        state,
                        games,
                        recovered: true,
                    }
                }
                Claim::Fresh(session_dir) => {
                    self.set_phase(SessionPhase::InitializingFresh);
                    let state = S::default();
                    self.seed(&session_dir, &state).await?;
                    info!(session_dir = %session_dir, "initialised fresh session");
                    SessionSnapshot {
                        session_dir,
                        state,
                        games: BTreeMap::new(),
                        recovered: false,
                    }
                }
            };

            *self.session_dir.write() = Some(snapshot.session_dir.clone());
            self.set_phase(SessionPhase::Active);
            return Ok(Acquisition::Claimed(snapshot));
        }
    }

    /// Marks the instance as no longer active, e.g. after losing the connection.
    pub fn suspend(&self) {
        if self.is_active() {
            self.set_phase(SessionPhase::DiscoveringPeerService);
        }
    }

    async fn still_owned(&self) -> Result<Option<String>, CoordError> {
        let Some(session_dir) = self.session_dir() else {
            return Ok(None);
        };
        let lock = paths::join(&session_dir, LOCK_NODE);
        match self.coordinator.get(&lock).await {
            Ok((data, stat))
                if data == self.identity.as_bytes()
                    && stat.ephemeral_owner == Some(self.coordinator.session_id()) =>
            {
                Ok(Some(session_dir))
            }
            Ok(_) => {
                warn!(session_dir = %session_dir, "session lock now belongs to another owner");
                *self.session_dir.write() = None;
                Ok(None)
            }
            Err(e) if e.is_benign_missing() => {
                *self.session_dir.write() = None;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_lock(&self, lock: &str) -> Result<(), CoordError> {
        self.coordinator
            .create(lock, self.identity.as_bytes().to_vec(), CreateMode::Ephemeral)
            .await
            .map(|_| ())
    }

    async fn claim_session(&self) -> Result<Claim, CoordError> {
        self.set_phase(SessionPhase::EnumeratingSessions);
        let mut sessions = self.coordinator.children(SESSION_ROOT).await?;
        sessions.sort();

        let mut owned = 0usize;
        for session in &sessions {
            let session_dir = paths::join(SESSION_ROOT, session);
            let lock = paths::join(&session_dir, LOCK_NODE);
            match self.coordinator.get(&lock).await {
                Ok(_) => owned += 1,
                Err(e) if e.is_benign_missing() => {
                    self.set_phase(SessionPhase::AcquiringLock);
                    match self.create_lock(&lock).await {
                        Ok(()) => {
                            debug!(session_dir = %session_dir, "claimed abandoned session");
                            return Ok(Claim::Existing(session_dir));
                        }
                        Err(e) if e.is_benign_exists() => {
                            debug!(session_dir = %session_dir, "lost claim race");
                            owned += 1;
                        }
                        // Session directory deleted underneath us.
                        Err(e) if e.is_benign_missing() => {}
                        Err(e) => return Err(e),
                    }
                    self.set_phase(SessionPhase::EnumeratingSessions);
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            checked = sessions.len(),
            owned, "every session is owned, opening a fresh one"
        );
        self.set_phase(SessionPhase::AcquiringLock);
        let prefix = paths::join(SESSION_ROOT, SESSION_PREFIX);
        let session_dir = self
            .coordinator
            .create(&prefix, Vec::new(), CreateMode::PersistentSequential)
            .await?;
        // A peer may claim the empty directory first; the caller restarts.
        self.create_lock(&paths::join(&session_dir, LOCK_NODE)).await?;
        Ok(Claim::Fresh(session_dir))
    }

    async fn seed<S: Serialize>(&self, session_dir: &str, state: &S) -> Result<(), CoordError> {
        let path = paths::join(session_dir, STATE_NODE);
        let data = serde_json::to_vec(state)?;
        let (coordinator, path, data) = (self.coordinator.as_ref(), &path, &data);
        retry_transient("seed session state", move || async move {
            match coordinator
                .create(path, data.clone(), CreateMode::Persistent)
                .await
            {
                Err(e) if e.is_benign_exists() => {
                    coordinator.set(path, data.clone()).await.map(|_| ())
                }
                other => other.map(|_| ()),
            }
        })
        .await
    }

    async fn load<S>(&self, session_dir: &str) -> Result<(S, BTreeMap<String, Value>), CoordError>
    where
        S: DeserializeOwned + Default,
    {
        let state_path = paths::join(session_dir, STATE_NODE);
        let state = match retry_transient("load session state", || {
            self.coordinator.read(&state_path)
        })
        .await?
        {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => {
                warn!(session_dir, "session has no play manager snapshot, starting empty");
                S::default()
            }
        };

        let children =
            retry_transient("list session games", || self.coordinator.children(session_dir))
                .await?;
        let mut games = BTreeMap::new();
        for child in children {
            if child == LOCK_NODE || child == STATE_NODE {
                continue;
            }
            let path = paths::join(session_dir, &child);
            let Some(bytes) =
                retry_transient("load game", || self.coordinator.read(&path)).await?
            else {
                continue;
            };
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(game) => {
                    games.insert(child, game);
                }
                Err(e) => {
                    error!(path = %path, error = %e, "skipping corrupt game node");
                }
            }
        }
        Ok((state, games))
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode session payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session writer has stopped")]
    Closed,
}

#[derive(Debug)]
enum Mutation {
    CreateGame { node: String, data: Vec<u8> },
    UpdateGame { node: String, data: Vec<u8> },
    RemoveGame { node: String },
    UpdateState { data: Vec<u8> },
}

impl Mutation {
    fn label(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => "create_game",
            Self::UpdateGame { .. } => "update_game",
            Self::RemoveGame { .. } => "remove_game",
            Self::UpdateState { .. } => "update_play_manager",
        }
    }

    async fn apply(&self, coordinator: &dyn Coordinator, session_dir: &str) -> Result<(), CoordError> {
        match self {
            Self::CreateGame { node, data } => match coordinator
                .create(&paths::join(session_dir, node), data.clone(), CreateMode::Persistent)
                .await
            {
                Err(e) if e.is_benign_exists() => Ok(()),
                other => other.map(|_| ()),
            },
            Self::UpdateGame { node, data } => {
                swallow_missing(coordinator.set(&paths::join(session_dir, node), data.clone()).await)
            }
            Self::RemoveGame { node } => {
                swallow_missing(coordinator.delete(&paths::join(session_dir, node)).await)
            }
            Self::UpdateState { data } => swallow_missing(
                coordinator
                    .set(&paths::join(session_dir, STATE_NODE), data.clone())
                    .await,
            ),
        }
    }
}

fn swallow_missing<T>(result: Result<T, CoordError>) -> Result<(), CoordError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_benign_missing() => Ok(()),
        Err(e) => Err(e),
    }
}

/// The coordination session and session directory a mutation was
/// submitted under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tenure {
    session: SessionId,
    session_dir: Option<String>,
}

impl Tenure {
    fn current(coordinator: &dyn Coordinator, session_dir: &RwLock<Option<String>>) -> Self {
        Self {
            session: coordinator.session_id(),
            session_dir: session_dir.read().clone(),
        }
    }
}

enum Command {
    Write(Tenure, Mutation),
    Flush(oneshot::Sender<()>),
}

/// Ordered, asynchronously confirmed persistence of session mutations.
///
/// Mutations are applied one at a time in submission order. Transient
/// failures retry the same mutation; a node that already exists (on create)
/// or has vanished (on update/remove) is not an error. A mutation is
/// dropped once the coordination session or session directory it was
/// submitted under is no longer the current one.
#[derive(Clone)]
pub struct SessionStore {
    coordinator: Arc<dyn Coordinator>,
    session_dir: Arc<RwLock<Option<String>>>,
    tx: mpsc::UnboundedSender<Command>,
}

impl SessionStore {
    fn spawn(coordinator: Arc<dyn Coordinator>, session_dir: Arc<RwLock<Option<String>>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(coordinator.clone(), session_dir.clone(), rx));
        Self {
            coordinator,
            session_dir,
            tx,
        }
    }

    fn submit(&self, mutation: Mutation) -> Result<(), PersistError> {
        let tenure = Tenure::current(self.coordinator.as_ref(), &self.session_dir);
        self.tx
            .send(Command::Write(tenure, mutation))
            .map_err(|_| PersistError::Closed)
    }

    pub fn create_game<T: Serialize>(&self, play_id: impl Display, game: &T) -> Result<(), PersistError> {
        self.submit(Mutation::CreateGame {
            node: play_id.to_string(),
            data: serde_json::to_vec(game)?,
        })
    }

    pub fn update_game<T: Serialize>(&self, play_id: impl Display, game: &T) -> Result<(), PersistError> {
        self.submit(Mutation::UpdateGame {
            node: play_id.to_string(),
            data: serde_json::to_vec(game)?,
        })
    }

    pub fn remove_game(&self, play_id: impl Display) -> Result<(), PersistError> {
        self.submit(Mutation::RemoveGame {
            node: play_id.to_string(),
        })
    }

    pub fn update_play_manager<T: Serialize>(&self, state: &T) -> Result<(), PersistError> {
        self.submit(Mutation::UpdateState {
            data: serde_json::to_vec(state)?,
        })
    }

    /// Resolves once every mutation submitted before the call was applied or
    /// dropped.
    pub async fn flush(&self) -> Result<(), PersistError> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(Command::Flush(done))
            .map_err(|_| PersistError::Closed)?;
        wait.await.map_err(|_| PersistError::Closed)
    }
}

async fn run_writer(
    coordinator: Arc<dyn Coordinator>,
    session_dir: Arc<RwLock<Option<String>>>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Flush(done) => {
                let _ = done.send(());
            }
            Command::Write(tenure, mutation) => {
                apply_with_retry(coordinator.as_ref(), &session_dir, &tenure, &mutation).await;
            }
        }
    }
    debug!("session writer stopped");
}

async fn apply_with_retry(
    coordinator: &dyn Coordinator,
    session_dir: &RwLock<Option<String>>,
    tenure: &Tenure,
    mutation: &Mutation,
) {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let Some(dir) = tenure.session_dir.clone() else {
            warn!(operation = mutation.label(), "no session held, dropping mutation");
            return;
        };
        // The directory may belong to a peer once our session has ended.
        if Tenure::current(coordinator, session_dir) != *tenure {
            warn!(
                operation = mutation.label(),
                session_dir = %dir,
                "session changed since submission, dropping mutation"
            );
            return;
        }
        match mutation.apply(coordinator, &dir).await {
            Ok(()) => return,
            Err(e) if e.is_transient() => {
                let delay = retry_delay(attempt);
                warn!(
                    operation = mutation.label(),
                    error = %e,
                    attempt,
                    retry_delay_ms = delay.as_millis() as u64,
                    "session write failed transiently, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => {
                error!(operation = mutation.label(), error = %e, session_dir = %dir, "session write dropped");
                return;
            }
        }
    }
}
