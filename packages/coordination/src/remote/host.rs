//! Server side of the remote backend: remote sessions mapped onto
//! [`MemoryClient`] sessions of one shared ensemble.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::wire::{FiredWatch, Operation, Outcome};
use crate::client::{Coordinator, SessionId, Watch};
use crate::error::CoordError;
use crate::memory::{MemoryClient, MemoryEnsemble};

struct RemoteSession {
    client: MemoryClient,
    timeout: Duration,
    last_seen: Mutex<Instant>,
    pending: Mutex<Vec<FiredWatch>>,
    notify: Notify,
}

impl RemoteSession {
    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn is_stale(&self, now: Instant) -> bool {
        now.duration_since(*self.last_seen.lock()) > self.timeout
    }

    fn forward(self: &Arc<Self>, watch_id: u64, watch: Watch) {
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            let event = watch.fired().await;
            if let Some(session) = session.upgrade() {
                session.pending.lock().push(FiredWatch { watch_id, event });
                session.notify.notify_one();
            }
        });
    }
}

/// Registry of remote sessions hosted by the coordinator service.
pub struct RemoteHost {
    ensemble: MemoryEnsemble,
    sessions: Mutex<HashMap<SessionId, Arc<RemoteSession>>>,
    default_timeout: Duration,
}

impl RemoteHost {
    pub fn new(ensemble: MemoryEnsemble, default_timeout: Duration) -> Self {
        Self {
            ensemble,
            sessions: Mutex::new(HashMap::new()),
            default_timeout,
        }
    }

    pub fn ensemble(&self) -> &MemoryEnsemble {
        &self.ensemble
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Opens a session; returns its id and the negotiated timeout.
    pub fn open(&self, requested_timeout: Option<Duration>) -> (SessionId, Duration) {
        let timeout = requested_timeout.unwrap_or(self.default_timeout);
        let client = self.ensemble.connect();
        let id = client.session_id();
        let session = Arc::new(RemoteSession {
            client,
            timeout,
            last_seen: Mutex::new(Instant::now()),
            pending: Mutex::new(Vec::new()),
            notify: Notify::new(),
        });
        self.sessions.lock().insert(id, session);
        info!(session = id, timeout_ms = timeout.as_millis() as u64, "remote session opened");
        (id, timeout)
    }

    fn session(&self, id: SessionId) -> Result<Arc<RemoteSession>, CoordError> {
        self.sessions
            .lock()
            .get(&id)
            .cloned()
            .ok_or(CoordError::SessionExpired)
    }

    /// Executes one operation on behalf of session `id`.
    pub async fn execute(&self, id: SessionId, op: Operation) -> Result<Outcome, CoordError> {
        let session = self.session(id)?;
        session.touch();
        let client = &session.client;
        match op {
            Operation::Create { path, data, mode } => client
                .create(&path, data, mode)
                .await
                .map(|path| Outcome::Created { path }),
            Operation::Get { path, watch: None } => client
                .get(&path)
                .await
                .map(|(data, stat)| Outcome::Data { data, stat }),
            Operation::Get {
                path,
                watch: Some(watch_id),
            } => {
                let (data, stat, watch) = client.get_watch(&path).await?;
                session.forward(watch_id, watch);
                Ok(Outcome::Data { data, stat })
            }
            Operation::Exists { path, watch: None } => client
                .exists(&path)
                .await
                .map(|stat| Outcome::Exists { stat }),
            Operation::Exists {
                path,
                watch: Some(watch_id),
            } => {
                let (stat, watch) = client.exists_watch(&path).await?;
                session.forward(watch_id, watch);
                Ok(Outcome::Exists { stat })
            }
            Operation::Set { path, data } => client
                .set(&path, data)
                .await
                .map(|stat| Outcome::Stat { stat }),
            Operation::Delete { path } => client.delete(&path).await.map(|()| Outcome::Deleted),
            Operation::Children { path, watch: None } => client
                .children(&path)
                .await
                .map(|children| Outcome::Children { children }),
            Operation::Children {
                path,
                watch: Some(watch_id),
            } => {
                let (children, watch) = client.children_watch(&path).await?;
                session.forward(watch_id, watch);
                Ok(Outcome::Children { children })
            }
        }
    }

    /// Heartbeat plus event delivery: waits up to `wait` for fired watches.
    pub async fn poll(&self, id: SessionId, wait: Duration) -> Result<Vec<FiredWatch>, CoordError> {
        let session = self.session(id)?;
        session.touch();
        let ready = !session.pending.lock().is_empty();
        if !ready {
            let _ = tokio::time::timeout(wait, session.notify.notified()).await;
        }
        session.touch();
        let events = std::mem::take(&mut *session.pending.lock());
        if self.sessions.lock().contains_key(&id) {
            Ok(events)
        } else {
            Err(CoordError::SessionExpired)
        }
    }

    /// Closes a session, releasing its ephemeral nodes.
    pub fn close(&self, id: SessionId) -> bool {
        let removed = self.sessions.lock().remove(&id);
        match removed {
            Some(session) => {
                session.client.expire();
                session.notify.notify_one();
                info!(session = id, "remote session closed");
                true
            }
            None => false,
        }
    }

    /// Expires every session whose heartbeat is older than its timeout.
    pub fn reap(&self) -> Vec<SessionId> {
        let now = Instant::now();
        let stale: Vec<SessionId> = self
            .sessions
            .lock()
            .iter()
            .filter(|(_, session)| session.is_stale(now))
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            debug!(session = id, "remote session heartbeat timed out");
            self.close(*id);
        }
        stale
    }

    /// Spawns the periodic reaper.
    pub fn spawn_reaper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let host = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let Some(host) = host.upgrade() else {
                    break;
                };
                let reaped = host.reap();
                if !reaped.is_empty() {
                    info!(count = reaped.len(), "expired silent sessions");
                }
            }
        })
    }
}
