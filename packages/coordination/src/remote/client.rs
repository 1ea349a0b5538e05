use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::sync::{broadcast, oneshot};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::wire::{
    EventBatch, OpenSessionRequest, OpenSessionResponse, Operation, OperationReply, Outcome,
};
use crate::client::{ConnectionState, Coordinator, CreateMode, SessionId, Stat, Watch, WatchEvent};
use crate::error::CoordError;
use crate::retry::retry_delay;

const EVENT_CAPACITY: usize = 32;

struct Inner {
    http: reqwest::Client,
    base_url: String,
    requested_timeout: Duration,
    session: AtomicU64,
    poll_wait: Mutex<Duration>,
    suspended: AtomicBool,
    next_watch: AtomicU64,
    watches: Mutex<HashMap<u64, oneshot::Sender<WatchEvent>>>,
    events: broadcast::Sender<ConnectionState>,
}

fn transport(e: reqwest::Error) -> CoordError {
    CoordError::Transport {
        detail: e.to_string(),
    }
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn open_session(&self) -> Result<OpenSessionResponse, CoordError> {
        let response = self
            .http
            .post(self.url("sessions"))
            .json(&OpenSessionRequest {
                timeout_ms: Some(self.requested_timeout.as_millis() as u64),
            })
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        let opened: OpenSessionResponse = response.json().await.map_err(transport)?;
        self.session.store(opened.session_id, Ordering::SeqCst);
        // Poll well inside the timeout so the poll doubles as a heartbeat.
        *self.poll_wait.lock() = Duration::from_millis((opened.timeout_ms / 3).max(50));
        Ok(opened)
    }

    async fn execute(&self, op: Operation) -> Result<Outcome, CoordError> {
        let session = self.session.load(Ordering::SeqCst);
        let response = self
            .http
            .post(self.url(&format!("sessions/{session}/ops")))
            .json(&op)
            .send()
            .await
            .map_err(|_| CoordError::ConnectionLoss)?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(CoordError::SessionExpired),
            status if status.is_success() => {
                let reply: OperationReply = response.json().await.map_err(transport)?;
                reply.into()
            }
            status => Err(CoordError::Transport {
                detail: format!("coordinator answered {status}"),
            }),
        }
    }

    fn register_watch(&self, path: &str) -> (u64, Watch) {
        let id = self.next_watch.fetch_add(1, Ordering::SeqCst);
        let (tx, watch) = Watch::pair(path);
        self.watches.lock().insert(id, tx);
        (id, watch)
    }

    fn discard_watch(&self, id: u64) {
        self.watches.lock().remove(&id);
    }

    /// Drops every pending watch so that waiters observe `SessionLost`.
    fn fail_watches(&self) {
        self.watches.lock().clear();
    }

    fn deliver(&self, batch: EventBatch) {
        let mut watches = self.watches.lock();
        for fired in batch.events {
            if let Some(tx) = watches.remove(&fired.watch_id) {
                let _ = tx.send(fired.event);
            }
        }
    }

    fn set_suspended(&self, suspended: bool) {
        let was = self.suspended.swap(suspended, Ordering::SeqCst);
        if suspended && !was {
            warn!(base_url = %self.base_url, "coordination connection suspended");
            let _ = self.events.send(ConnectionState::Suspended);
        } else if !suspended && was {
            info!(base_url = %self.base_url, "coordination connection restored");
            let _ = self.events.send(ConnectionState::Reconnected);
        }
    }

    async fn poll_once(&self) -> Result<Option<EventBatch>, CoordError> {
        let session = self.session.load(Ordering::SeqCst);
        let wait = *self.poll_wait.lock();
        let response = self
            .http
            .get(self.url(&format!("sessions/{session}/events")))
            .query(&[("wait_ms", wait.as_millis() as u64)])
            .timeout(wait * 2 + Duration::from_secs(1))
            .send()
            .await
            .map_err(transport)?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await.map_err(transport)?)),
            status => Err(CoordError::Transport {
                detail: format!("coordinator answered {status}"),
            }),
        }
    }
}

/// Pumps watch events and heartbeats until the client is dropped.
async fn pump(inner: Weak<Inner>) {
    let mut attempt = 0u32;
    loop {
        let Some(strong) = inner.upgrade() else {
            break;
        };
        match strong.poll_once().await {
            Ok(Some(batch)) => {
                attempt = 0;
                strong.set_suspended(false);
                strong.deliver(batch);
            }
            Ok(None) => {
                warn!("coordination session expired on the server");
                strong.fail_watches();
                let _ = strong.events.send(ConnectionState::Lost);
                strong.suspended.store(false, Ordering::SeqCst);
                loop {
                    attempt += 1;
                    match strong.open_session().await {
                        Ok(opened) => {
                            info!(session = opened.session_id, "opened replacement coordination session");
                            attempt = 0;
                            let _ = strong.events.send(ConnectionState::Reconnected);
                            break;
                        }
                        Err(e) => {
                            let delay = retry_delay(attempt);
                            debug!(error = %e, attempt, "reopening coordination session failed");
                            sleep(delay).await;
                        }
                    }
                }
            }
            Err(e) => {
                attempt += 1;
                strong.set_suspended(true);
                let delay = retry_delay(attempt);
                debug!(error = %e, attempt, "event poll failed");
                drop(strong);
                sleep(delay).await;
            }
        }
    }
    debug!("coordination event pump stopped");
}

/// [`Coordinator`] backed by the coordinator service over HTTP.
pub struct RemoteCoordinator {
    inner: Arc<Inner>,
}

impl RemoteCoordinator {
    /// Opens a session against `base_url`. Failing here is fatal for a service.
    pub async fn connect(base_url: &str, session_timeout: Duration) -> Result<Self, CoordError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            requested_timeout: session_timeout,
            session: AtomicU64::new(0),
            poll_wait: Mutex::new(session_timeout / 3),
            suspended: AtomicBool::new(false),
            next_watch: AtomicU64::new(1),
            watches: Mutex::new(HashMap::new()),
            events,
        });
        let opened = inner.open_session().await?;
        info!(base_url, session = opened.session_id, "connected to coordination service");
        tokio::spawn(pump(Arc::downgrade(&inner)));
        Ok(Self { inner })
    }

    async fn watching(
        &self,
        path: &str,
        op: impl FnOnce(u64) -> Operation,
    ) -> Result<(Outcome, Watch), CoordError> {
        let (id, watch) = self.inner.register_watch(path);
        match self.inner.execute(op(id)).await {
            Ok(outcome) => Ok((outcome, watch)),
            Err(e) => {
                self.inner.discard_watch(id);
                Err(e)
            }
        }
    }
}

impl Drop for RemoteCoordinator {
    fn drop(&mut self) {
        let session = self.inner.session.load(Ordering::SeqCst);
        let request = self
            .inner
            .http
            .delete(self.inner.url(&format!("sessions/{session}")));
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = request.send().await;
            });
        }
    }
}

fn unexpected(outcome: Outcome) -> CoordError {
    CoordError::Transport {
        detail: format!("unexpected reply {outcome:?}"),
    }
}

#[async_trait]
impl Coordinator for RemoteCoordinator {
    fn session_id(&self) -> SessionId {
        self.inner.session.load(Ordering::SeqCst)
    }

    fn connection_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.events.subscribe()
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordError> {
        let op = Operation::Create {
            path: path.to_string(),
            data,
            mode,
        };
        match self.inner.execute(op).await? {
            Outcome::Created { path } => Ok(path),
            other => Err(unexpected(other)),
        }
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Stat), CoordError> {
        let op = Operation::Get {
            path: path.to_string(),
            watch: None,
        };
        match self.inner.execute(op).await? {
            Outcome::Data { data, stat } => Ok((data, stat)),
            other => Err(unexpected(other)),
        }
    }

    async fn get_watch(&self, path: &str) -> Result<(Vec<u8>, Stat, Watch), CoordError> {
        let (outcome, watch) = self
            .watching(path, |id| Operation::Get {
                path: path.to_string(),
                watch: Some(id),
            })
            .await?;
        match outcome {
            Outcome::Data { data, stat } => Ok((data, stat, watch)),
            other => Err(unexpected(other)),
        }
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordError> {
        let op = Operation::Exists {
            path: path.to_string(),
            watch: None,
        };
        match self.inner.execute(op).await? {
            Outcome::Exists { stat } => Ok(stat),
            other => Err(unexpected(other)),
        }
    }

    async fn exists_watch(&self, path: &str) -> Result<(Option<Stat>, Watch), CoordError> {
        let (outcome, watch) = self
            .watching(path, |id| Operation::Exists {
                path: path.to_string(),
                watch: Some(id),
            })
            .await?;
        match outcome {
            Outcome::Exists { stat } => Ok((stat, watch)),
            other => Err(unexpected(other)),
        }
    }

    async fn set(&self, path: &str, data: Vec<u8>) -> Result<Stat, CoordError> {
        let op = Operation::Set {
            path: path.to_string(),
            data,
        };
        match self.inner.execute(op).await? {
            Outcome::Stat { stat } => Ok(stat),
            other => Err(unexpected(other)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), CoordError> {
        let op = Operation::Delete {
            path: path.to_string(),
        };
        match self.inner.execute(op).await? {
            Outcome::Deleted => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, CoordError> {
        let op = Operation::Children {
            path: path.to_string(),
            watch: None,
        };
        match self.inner.execute(op).await? {
            Outcome::Children { children } => Ok(children),
            other => Err(unexpected(other)),
        }
    }

    async fn children_watch(&self, path: &str) -> Result<(Vec<String>, Watch), CoordError> {
        let (outcome, watch) = self
            .watching(path, |id| Operation::Children {
                path: path.to_string(),
                watch: Some(id),
            })
            .await?;
        match outcome {
            Outcome::Children { children } => Ok((children, watch)),
            other => Err(unexpected(other)),
        }
    }
}
