//! The coordination primitive: a hierarchical namespace of small data nodes
//! with ephemeral ownership, sequential naming and one-shot watches.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};

use crate::error::CoordError;
use crate::paths;

/// Identifier of one client session with the coordination service.
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateMode {
    Persistent,
    Ephemeral,
    PersistentSequential,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::Ephemeral | Self::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(self, Self::PersistentSequential | Self::EphemeralSequential)
    }
}

/// Metadata returned alongside node reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub version: u32,
    pub num_children: usize,
    pub ephemeral_owner: Option<SessionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Suspended,
    Lost,
    Reconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchKind {
    Created,
    Deleted,
    DataChanged,
    ChildrenChanged,
    /// The session that registered the watch ended before it fired.
    SessionLost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub path: String,
}

/// A one-shot watch. It resolves exactly once; observing further changes
/// requires issuing a new watching read.
#[derive(Debug)]
pub struct Watch {
    path: String,
    rx: oneshot::Receiver<WatchEvent>,
}

impl Watch {
    pub(crate) fn pair(path: &str) -> (oneshot::Sender<WatchEvent>, Watch) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Watch {
                path: path.to_string(),
                rx,
            },
        )
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Waits for the watch to fire. A watch whose registering session went
    /// away resolves to [`WatchKind::SessionLost`].
    pub async fn fired(self) -> WatchEvent {
        match self.rx.await {
            Ok(event) => event,
            Err(_) => WatchEvent {
                kind: WatchKind::SessionLost,
                path: self.path,
            },
        }
    }
}

/// Asynchronous client of the coordination service.
///
/// Implementations must make node creation atomic: among concurrent creators
/// of the same path exactly one succeeds, the others get `NodeExists`.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Current session. Changes after a reconnection that follows expiry.
    fn session_id(&self) -> SessionId;

    /// Subscribes to connection state transitions.
    fn connection_events(&self) -> broadcast::Receiver<ConnectionState>;

    /// Creates a node and returns its actual path (sequential modes append a
    /// zero-padded counter to the last segment).
    async fn create(&self, path: &str, data: Vec<u8>, mode: CreateMode)
        -> Result<String, CoordError>;

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Stat), CoordError>;

    /// Reads a node and arms a data watch on it.
    async fn get_watch(&self, path: &str) -> Result<(Vec<u8>, Stat, Watch), CoordError>;

    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordError>;

    /// Arms an existence watch whether or not the node is present.
    async fn exists_watch(&self, path: &str) -> Result<(Option<Stat>, Watch), CoordError>;

    async fn set(&self, path: &str, data: Vec<u8>) -> Result<Stat, CoordError>;

    async fn delete(&self, path: &str) -> Result<(), CoordError>;

    async fn children(&self, path: &str) -> Result<Vec<String>, CoordError>;

    /// Lists children and arms a watch on the child set.
    async fn children_watch(&self, path: &str) -> Result<(Vec<String>, Watch), CoordError>;

    /// Creates every missing component of `path` as a persistent node.
    async fn ensure_path(&self, path: &str) -> Result<(), CoordError> {
        let mut current = String::new();
        for segment in paths::segments(path)? {
            current.push('/');
            current.push_str(segment);
            match self.create(&current, Vec::new(), CreateMode::Persistent).await {
                Ok(_) => {}
                Err(e) if e.is_benign_exists() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Reads node data, mapping a missing node to `None`.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, CoordError> {
        match self.get(path).await {
            Ok((data, _)) => Ok(Some(data)),
            Err(e) if e.is_benign_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
