//! In-process coordination backend.
//!
//! A `MemoryEnsemble` owns one node tree; every [`MemoryClient`] obtained from
//! it is an independent session. Used directly by single-process deployments
//! and tests, and hosted behind HTTP by the coordinator service.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use crate::client::{
    ConnectionState, Coordinator, CreateMode, SessionId, Stat, Watch, WatchEvent, WatchKind,
};
use crate::error::CoordError;
use crate::paths;

const EVENT_CAPACITY: usize = 32;

struct Node {
    data: Vec<u8>,
    version: u32,
    ephemeral_owner: Option<SessionId>,
    children: BTreeSet<String>,
    next_sequence: u64,
}

impl Node {
    fn new(data: Vec<u8>, ephemeral_owner: Option<SessionId>) -> Self {
        Self {
            data,
            version: 0,
            ephemeral_owner,
            children: BTreeSet::new(),
            next_sequence: 0,
        }
    }

    fn stat(&self) -> Stat {
        Stat {
            version: self.version,
            num_children: self.children.len(),
            ephemeral_owner: self.ephemeral_owner,
        }
    }
}

struct PendingWatch {
    session: SessionId,
    tx: oneshot::Sender<WatchEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Connected,
    Suspended,
    Expired,
}

struct SessionEntry {
    status: SessionStatus,
    events: broadcast::Sender<ConnectionState>,
}

struct Tree {
    nodes: HashMap<String, Node>,
    data_watches: HashMap<String, Vec<PendingWatch>>,
    child_watches: HashMap<String, Vec<PendingWatch>>,
    sessions: HashMap<SessionId, SessionEntry>,
    next_session: SessionId,
}

impl Default for Tree {
    fn default() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(paths::ROOT.to_string(), Node::new(Vec::new(), None));
        Self {
            nodes,
            data_watches: HashMap::new(),
            child_watches: HashMap::new(),
            sessions: HashMap::new(),
            next_session: 1,
        }
    }
}

impl Tree {
    fn open_session(&mut self, events: broadcast::Sender<ConnectionState>) -> SessionId {
        let id = self.next_session;
        self.next_session += 1;
        self.sessions.insert(
            id,
            SessionEntry {
                status: SessionStatus::Connected,
                events,
            },
        );
        id
    }

    fn check(&self, session: SessionId) -> Result<(), CoordError> {
        match self.sessions.get(&session).map(|entry| entry.status) {
            Some(SessionStatus::Connected) => Ok(()),
            Some(SessionStatus::Suspended) => Err(CoordError::ConnectionLoss),
            Some(SessionStatus::Expired) | None => Err(CoordError::SessionExpired),
        }
    }

    fn fire(watches: &mut HashMap<String, Vec<PendingWatch>>, path: &str, kind: WatchKind) {
        if let Some(pending) = watches.remove(path) {
            for watch in pending {
                let _ = watch.tx.send(WatchEvent {
                    kind,
                    path: path.to_string(),
                });
            }
        }
    }

    fn node(&self, path: &str) -> Result<&Node, CoordError> {
        paths::validate(path)?;
        self.nodes.get(path).ok_or_else(|| CoordError::no_node(path))
    }

    fn create(
        &mut self,
        session: SessionId,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordError> {
        let (parent_path, name) = paths::split(path)?;
        let parent = self
            .nodes
            .get_mut(parent_path)
            .ok_or_else(|| CoordError::no_node(parent_path))?;
        if parent.ephemeral_owner.is_some() {
            return Err(CoordError::NoChildrenForEphemerals {
                path: parent_path.to_string(),
            });
        }
        let name = if mode.is_sequential() {
            let sequence = parent.next_sequence;
            parent.next_sequence += 1;
            format!("{name}{sequence:010}")
        } else {
            name.to_string()
        };
        let full = paths::join(parent_path, &name);
        if !parent.children.insert(name) {
            return Err(CoordError::node_exists(full));
        }
        let owner = mode.is_ephemeral().then_some(session);
        self.nodes.insert(full.clone(), Node::new(data, owner));
        Self::fire(&mut self.data_watches, &full, WatchKind::Created);
        Self::fire(&mut self.child_watches, parent_path, WatchKind::ChildrenChanged);
        Ok(full)
    }

    fn set(&mut self, path: &str, data: Vec<u8>) -> Result<Stat, CoordError> {
        paths::validate(path)?;
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| CoordError::no_node(path))?;
        node.data = data;
        node.version += 1;
        let stat = node.stat();
        Self::fire(&mut self.data_watches, path, WatchKind::DataChanged);
        Ok(stat)
    }

    fn remove(&mut self, path: &str) -> Result<(), CoordError> {
        let (parent_path, name) = paths::split(path)?;
        let node = self.nodes.get(path).ok_or_else(|| CoordError::no_node(path))?;
        if !node.children.is_empty() {
            return Err(CoordError::NotEmpty {
                path: path.to_string(),
            });
        }
        self.nodes.remove(path);
        if let Some(parent) = self.nodes.get_mut(parent_path) {
            parent.children.remove(name);
        }
        Self::fire(&mut self.data_watches, path, WatchKind::Deleted);
        Self::fire(&mut self.child_watches, path, WatchKind::Deleted);
        Self::fire(&mut self.child_watches, parent_path, WatchKind::ChildrenChanged);
        Ok(())
    }

    fn watch_data(&mut self, session: SessionId, path: &str) -> Watch {
        let (tx, watch) = Watch::pair(path);
        self.data_watches
            .entry(path.to_string())
            .or_default()
            .push(PendingWatch { session, tx });
        watch
    }

    fn watch_children(&mut self, session: SessionId, path: &str) -> Watch {
        let (tx, watch) = Watch::pair(path);
        self.child_watches
            .entry(path.to_string())
            .or_default()
            .push(PendingWatch { session, tx });
        watch
    }

    /// Ends a session: its watches resolve as lost, its ephemeral nodes are
    /// removed (firing everyone else's watches) and its client hears `Lost`.
    fn expire(&mut self, session: SessionId) -> bool {
        let Some(entry) = self.sessions.get_mut(&session) else {
            return false;
        };
        if entry.status == SessionStatus::Expired {
            return false;
        }
        entry.status = SessionStatus::Expired;
        let events = entry.events.clone();

        for watches in [&mut self.data_watches, &mut self.child_watches] {
            for pending in watches.values_mut() {
                pending.retain(|watch| watch.session != session);
            }
            watches.retain(|_, pending| !pending.is_empty());
        }

        let mut owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        owned.sort();
        for path in &owned {
            let _ = self.remove(path);
        }
        debug!(session, removed = owned.len(), "coordination session expired");

        let _ = events.send(ConnectionState::Lost);
        true
    }
}

/// Shared in-memory node tree.
#[derive(Clone, Default)]
pub struct MemoryEnsemble {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new client session against this ensemble.
    pub fn connect(&self) -> MemoryClient {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = self.tree.lock().open_session(events.clone());
        MemoryClient {
            tree: self.tree.clone(),
            session: AtomicU64::new(session),
            events,
        }
    }

    /// Number of live sessions (connected or suspended).
    pub fn live_sessions(&self) -> usize {
        self.tree
            .lock()
            .sessions
            .values()
            .filter(|entry| entry.status != SessionStatus::Expired)
            .count()
    }
}

/// One session against a [`MemoryEnsemble`]. Dropping the client closes the
/// session, which releases its ephemeral nodes.
pub struct MemoryClient {
    tree: Arc<Mutex<Tree>>,
    session: AtomicU64,
    events: broadcast::Sender<ConnectionState>,
}

impl MemoryClient {
    fn current(&self) -> SessionId {
        self.session.load(Ordering::SeqCst)
    }

    fn with_tree<T>(
        &self,
        op: impl FnOnce(&mut Tree, SessionId) -> Result<T, CoordError>,
    ) -> Result<T, CoordError> {
        let mut tree = self.tree.lock();
        let session = self.current();
        tree.check(session)?;
        op(&mut tree, session)
    }

    /// Simulates the service expiring this session.
    pub fn expire(&self) {
        self.tree.lock().expire(self.current());
    }

    /// Simulates a dropped connection inside the session timeout: operations
    /// fail with `ConnectionLoss`, ephemeral nodes survive.
    pub fn suspend(&self) {
        let mut tree = self.tree.lock();
        if let Some(entry) = tree.sessions.get_mut(&self.current()) {
            if entry.status == SessionStatus::Connected {
                entry.status = SessionStatus::Suspended;
                let _ = self.events.send(ConnectionState::Suspended);
            }
        }
    }

    /// Ends a suspension started by [`MemoryClient::suspend`].
    pub fn resume(&self) {
        let mut tree = self.tree.lock();
        if let Some(entry) = tree.sessions.get_mut(&self.current()) {
            if entry.status == SessionStatus::Suspended {
                entry.status = SessionStatus::Connected;
                let _ = self.events.send(ConnectionState::Reconnected);
            }
        }
    }

    /// Opens a fresh session after expiry. A live session is left untouched.
    pub fn reconnect(&self) {
        let mut tree = self.tree.lock();
        let current = self.current();
        let expired = tree
            .sessions
            .get(&current)
            .map_or(true, |entry| entry.status == SessionStatus::Expired);
        if !expired {
            return;
        }
        let session = tree.open_session(self.events.clone());
        self.session.store(session, Ordering::SeqCst);
        debug!(previous = current, session, "coordination session re-established");
        let _ = self.events.send(ConnectionState::Reconnected);
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        self.tree.lock().expire(self.current());
    }
}

#[async_trait]
impl Coordinator for MemoryClient {
    fn session_id(&self) -> SessionId {
        self.current()
    }

    fn connection_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.events.subscribe()
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordError> {
        self.with_tree(|tree, session| tree.create(session, path, data, mode))
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Stat), CoordError> {
        self.with_tree(|tree, _| {
            let node = tree.node(path)?;
            Ok((node.data.clone(), node.stat()))
        })
    }

    async fn get_watch(&self, path: &str) -> Result<(Vec<u8>, Stat, Watch), CoordError> {
        self.with_tree(|tree, session| {
            let (data, stat) = {
                let node = tree.node(path)?;
                (node.data.clone(), node.stat())
            };
            Ok((data, stat, tree.watch_data(session, path)))
        })
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordError> {
        self.with_tree(|tree, _| {
            paths::validate(path)?;
            Ok(tree.nodes.get(path).map(Node::stat))
        })
    }

    async fn exists_watch(&self, path: &str) -> Result<(Option<Stat>, Watch), CoordError> {
        self.with_tree(|tree, session| {
            paths::validate(path)?;
            let stat = tree.nodes.get(path).map(Node::stat);
            Ok((stat, tree.watch_data(session, path)))
        })
    }

    async fn set(&self, path: &str, data: Vec<u8>) -> Result<Stat, CoordError> {
        self.with_tree(|tree, _| tree.set(path, data))
    }

    async fn delete(&self, path: &str) -> Result<(), CoordError> {
        self.with_tree(|tree, _| tree.remove(path))
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, CoordError> {
        self.with_tree(|tree, _| Ok(tree.node(path)?.children.iter().cloned().collect()))
    }

    async fn children_watch(&self, path: &str) -> Result<(Vec<String>, Watch), CoordError> {
        self.with_tree(|tree, session| {
            let children = tree.node(path)?.children.iter().cloned().collect();
            Ok((children, tree.watch_children(session, path)))
        })
    }
}
